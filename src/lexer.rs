// ABOUTME: Lexer module turning Spearmint source text into a token stream

use nom::{
    character::complete::{char, digit1},
    combinator::{opt, recognize},
    sequence::pair,
    IResult, Parser,
};
use std::rc::Rc;

use crate::error::Error;
use crate::token::{Position, Token, TokenKind, KEYWORDS};

const TWO_CHAR_OPS: &[&str] = &["!=", "==", "<=", ">=", "&&", "||"];
const ONE_CHAR_OPS: &str = "+-*/^%=<>!";

/// Recognizes a run of digits, optionally followed by `.` and more digits.
/// A second `.` stops the number (matches the original: `decimal_count == 1
/// -> break`), so `1.2.3` lexes as `1.2` followed by a `Dot` token.
fn lex_number(input: &str) -> IResult<&str, (&str, bool)> {
    recognize(pair(digit1, opt(pair(char('.'), opt(digit1)))))
        .map(|s: &str| (s, s.contains('.')))
        .parse(input)
}

/// Escape characters legal inside a Spearmint string literal.
fn escape_char(c: char) -> Option<char> {
    match c {
        '"' => Some('"'),
        'n' => Some('\n'),
        't' => Some('\t'),
        '\\' => Some('\\'),
        _ => None,
    }
}

pub struct Lexer {
    file: Rc<str>,
    chars: Vec<char>,
    index: usize,
    pos: Position,
}

impl Lexer {
    pub fn new(filename: &str, source: &str) -> Self {
        let file: Rc<str> = Rc::from(filename);
        Lexer {
            file: file.clone(),
            chars: source.chars().collect(),
            index: 0,
            pos: Position::new(file),
        }
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.index + offset).copied()
    }

    fn cur(&self) -> Option<char> {
        self.peek(0)
    }

    fn advance(&mut self) {
        if let Some(c) = self.cur() {
            self.pos.advance(c);
            self.index += 1;
        }
    }

    fn rest_as_string(&self) -> String {
        self.chars[self.index..].iter().collect()
    }

    /// Consumes the full token stream, always terminated by `TokenKind::End`.
    pub fn tokenize(mut self) -> Result<Vec<Token>, Error> {
        let mut tokens = Vec::new();

        while let Some(c) = self.cur() {
            let start_pos = self.pos.clone();

            if c == ' ' || c == '\t' || c == '\n' {
                self.advance();
                continue;
            }

            if c == '#' {
                while !matches!(self.cur(), Some('\n') | None) {
                    self.advance();
                }
                continue;
            }

            if c.is_alphabetic() || c == '_' {
                let mut s = String::new();
                while matches!(self.cur(), Some(c) if c.is_alphanumeric() || c == '_') {
                    s.push(self.cur().unwrap());
                    self.advance();
                }
                let kind = if KEYWORDS.contains(&s.as_str()) {
                    TokenKind::Keyword(s)
                } else {
                    TokenKind::Id(s)
                };
                tokens.push(Token::new(kind, start_pos));
                continue;
            }

            if c.is_ascii_digit() {
                let rest = self.rest_as_string();
                let (matched, is_float) = lex_number(&rest)
                    .map(|(_, m)| m)
                    .expect("digit guard guarantees lex_number succeeds");
                for _ in 0..matched.chars().count() {
                    self.advance();
                }
                let kind = if is_float {
                    TokenKind::Float(matched.parse().map_err(|_| {
                        Error::lex(format!("Invalid float literal '{matched}'"), start_pos.clone())
                    })?)
                } else {
                    TokenKind::Int(matched.parse().map_err(|_| {
                        Error::lex(format!("Invalid int literal '{matched}'"), start_pos.clone())
                    })?)
                };
                tokens.push(Token::new(kind, start_pos));
                continue;
            }

            if c == '"' {
                self.advance();
                let mut s = String::new();
                loop {
                    match self.cur() {
                        None => {
                            return Err(Error::lex("Unterminated string".to_string(), start_pos))
                        }
                        Some('"') => {
                            self.advance();
                            break;
                        }
                        Some('\\') => {
                            let escaped = self.peek(1).ok_or_else(|| {
                                Error::lex("Unterminated string".to_string(), self.pos.clone())
                            })?;
                            match escape_char(escaped) {
                                Some(resolved) => s.push(resolved),
                                None => {
                                    return Err(Error::lex(
                                        format!("Unescaped slash in string: '\\{escaped}'"),
                                        self.pos.clone(),
                                    ))
                                }
                            }
                            self.advance();
                            self.advance();
                        }
                        Some(other) => {
                            s.push(other);
                            self.advance();
                        }
                    }
                }
                tokens.push(Token::new(TokenKind::String(s), start_pos));
                continue;
            }

            let two = format!("{}{}", c, self.peek(1).unwrap_or('\0'));
            if TWO_CHAR_OPS.contains(&two.as_str()) {
                tokens.push(Token::new(TokenKind::Op(two), start_pos));
                self.advance();
                self.advance();
                continue;
            }
            if two == "->" {
                tokens.push(Token::new(TokenKind::RArrow, start_pos));
                self.advance();
                self.advance();
                continue;
            }

            if ONE_CHAR_OPS.contains(c) {
                tokens.push(Token::new(TokenKind::Op(c.to_string()), start_pos));
                self.advance();
                continue;
            }

            let single = match c {
                '.' => Some(TokenKind::Dot),
                ',' => Some(TokenKind::Comma),
                ':' => Some(TokenKind::Colon),
                ';' => Some(TokenKind::Semicolon),
                '(' => Some(TokenKind::LParen),
                ')' => Some(TokenKind::RParen),
                '{' => Some(TokenKind::LBrace),
                '}' => Some(TokenKind::RBrace),
                '[' => Some(TokenKind::LBracket),
                ']' => Some(TokenKind::RBracket),
                _ => None,
            };

            match single {
                Some(kind) => {
                    tokens.push(Token::new(kind, start_pos));
                    self.advance();
                }
                None => {
                    return Err(Error::lex(
                        format!("Invalid character: '{c}'"),
                        start_pos,
                    ))
                }
            }
        }

        tokens.push(Token::new(TokenKind::End, self.pos.clone()));
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new("test", src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_two_char_operators_greedily() {
        let k = kinds("a == b != c <= d >= e && f || g -> h");
        assert!(k.contains(&TokenKind::Op("==".into())));
        assert!(k.contains(&TokenKind::Op("!=".into())));
        assert!(k.contains(&TokenKind::Op("<=".into())));
        assert!(k.contains(&TokenKind::Op(">=".into())));
        assert!(k.contains(&TokenKind::Op("&&".into())));
        assert!(k.contains(&TokenKind::Op("||".into())));
        assert!(k.contains(&TokenKind::RArrow));
    }

    #[test]
    fn lexes_keywords_vs_identifiers() {
        let k = kinds("var const_ for_loop");
        assert_eq!(k[0], TokenKind::Keyword("var".into()));
        assert_eq!(k[1], TokenKind::Id("const_".into()));
        assert_eq!(k[2], TokenKind::Id("for_loop".into()));
    }

    #[test]
    fn lexes_numbers() {
        let k = kinds("42 3.14 1.2.3");
        assert_eq!(k[0], TokenKind::Int(42));
        assert_eq!(k[1], TokenKind::Float(3.14));
        assert_eq!(k[2], TokenKind::Float(1.2));
        assert_eq!(k[3], TokenKind::Dot);
        assert_eq!(k[4], TokenKind::Int(3));
    }

    #[test]
    fn lexes_string_escapes() {
        let k = kinds(r#""a\n\t\"\\b""#);
        assert_eq!(k[0], TokenKind::String("a\n\t\"\\b".to_string()));
    }

    #[test]
    fn comments_are_invisible() {
        let with = kinds("var x = 1; # comment to end of line\nvar y = 2;");
        let without = kinds("var x = 1; \nvar y = 2;");
        assert_eq!(with, without);
    }

    #[test]
    fn unterminated_string_is_lex_error() {
        assert!(Lexer::new("test", "\"abc").tokenize().is_err());
    }

    #[test]
    fn bad_escape_is_lex_error() {
        assert!(Lexer::new("test", r#""a\qb""#).tokenize().is_err());
    }

    #[test]
    fn invalid_character_is_lex_error() {
        assert!(Lexer::new("test", "var x = 1 @ 2;").tokenize().is_err());
    }

    #[test]
    fn ends_with_end_token() {
        let k = kinds("1");
        assert_eq!(*k.last().unwrap(), TokenKind::End);
    }
}
