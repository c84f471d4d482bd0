// ABOUTME: Hand-written recursive-descent parser with precedence climbing

use crate::ast::{Node, NodeKind};
use crate::error::{Error, Result};
use crate::lexer::Lexer;
use crate::token::{Position, Token, TokenKind};

/// Parses a complete program from source text, running the lexer first.
pub fn parse(filename: &str, source: &str) -> Result<Vec<Node>> {
    let tokens = Lexer::new(filename, source).tokenize()?;
    Parser::new(tokens).parse_program()
}

pub struct Parser {
    tokens: Vec<Token>,
    index: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, index: 0 }
    }

    fn cur(&self) -> &Token {
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn peek(&self, steps: usize) -> &Token {
        let i = (self.index + steps).min(self.tokens.len() - 1);
        &self.tokens[i]
    }

    fn pos(&self) -> Position {
        self.cur().pos.clone()
    }

    fn advance(&mut self) -> Token {
        let tok = self.cur().clone();
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
        tok
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Token> {
        if self.cur().kind == *kind {
            Ok(self.advance())
        } else {
            Err(Error::parse(
                format!("Expected {kind}, found {}", self.cur().kind),
                self.pos(),
            ))
        }
    }

    fn expect_id(&mut self) -> Result<String> {
        match self.cur().kind.clone() {
            TokenKind::Id(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(Error::parse(
                format!("Expected identifier, found {other}"),
                self.pos(),
            )),
        }
    }

    fn skip_semis(&mut self) {
        while matches!(self.cur().kind, TokenKind::Semicolon) {
            self.advance();
        }
    }

    /// `program := (statement ';')* End`
    pub fn parse_program(mut self) -> Result<Vec<Node>> {
        let stmts = self.statements()?;
        self.expect(&TokenKind::End)?;
        Ok(stmts)
    }

    fn statements(&mut self) -> Result<Vec<Node>> {
        let mut stmts = Vec::new();
        self.skip_semis();
        while !matches!(self.cur().kind, TokenKind::End) {
            if matches!(self.cur().kind, TokenKind::RBrace) {
                break;
            }
            let stmt = self.statement()?;
            self.expect(&TokenKind::Semicolon)?;
            stmts.push(stmt);
            self.skip_semis();
        }
        Ok(stmts)
    }

    fn block(&mut self) -> Result<Vec<Node>> {
        self.expect(&TokenKind::LBrace)?;
        let stmts = self.statements()?;
        self.expect(&TokenKind::RBrace)?;
        Ok(stmts)
    }

    fn statement(&mut self) -> Result<Node> {
        if self.cur().is_keyword("import") {
            return self.import_statement();
        }

        let is_decl = (self.cur().is_keyword("const") || self.cur().is_keyword("var"))
            && matches!(self.peek(1).kind, TokenKind::Id(_));
        if is_decl {
            return self.var_declaration();
        }

        let is_assign = matches!(self.cur().kind, TokenKind::Id(_)) && self.peek(1).is_op("=");
        if is_assign {
            return self.var_assign();
        }

        if self.cur().is_keyword("if") {
            return self.if_statement();
        }
        if self.cur().is_keyword("for") {
            return self.for_statement();
        }
        if self.cur().is_keyword("while") {
            return self.while_statement();
        }
        if self.cur().is_keyword("break") {
            let pos = self.pos();
            self.advance();
            return Ok(Node::new(NodeKind::Break, pos));
        }
        if self.cur().is_keyword("continue") {
            let pos = self.pos();
            self.advance();
            return Ok(Node::new(NodeKind::Continue, pos));
        }
        if self.cur().is_keyword("fn") {
            return self.function_def();
        }
        if self.cur().is_keyword("return") {
            return self.return_statement();
        }
        if self.cur().is_keyword("type") {
            return self.structure_def();
        }

        self.expr()
    }

    fn import_statement(&mut self) -> Result<Node> {
        let pos = self.pos();
        self.expect(&TokenKind::Keyword("import".into()))?;
        match self.cur().kind.clone() {
            TokenKind::String(module) => {
                self.advance();
                Ok(Node::new(NodeKind::Import { module }, pos))
            }
            other => Err(Error::parse(
                format!("Expected module name, found {other}"),
                self.pos(),
            )),
        }
    }

    /// `id ('.' id)* ('[' ']')*` — parsed for its syntax and discarded, per spec.
    fn type_expr(&mut self) -> Result<()> {
        self.expect_id()?;
        while matches!(self.cur().kind, TokenKind::Dot) && matches!(self.peek(1).kind, TokenKind::Id(_))
        {
            self.advance();
            self.advance();
        }
        while matches!(self.cur().kind, TokenKind::LBracket)
            && matches!(self.peek(1).kind, TokenKind::RBracket)
        {
            self.advance();
            self.advance();
        }
        Ok(())
    }

    fn var_declaration(&mut self) -> Result<Node> {
        let pos = self.pos();
        let is_const = if self.cur().is_keyword("const") {
            self.advance();
            true
        } else {
            false
        };

        self.expect(&TokenKind::Keyword("var".into()))?;
        let name = self.expect_id()?;

        if matches!(self.cur().kind, TokenKind::Colon) {
            self.advance();
            self.type_expr()?;
        }

        self.expect(&TokenKind::Op("=".into()))?;
        let initializer = Box::new(self.expr()?);

        Ok(Node::new(
            NodeKind::VarDeclaration {
                name,
                initializer,
                is_const,
            },
            pos,
        ))
    }

    fn var_assign(&mut self) -> Result<Node> {
        let pos = self.pos();
        let name = self.expect_id()?;
        self.expect(&TokenKind::Op("=".into()))?;
        let expr = Box::new(self.expr()?);
        Ok(Node::new(NodeKind::VarAssign { name, expr }, pos))
    }

    fn if_statement(&mut self) -> Result<Node> {
        let pos = self.pos();
        self.expect(&TokenKind::Keyword("if".into()))?;
        self.expect(&TokenKind::LParen)?;
        let cond = self.expr()?;
        self.expect(&TokenKind::RParen)?;
        let body = self.block()?;

        let mut cases = vec![(cond, body)];

        while self.cur().is_keyword("else") && self.peek(1).is_keyword("if") {
            self.advance();
            self.advance();
            self.expect(&TokenKind::LParen)?;
            let cond = self.expr()?;
            self.expect(&TokenKind::RParen)?;
            let body = self.block()?;
            cases.push((cond, body));
        }

        let else_body = if self.cur().is_keyword("else") {
            self.advance();
            self.block()?
        } else {
            Vec::new()
        };

        Ok(Node::new(NodeKind::If { cases, else_body }, pos))
    }

    fn for_statement(&mut self) -> Result<Node> {
        let pos = self.pos();
        self.expect(&TokenKind::Keyword("for".into()))?;
        self.expect(&TokenKind::LParen)?;
        let init = Box::new(self.statement()?);
        self.expect(&TokenKind::Semicolon)?;
        let cond = Box::new(self.expr()?);
        self.expect(&TokenKind::Semicolon)?;
        let update = Box::new(self.statement()?);
        self.expect(&TokenKind::RParen)?;
        let body = self.block()?;

        Ok(Node::new(
            NodeKind::For {
                init,
                cond,
                update,
                body,
            },
            pos,
        ))
    }

    fn while_statement(&mut self) -> Result<Node> {
        let pos = self.pos();
        self.expect(&TokenKind::Keyword("while".into()))?;
        self.expect(&TokenKind::LParen)?;
        let cond = Box::new(self.expr()?);
        self.expect(&TokenKind::RParen)?;
        let body = self.block()?;
        Ok(Node::new(NodeKind::While { cond, body }, pos))
    }

    fn function_def(&mut self) -> Result<Node> {
        let pos = self.pos();
        self.expect(&TokenKind::Keyword("fn".into()))?;
        let name = self.expect_id()?;
        self.expect(&TokenKind::LParen)?;

        let mut params = Vec::new();
        if let TokenKind::Id(_) = self.cur().kind {
            params.push(self.expect_id()?);
            while matches!(self.cur().kind, TokenKind::Comma) {
                self.advance();
                params.push(self.expect_id()?);
            }
        }
        self.expect(&TokenKind::RParen)?;
        let body = self.block()?;

        Ok(Node::new(NodeKind::FunctionDef { name, params, body }, pos))
    }

    fn return_statement(&mut self) -> Result<Node> {
        let pos = self.pos();
        self.expect(&TokenKind::Keyword("return".into()))?;
        let value = if matches!(self.cur().kind, TokenKind::Semicolon) {
            None
        } else {
            Some(Box::new(self.expr()?))
        };
        Ok(Node::new(NodeKind::Return(value), pos))
    }

    fn structure_def(&mut self) -> Result<Node> {
        let pos = self.pos();
        self.expect(&TokenKind::Keyword("type".into()))?;
        let name = self.expect_id()?;
        let members = self.block()?;
        Ok(Node::new(NodeKind::StructureDef { name, members }, pos))
    }

    // ---- Expression grammar, precedence climbing lowest -> highest ----

    fn expr(&mut self) -> Result<Node> {
        self.comp_expr()
    }

    fn comp_expr(&mut self) -> Result<Node> {
        self.bin_op(&["&&", "||"], Self::comp_expr2, Self::comp_expr2)
    }

    fn comp_expr2(&mut self) -> Result<Node> {
        self.bin_op(
            &["<", ">", "<=", ">=", "==", "!="],
            Self::arith_expr,
            Self::arith_expr,
        )
    }

    fn arith_expr(&mut self) -> Result<Node> {
        self.bin_op(&["+", "-"], Self::term, Self::term)
    }

    fn term(&mut self) -> Result<Node> {
        self.bin_op(&["*", "/", "%"], Self::power, Self::power)
    }

    /// `^` is right-associative, so the right side recurses into `power`
    /// itself rather than `modifier`.
    fn power(&mut self) -> Result<Node> {
        self.bin_op(&["^"], Self::modifier, Self::power)
    }

    fn bin_op(
        &mut self,
        ops: &[&str],
        mut parse_left: impl FnMut(&mut Self) -> Result<Node>,
        mut parse_right: impl FnMut(&mut Self) -> Result<Node>,
    ) -> Result<Node> {
        let mut left = parse_left(self)?;

        while let TokenKind::Op(op) = self.cur().kind.clone() {
            if !ops.contains(&op.as_str()) {
                break;
            }
            let pos = self.pos();
            self.advance();
            let right = parse_right(self)?;
            left = Node::new(
                NodeKind::BinOp {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
                pos,
            );
        }

        Ok(left)
    }

    fn modifier(&mut self) -> Result<Node> {
        let mut node = self.atom()?;

        loop {
            match &self.cur().kind {
                TokenKind::LParen => node = self.call(node)?,
                TokenKind::Dot => node = self.attribute_access(node)?,
                TokenKind::LBracket => node = self.index_access(node)?,
                TokenKind::Op(op) if op == "=" => node = self.attribute_assign(node)?,
                _ => break,
            }
        }

        Ok(node)
    }

    fn call(&mut self, callee: Node) -> Result<Node> {
        let pos = callee.pos.clone();
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();

        if !matches!(self.cur().kind, TokenKind::RParen) {
            args.push(self.expr()?);
            while matches!(self.cur().kind, TokenKind::Comma) {
                self.advance();
                args.push(self.expr()?);
            }
        }
        self.expect(&TokenKind::RParen)?;

        Ok(Node::new(
            NodeKind::FunctionCall {
                callee: Box::new(callee),
                args,
            },
            pos,
        ))
    }

    fn attribute_access(&mut self, target: Node) -> Result<Node> {
        let pos = target.pos.clone();
        self.expect(&TokenKind::Dot)?;
        let field = self.expect_id()?;
        Ok(Node::new(
            NodeKind::AttributeAccess {
                target: Box::new(target),
                field,
            },
            pos,
        ))
    }

    fn index_access(&mut self, target: Node) -> Result<Node> {
        let pos = target.pos.clone();
        self.expect(&TokenKind::LBracket)?;
        let index = self.expr()?;
        self.expect(&TokenKind::RBracket)?;
        Ok(Node::new(
            NodeKind::IndexAccess {
                target: Box::new(target),
                index: Box::new(index),
            },
            pos,
        ))
    }

    /// Only legal when `node` is itself an attribute access — an assignment
    /// following a bare call or index access has no attribute to write to.
    fn attribute_assign(&mut self, node: Node) -> Result<Node> {
        if !matches!(node.kind, NodeKind::AttributeAccess { .. }) {
            return Ok(node);
        }
        let pos = node.pos.clone();
        self.expect(&TokenKind::Op("=".into()))?;
        let value = self.expr()?;
        Ok(Node::new(
            NodeKind::AttributeAssign {
                target: Box::new(node),
                value: Box::new(value),
            },
            pos,
        ))
    }

    fn atom(&mut self) -> Result<Node> {
        let pos = self.pos();

        if let TokenKind::Op(op) = self.cur().kind.clone() {
            if op == "+" || op == "-" || op == "!" {
                self.advance();
                let operand = Box::new(self.atom()?);
                return Ok(Node::new(NodeKind::UnaryOp { op, operand }, pos));
            }
        }

        if self.cur().is_keyword("new") {
            self.advance();
            let inner = self.expr()?;
            return Ok(Node::new(NodeKind::ConstructorCall(Box::new(inner)), pos));
        }

        match self.cur().kind.clone() {
            TokenKind::Int(n) => {
                self.advance();
                Ok(Node::new(NodeKind::Int(n), pos))
            }
            TokenKind::Float(n) => {
                self.advance();
                Ok(Node::new(NodeKind::Float(n), pos))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Node::new(NodeKind::String(s), pos))
            }
            TokenKind::Id(name) => {
                self.advance();
                Ok(Node::new(NodeKind::VarAccess { name }, pos))
            }
            TokenKind::LBracket => {
                self.advance();
                let mut items = Vec::new();
                if !matches!(self.cur().kind, TokenKind::RBracket) {
                    items.push(self.expr()?);
                    while matches!(self.cur().kind, TokenKind::Comma) {
                        self.advance();
                        items.push(self.expr()?);
                    }
                }
                self.expect(&TokenKind::RBracket)?;
                Ok(Node::new(NodeKind::List(items), pos))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.expr()?;
                self.expect(&TokenKind::RParen)?;
                Ok(inner)
            }
            other => Err(Error::parse(
                format!("Expected an expression, found {other}"),
                pos,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(src: &str) -> Node {
        let mut stmts = parse("test", src).unwrap();
        assert_eq!(stmts.len(), 1);
        stmts.remove(0)
    }

    #[test]
    fn precedence_mul_over_add() {
        let node = parse_one("1+2*3;");
        match node.kind {
            NodeKind::BinOp { op, right, .. } => {
                assert_eq!(op, "+");
                assert!(matches!(right.kind, NodeKind::BinOp { ref op, .. } if op == "*"));
            }
            _ => panic!("expected BinOp"),
        }
    }

    #[test]
    fn power_is_right_associative() {
        let node = parse_one("2^3^2;");
        match node.kind {
            NodeKind::BinOp { op, left, right } => {
                assert_eq!(op, "^");
                assert!(matches!(left.kind, NodeKind::Int(2)));
                assert!(matches!(right.kind, NodeKind::BinOp { ref op, .. } if op == "^"));
            }
            _ => panic!("expected BinOp"),
        }
    }

    #[test]
    fn unary_not_binds_tighter_than_and() {
        let node = parse_one("!a && b;");
        match node.kind {
            NodeKind::BinOp { op, left, .. } => {
                assert_eq!(op, "&&");
                assert!(matches!(left.kind, NodeKind::UnaryOp { ref op, .. } if op == "!"));
            }
            _ => panic!("expected BinOp"),
        }
    }

    #[test]
    fn else_if_chains_bind_to_nearest_if() {
        let node = parse_one("if (a) { 1; } else if (b) { 2; } else { 3; };");
        match node.kind {
            NodeKind::If { cases, else_body } => {
                assert_eq!(cases.len(), 2);
                assert_eq!(else_body.len(), 1);
            }
            _ => panic!("expected If"),
        }
    }

    #[test]
    fn chained_postfix_call_and_attribute() {
        let node = parse_one("a.b(1).c;");
        assert!(matches!(node.kind, NodeKind::AttributeAccess { .. }));
    }

    #[test]
    fn missing_semicolon_is_parse_error() {
        assert!(parse("test", "var x = 1").is_err());
    }

    #[test]
    fn trailing_garbage_is_parse_error() {
        assert!(parse("test", "var x = 1; )").is_err());
    }
}
