// ABOUTME: Error types spanning lexing, parsing and evaluation failures

use thiserror::Error as ThisError;

use crate::token::Position;

/// The shallow, uniform error taxonomy from the language spec: every
/// failure is one "execution error" carrying a human-readable message, and
/// a `Position` where the originator has one (lexing and parsing do,
/// evaluation doesn't track per-node positions).
#[derive(ThisError, Debug, Clone)]
pub enum Error {
    #[error("{message} {pos}")]
    Lex { message: String, pos: Position },

    #[error("{message} {pos}")]
    Parse { message: String, pos: Position },

    #[error("{message}")]
    Name { message: String },

    #[error("{message}")]
    Type { message: String },

    #[error("{message}")]
    Arity { message: String },

    #[error("{message}")]
    Bounds { message: String },
}

impl Error {
    pub fn lex(message: String, pos: Position) -> Self {
        Error::Lex { message, pos }
    }

    pub fn parse(message: impl Into<String>, pos: Position) -> Self {
        Error::Parse {
            message: message.into(),
            pos,
        }
    }

    pub fn name(message: impl Into<String>) -> Self {
        Error::Name {
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Error::Type {
            message: message.into(),
        }
    }

    /// Illegal-operation error naming the offending operand's type, per the
    /// value algebra's uniform fallback.
    pub fn illegal_operation(op: &str, left_type: &str) -> Self {
        Error::Type {
            message: format!("Operation '{op}' cannot be performed on {left_type}"),
        }
    }

    pub fn arity(message: impl Into<String>) -> Self {
        Error::Arity {
            message: message.into(),
        }
    }

    pub fn bounds(message: impl Into<String>) -> Self {
        Error::Bounds {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
