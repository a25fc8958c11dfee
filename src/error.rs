//! Error types for cellstore

use thiserror::Error;
use std::io;

/// Result type alias for cellstore operations
pub type Result<T> = std::result::Result<T, CellStoreError>;

/// Custom error types for cellstore
///
/// The first group is what a single command can fail with; those are
/// reported back to the caller and the connection keeps serving. `Protocol`
/// means the byte stream can no longer be framed and the connection is closed.
#[derive(Error, Debug)]
pub enum CellStoreError {
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    TypeMismatch,

    #[error("ERR value is not an integer or out of range")]
    NotAnInteger,

    #[error("ERR value is not a valid float")]
    NotAFloat,

    #[error("ERR increment or decrement would overflow")]
    Overflow,

    #[error("ERR increment would produce NaN or Infinity")]
    NonFinite,

    #[error("ERR index out of range")]
    OutOfRange,

    #[error("ERR wrong number of arguments for '{0}' command")]
    Arity(String),

    #[error("ERR syntax error")]
    Syntax,

    #[error("ERR invalid expire time in '{0}' command")]
    InvalidExpire(String),

    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),

    #[error("ERR Protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Client error: {0}")]
    Client(String),
}

impl From<nom::Err<nom::error::Error<&[u8]>>> for CellStoreError {
    fn from(err: nom::Err<nom::error::Error<&[u8]>>) -> Self {
        let detail = match err {
            nom::Err::Incomplete(_) => "incomplete frame".to_string(),
            nom::Err::Error(e) | nom::Err::Failure(e) => format!("unexpected input ({:?})", e.code),
        };
        CellStoreError::Protocol(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_errors_render_as_replies() {
        assert_eq!(
            CellStoreError::TypeMismatch.to_string(),
            "WRONGTYPE Operation against a key holding the wrong kind of value"
        );
        assert_eq!(
            CellStoreError::Arity("get".to_string()).to_string(),
            "ERR wrong number of arguments for 'get' command"
        );
    }
}
