//! Error types for qail-clickhouse.
//!
//! Codec failures are split by phase so callers can tell a bad type string
//! from a bad value from a corrupted response. Server and transport errors
//! are forwarded as-is; nothing in this crate retries.

use thiserror::Error;

use crate::types::TypeError;

/// Failure to parse a type descriptor such as `Nullable(DateTime64(3, 'UTC'))`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Type parse error at position {position} in '{input}': {message}")]
pub struct TypeParseError {
    pub input: String,
    pub position: usize,
    pub message: String,
}

impl TypeParseError {
    pub fn new(input: &str, position: usize, message: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            position,
            message: message.into(),
        }
    }
}

/// Value could not be encoded against its type. Raised before any bytes are sent.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error("Row has {got} values, expected {expected}")]
    RowArity { expected: usize, got: usize },

    #[error("Tuple has {got} elements, {ty} expects {expected}")]
    TupleArity {
        ty: String,
        expected: usize,
        got: usize,
    },

    #[error("Value of {got} bytes does not fit FixedString({size})")]
    FixedStringOverflow { size: usize, got: usize },

    #[error("Value {value} out of range for {ty}")]
    OutOfRange { ty: String, value: String },

    #[error("Cannot encode {value} as {ty}")]
    TypeMismatch { ty: String, value: String },

    #[error("NULL for non-nullable type {0}")]
    UnexpectedNull(String),

    #[error("Unknown label '{label}' for {ty}")]
    UnknownEnumLabel { ty: String, label: String },

    #[error("{names} column names for {types} column types")]
    NameArity { names: usize, types: usize },

    #[error("Unsupported value: {0}")]
    Unsupported(String),
}

/// Response bytes do not match the expected layout. Never recovered from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Truncated input: {needed} more bytes needed at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    #[error("{0} trailing bytes after the last row")]
    TrailingBytes(usize),

    #[error("Unterminated varint at offset {0}")]
    VarintOverflow(usize),

    #[error("Unknown code {code} for {ty}")]
    UnknownEnumCode { ty: String, code: i16 },

    #[error("Invalid {what}: {detail}")]
    Invalid { what: &'static str, detail: String },

    #[error("Bad type in header: {0}")]
    Header(#[from] TypeParseError),
}

impl DecodeError {
    pub(crate) fn invalid(what: &'static str, detail: impl Into<String>) -> Self {
        DecodeError::Invalid {
            what,
            detail: detail.into(),
        }
    }
}

/// Top-level driver error.
#[derive(Debug, Error)]
pub enum ChError {
    #[error(transparent)]
    TypeParse(#[from] TypeParseError),

    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Conversion error: {0}")]
    Type(#[from] TypeError),

    /// Non-2xx response carrying a database exception.
    #[error("Server error (HTTP {status}): {message}")]
    Server {
        status: u16,
        code: Option<i32>,
        message: String,
    },

    #[error("HTTP transport error: {0}")]
    Transport(reqwest::Error),

    #[error("Request timed out")]
    Timeout,

    #[error("Pool error: {0}")]
    Pool(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ChError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ChError::Timeout
        } else {
            ChError::Transport(e)
        }
    }
}

impl ChError {
    /// Database exception code, when the server reported one.
    pub fn server_code(&self) -> Option<i32> {
        match self {
            ChError::Server { code, .. } => *code,
            _ => None,
        }
    }
}

/// Result type for ClickHouse operations.
pub type ChResult<T> = Result<T, ChError>;

pub type EncodeResult<T> = Result<T, EncodeError>;
pub type DecodeResult<T> = Result<T, DecodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TypeParseError::new("Array(", 6, "expected type name");
        assert_eq!(
            err.to_string(),
            "Type parse error at position 6 in 'Array(': expected type name"
        );

        let err = ChError::from(EncodeError::FixedStringOverflow { size: 2, got: 3 });
        assert_eq!(
            err.to_string(),
            "Encode error: Value of 3 bytes does not fit FixedString(2)"
        );
    }

    #[test]
    fn test_server_code() {
        let err = ChError::Server {
            status: 404,
            code: Some(60),
            message: "Table default.nope does not exist".into(),
        };
        assert_eq!(err.server_code(), Some(60));
        assert_eq!(ChError::Timeout.server_code(), None);
    }
}
