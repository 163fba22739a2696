//! Error types for the qail-ch CLI.

use qail_clickhouse::ChError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    /// Bad `--param` / `--setting` argument.
    #[error("Invalid argument '{arg}': {message}")]
    Argument { arg: String, message: String },

    /// Config file could not be read or parsed.
    #[error("Configuration error in {path}: {message}")]
    Config { path: String, message: String },

    #[error(transparent)]
    Driver(#[from] ChError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn argument(arg: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Argument {
            arg: arg.into(),
            message: message.into(),
        }
    }
}

pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CliError::argument("limit", "expected NAME=VALUE");
        assert_eq!(
            err.to_string(),
            "Invalid argument 'limit': expected NAME=VALUE"
        );
    }
}
