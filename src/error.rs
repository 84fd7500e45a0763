//! Error types for the loginsight crate

use thiserror::Error;

/// Result type alias for loginsight operations
pub type Result<T> = std::result::Result<T, LoginsightError>;

/// Main error type for the loginsight crate
#[derive(Error, Debug)]
pub enum LoginsightError {
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Dimension mismatch: fitted with {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<polars::error::PolarsError> for LoginsightError {
    fn from(err: polars::error::PolarsError) -> Self {
        LoginsightError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for LoginsightError {
    fn from(err: serde_json::Error) -> Self {
        LoginsightError::SerializationError(err.to_string())
    }
}
