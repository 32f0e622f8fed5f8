//! Storage error types.

use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("S3 error: {0}")]
    S3(#[from] Box<dyn std::error::Error + Send + Sync>),

    #[error("invalid part {part} for {key}")]
    InvalidPart { key: String, part: u32 },

    #[error("invalid part size {0}: S3 requires at least 5 MiB for all but the last part")]
    InvalidPartSize(usize),

    #[error("missing response field {field} for {key}")]
    MissingField { key: String, field: &'static str },

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
