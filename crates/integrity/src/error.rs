//! Error types for the integrity crate.

use thiserror::Error;

/// Errors that can occur while computing or comparing integrity tags.
#[derive(Error, Debug)]
pub enum IntegrityError {
    #[error("Failed to read source: {0}")]
    Io(#[from] std::io::Error),

    #[error("Chunk size must be greater than zero (got {0})")]
    InvalidChunkSize(u64),

    #[error("Malformed integrity tag: {0:?}")]
    MalformedTag(String),
}

/// Result type for integrity operations.
pub type Result<T> = std::result::Result<T, IntegrityError>;
