//! Error types for the ingestion crate.

use std::fmt;

use thiserror::Error;

/// Errors that can occur while converting a granule.
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("downloaded object {key} failed integrity check: store reported {expected}, computed {computed} ({chunk_size}-byte chunks)")]
    DownloadIntegrityMismatch {
        key: String,
        expected: String,
        computed: String,
        chunk_size: u64,
    },

    #[error("uploaded object {key} failed integrity check: store reported {expected}, computed {computed} ({chunk_size}-byte chunks)")]
    UploadIntegrityMismatch {
        key: String,
        expected: String,
        computed: String,
        chunk_size: u64,
    },

    #[error("store returned no integrity tag for {0}")]
    MissingIntegrityTag(String),

    #[error("Invalid granule: {0}")]
    InvalidGranule(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Raster(#[from] raster::RasterError),

    #[error(transparent)]
    Storage(#[from] storage::StorageError),

    #[error(transparent)]
    Integrity(#[from] integrity::IntegrityError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestionError>;

/// Pipeline stage in which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Recipe lookup and source/destination naming
    Locate,
    /// Existence check of the destination
    Probe,
    /// Download and integrity check
    Fetch,
    /// Band composition
    Compose,
    /// Raster encoding
    Encode,
    /// Upload and integrity check
    Upload,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Locate => "locate",
            Self::Probe => "probe",
            Self::Fetch => "fetch",
            Self::Compose => "compose",
            Self::Encode => "encode",
            Self::Upload => "upload",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A failed granule conversion.
#[derive(Error, Debug)]
#[error("{stage} stage failed for granule {granule}: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    pub granule: String,
    #[source]
    pub source: IngestionError,
}

impl PipelineError {
    pub fn new(stage: Stage, granule: impl Into<String>, source: impl Into<IngestionError>) -> Self {
        Self {
            stage,
            granule: granule.into(),
            source: source.into(),
        }
    }
}
