//! Error types for sub-band location, composition and encoding.

use thiserror::Error;

/// Errors that can occur while locating, composing or encoding rasters.
#[derive(Error, Debug)]
pub enum RasterError {
    /// The granule's data-type tag has no implemented recipe.
    #[error("unsupported collection: {0}")]
    UnsupportedCollection(String),

    /// The template variable could not be opened.
    #[error("template sub-band not found: {0}")]
    TemplateNotFound(String),

    /// A non-template variable could not be opened, or is not part of the recipe.
    #[error("sub-band not found: {0}")]
    SubdatasetNotFound(String),

    /// A band's grid does not match the template's.
    #[error("band {band} does not match the template grid: {detail}")]
    GeometryMismatch { band: String, detail: String },

    /// A sub-band address string or component is malformed.
    #[error("invalid sub-band address: {0}")]
    InvalidAddress(String),

    /// A collection recipe or output profile is inconsistent.
    #[error("invalid profile: {0}")]
    InvalidProfile(String),

    /// Container metadata could not be interpreted.
    #[error("invalid container metadata: {0}")]
    InvalidMetadata(String),

    /// The codec failed to produce a valid output artifact.
    #[error("encode failure: {0}")]
    EncodeFailure(String),

    /// The container codec failed while reading.
    #[error("read failed: {0}")]
    ReadFailed(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl RasterError {
    /// Create an EncodeFailure error.
    pub fn encode_failure(msg: impl Into<String>) -> Self {
        Self::EncodeFailure(msg.into())
    }

    /// Create an InvalidProfile error.
    pub fn invalid_profile(msg: impl Into<String>) -> Self {
        Self::InvalidProfile(msg.into())
    }

    /// Create an InvalidMetadata error.
    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }
}

impl From<tiff::TiffError> for RasterError {
    fn from(err: tiff::TiffError) -> Self {
        Self::EncodeFailure(err.to_string())
    }
}

/// Result type for raster operations.
pub type Result<T> = std::result::Result<T, RasterError>;
