//! Converter configuration.

use std::path::PathBuf;

use raster::CogConfig;

use crate::error::{IngestionError, Result};

/// Default multipart chunk size (8 MiB), matching common S3 client defaults.
pub const DEFAULT_MULTIPART_CHUNK_SIZE: u64 = 8 * 1024 * 1024;

/// Smallest part size S3 accepts for all but the last part.
pub const MIN_MULTIPART_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Settings shared by every granule conversion.
#[derive(Debug, Clone)]
pub struct ConverterConfig {
    /// Upload part size; also the chunk size for local integrity tags.
    pub multipart_chunk_size: u64,

    /// Root under which each invocation creates its own scratch directory.
    pub scratch_dir: PathBuf,

    /// Report an already-present destination instead of converting again.
    pub skip_existing: bool,

    /// Output raster settings.
    pub cog: CogConfig,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            multipart_chunk_size: DEFAULT_MULTIPART_CHUNK_SIZE,
            scratch_dir: std::env::temp_dir(),
            skip_existing: false,
            cog: CogConfig::default(),
        }
    }
}

impl ConverterConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self {
            cog: CogConfig::from_env(),
            ..Self::default()
        };

        if let Ok(val) = std::env::var("MULTIPART_CHUNK_SIZE") {
            if let Ok(size) = val.parse() {
                config.multipart_chunk_size = size;
            }
        }

        if let Ok(val) = std::env::var("SCRATCH_DIR") {
            if !val.is_empty() {
                config.scratch_dir = PathBuf::from(val);
            }
        }

        if let Ok(val) = std::env::var("SKIP_EXISTING") {
            config.skip_existing = val.to_lowercase() == "true" || val == "1";
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.multipart_chunk_size < MIN_MULTIPART_CHUNK_SIZE {
            return Err(IngestionError::InvalidConfig(format!(
                "multipart_chunk_size must be at least {} bytes (got {})",
                MIN_MULTIPART_CHUNK_SIZE, self.multipart_chunk_size
            )));
        }

        if usize::try_from(self.multipart_chunk_size).is_err() {
            return Err(IngestionError::InvalidConfig(format!(
                "multipart_chunk_size {} does not fit in memory",
                self.multipart_chunk_size
            )));
        }

        self.cog.validate().map_err(IngestionError::InvalidConfig)
    }
}
