//! Configuration for cloud-optimized GeoTIFF output.

use serde::{Deserialize, Serialize};

/// Configuration for the COG encoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CogConfig {
    /// Tile edge length in pixels (square tiles, multiple of 16).
    pub tile_size: u32,

    /// Tile compression codec.
    pub compression: Compression,

    /// Deflate level (1-9).
    pub deflate_level: u32,

    /// Whether to write overview levels.
    pub overviews: bool,

    /// Downscale factor between consecutive overview levels.
    pub overview_factor: usize,
}

impl Default for CogConfig {
    fn default() -> Self {
        Self {
            tile_size: 256,
            compression: Compression::Deflate,
            deflate_level: 6,
            overviews: true,
            overview_factor: 2,
        }
    }
}

impl CogConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("COG_TILE_SIZE") {
            if let Ok(size) = val.parse() {
                config.tile_size = size;
            }
        }

        if let Ok(val) = std::env::var("COG_COMPRESSION") {
            config.compression = Compression::from_str(&val);
        }

        if let Ok(val) = std::env::var("COG_DEFLATE_LEVEL") {
            if let Ok(level) = val.parse() {
                config.deflate_level = level;
            }
        }

        if let Ok(val) = std::env::var("COG_OVERVIEWS") {
            config.overviews = val.to_lowercase() == "true" || val == "1";
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.tile_size == 0 || self.tile_size % 16 != 0 {
            return Err("tile_size must be a positive multiple of 16".to_string());
        }

        if self.deflate_level == 0 || self.deflate_level > 9 {
            return Err("deflate_level must be 1-9".to_string());
        }

        if self.overview_factor < 2 {
            return Err("overview_factor must be >= 2".to_string());
        }

        Ok(())
    }

    /// Cumulative decimation factors of the overview levels for a grid.
    ///
    /// Levels are added while the smaller dimension of the next level stays
    /// at or above the tile size, e.g. `[2, 4, 8, 16]` for a 4800x4800 grid
    /// with 256-pixel tiles.
    pub fn overview_factors(&self, width: usize, height: usize) -> Vec<usize> {
        if !self.overviews || self.overview_factor < 2 {
            return Vec::new();
        }

        let tile = self.tile_size as usize;
        let mut factors = Vec::new();
        let mut factor = self.overview_factor;

        while width.div_ceil(factor).min(height.div_ceil(factor)) >= tile.max(1) {
            factors.push(factor);
            factor *= self.overview_factor;
        }

        factors
    }
}

/// Compression codec for output tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// No compression.
    None,
    /// Deflate (zlib).
    #[default]
    Deflate,
}

impl Compression {
    /// Parse from string (case-insensitive), falling back to deflate.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "none" | "uncompressed" => Self::None,
            _ => Self::Deflate,
        }
    }

    /// TIFF Compression tag value.
    pub fn tiff_code(&self) -> u16 {
        match self {
            Self::None => 1,
            Self::Deflate => 8,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Deflate => "deflate",
        }
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CogConfig::default();
        assert_eq!(config.tile_size, 256);
        assert_eq!(config.compression, Compression::Deflate);
        assert_eq!(config.deflate_level, 6);
        assert!(config.overviews);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = CogConfig::default();
        config.tile_size = 100;
        assert!(config.validate().is_err());

        config = CogConfig::default();
        config.deflate_level = 0;
        assert!(config.validate().is_err());

        config.deflate_level = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overview_factors() {
        let config = CogConfig::default();
        assert_eq!(config.overview_factors(4800, 4800), vec![2, 4, 8, 16]);
        assert_eq!(config.overview_factors(2400, 2400), vec![2, 4, 8]);
        assert!(config.overview_factors(300, 300).is_empty());
        assert_eq!(config.overview_factors(512, 4800), vec![2]);

        let disabled = CogConfig {
            overviews: false,
            ..CogConfig::default()
        };
        assert!(disabled.overview_factors(4800, 4800).is_empty());
    }

    #[test]
    fn test_compression_from_str() {
        assert_eq!(Compression::from_str("NONE"), Compression::None);
        assert_eq!(Compression::from_str("deflate"), Compression::Deflate);
        assert_eq!(Compression::from_str("zstd"), Compression::Deflate);
        assert_eq!(Compression::Deflate.tiff_code(), 8);
    }
}
