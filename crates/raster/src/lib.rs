//! Sub-band location, band composition and cloud-optimized GeoTIFF encoding
//! for MODIS vegetation-index granules.
//!
//! # Overview
//!
//! - [`collection`] maps a granule data-type tag to its extraction recipe
//! - [`subdataset`] builds and parses sub-band addresses
//! - [`reader`] abstracts the container codec ([`reader::SubdatasetReader`])
//! - [`composer`] merges the recipe's bands into one typed, nodata-consistent raster
//! - [`encoder`] writes the raster as a tiled, compressed GeoTIFF with overviews
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use raster::{collection_profile_for, BandComposer, CogConfig, CogEncoder, MemoryReader, RasterEncoder};
//!
//! # fn main() -> raster::Result<()> {
//! let config = CogConfig::default();
//! let profile = collection_profile_for("MOD13Q1")?;
//! let reader = MemoryReader::new();
//! let raster = BandComposer::new(&reader, &config).compose(Path::new("/tmp/granule.hdf"), &profile)?;
//! CogEncoder::new(config)?.encode(&raster, Path::new("/tmp/granule.tif"))?;
//! # Ok(())
//! # }
//! ```

pub mod collection;
pub mod composer;
pub mod config;
pub mod downsample;
pub mod encoder;
pub mod error;
pub mod geokeys;
#[cfg(feature = "netcdf")]
pub mod netcdf_reader;
pub mod reader;
pub mod struct_metadata;
pub mod subdataset;
pub mod types;

pub use collection::{collection_profile_for, CollectionProfile, CollectionTag};
pub use composer::BandComposer;
pub use config::{CogConfig, Compression};
pub use encoder::{CogEncoder, EncodedRaster, RasterEncoder};
pub use error::{RasterError, Result};
#[cfg(feature = "netcdf")]
pub use netcdf_reader::NetcdfReader;
pub use reader::{MemoryReader, SubdatasetReader};
pub use subdataset::{resolve, SubdatasetRef};
pub use types::{
    BandMeta, ComposedRaster, Crs, DataType, GeoTransform, OutputProfile, PixelBuffer,
    ProfileBuilder, SourceBand,
};
