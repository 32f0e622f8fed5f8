//! Granule conversion: integrity-checked download of a MODIS container,
//! band composition, cloud-optimized GeoTIFF encoding and
//! integrity-checked upload.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ingestion::{ConverterConfig, Granule, Pipeline};
//! use raster::{CogEncoder, MemoryReader};
//! use storage::MemoryStorage;
//!
//! # async fn run(granule: Granule) -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConverterConfig::from_env();
//! let pipeline = Pipeline::new(
//!     Arc::new(MemoryStorage::new("bucket")),
//!     Arc::new(MemoryReader::new()),
//!     Arc::new(CogEncoder::new(config.cog.clone())?),
//!     config,
//! )?;
//! let converted = pipeline.process(&granule).await?;
//! println!("{}", serde_json::to_string(&converted)?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod granule;
pub mod pipeline;
pub mod transfer;

pub use config::{ConverterConfig, DEFAULT_MULTIPART_CHUNK_SIZE, MIN_MULTIPART_CHUNK_SIZE};
pub use error::{IngestionError, PipelineError, Result, Stage};
pub use granule::{Granule, GranuleFile, OutputFile};
pub use pipeline::{Pipeline, CREATED_FORMAT};
pub use transfer::{EncodedArtifact, LocalObject, RemoteObject, TransferVerifier};
