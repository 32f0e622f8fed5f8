//! MODIS granule to COG conversion task.
//!
//! Reads a workflow event (file or stdin), converts its granule and writes
//! the workflow output (file or stdout) as JSON.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ingestion::{ConverterConfig, Pipeline};
use raster::{CogEncoder, SubdatasetReader};
use storage::{ObjectStorageConfig, S3Storage};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "cog-converter")]
#[command(about = "Convert MODIS vegetation-index granules to cloud-optimized GeoTIFF")]
struct Args {
    /// Workflow event JSON file (reads stdin when omitted)
    #[arg(short, long, env = "EVENT_FILE")]
    event: Option<PathBuf>,

    /// Where to write the workflow output (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // RUST_LOG wins over --log-level, e.g. RUST_LOG=info,storage=debug
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    // Logs go to stderr so stdout carries only the workflow output
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    run(args).await
}

async fn run(args: Args) -> Result<()> {
    let raw = match &args.event {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading event file {}", path.display()))?,
        None => {
            let mut raw = String::new();
            std::io::stdin().read_to_string(&mut raw)?;
            raw
        }
    };
    let event = cog_converter::parse_event(&raw)?;

    let config = ConverterConfig::from_env();
    config.validate()?;
    let storage_config = ObjectStorageConfig::from_env()?;

    info!(
        bucket = %storage_config.bucket,
        chunk_size = config.multipart_chunk_size,
        scratch_dir = %config.scratch_dir.display(),
        tile_size = config.cog.tile_size,
        compression = %config.cog.compression,
        "Starting COG converter"
    );

    let storage = Arc::new(S3Storage::new(&storage_config).await?);
    let encoder = Arc::new(CogEncoder::new(config.cog.clone())?);
    let pipeline = Pipeline::new(storage, reader()?, encoder, config)?;

    let output = cog_converter::handle(&pipeline, event).await?;
    let json = serde_json::to_string_pretty(&output)?;

    match &args.output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("writing output to {}", path.display()))?,
        None => println!("{}", json),
    }

    Ok(())
}

#[cfg(feature = "netcdf")]
fn reader() -> Result<Arc<dyn SubdatasetReader>> {
    Ok(Arc::new(raster::NetcdfReader::new()))
}

#[cfg(not(feature = "netcdf"))]
fn reader() -> Result<Arc<dyn SubdatasetReader>> {
    anyhow::bail!("cog-converter was built without the `netcdf` feature and cannot read HDF4 containers")
}
