//! Granule conversion pipeline.
//!
//! `locate -> [probe] -> fetch -> compose -> encode -> upload`, in order,
//! stopping at the first failure. Each run works in its own scratch
//! directory under the configured root, removed on every exit path.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use raster::{collection_profile_for, BandComposer, RasterEncoder, SubdatasetReader};
use storage::{ObjectStorage, StorageError};
use tracing::{debug, info, instrument, warn};

use crate::config::ConverterConfig;
use crate::error::{IngestionError, PipelineError, Stage};
use crate::granule::{Granule, OutputFile};
use crate::transfer::TransferVerifier;

/// Timestamp format of `created` in granule output.
pub const CREATED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

const SCRATCH_PREFIX: &str = "granule-cog-";

/// Converts one granule per call.
pub struct Pipeline {
    storage: Arc<dyn ObjectStorage>,
    reader: Arc<dyn SubdatasetReader>,
    encoder: Arc<dyn RasterEncoder>,
    transfer: TransferVerifier,
    config: ConverterConfig,
}

impl Pipeline {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        reader: Arc<dyn SubdatasetReader>,
        encoder: Arc<dyn RasterEncoder>,
        config: ConverterConfig,
    ) -> crate::Result<Self> {
        let transfer = TransferVerifier::new(Arc::clone(&storage), config.multipart_chunk_size)?;
        Ok(Self {
            storage,
            reader,
            encoder,
            transfer,
            config,
        })
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Convert `granule` and return it with its primary file entry
    /// describing the uploaded raster.
    #[instrument(skip(self, granule), fields(granule = %granule.granule_id, data_type = %granule.data_type))]
    pub async fn process(&self, granule: &Granule) -> Result<Granule, PipelineError> {
        let id = granule.granule_id.as_str();

        // Locate: everything here is pure, so an unknown collection fails
        // before any storage or disk access.
        let recipe = collection_profile_for(&granule.data_type).map_err(at(Stage::Locate, id))?;
        let source_key = granule.source_key().map_err(at(Stage::Locate, id))?;
        let output_key = granule.output_key().map_err(at(Stage::Locate, id))?;
        let output_name = granule.output_name().map_err(at(Stage::Locate, id))?;

        info!(
            collection = %recipe.tag(),
            source = %source_key,
            destination = %output_key,
            "Converting granule"
        );

        if self.config.skip_existing {
            match self.storage.head(&output_key).await {
                Ok(head) => {
                    info!(destination = %output_key, size = head.content_length, "Output already exists, skipping conversion");
                    let output = OutputFile::new(
                        self.storage.bucket(),
                        &output_key,
                        &output_name,
                        head.content_length,
                        created(head.last_modified),
                    );
                    return granule.augment_primary(output).map_err(at(Stage::Probe, id));
                }
                Err(StorageError::NotFound(_)) => {
                    debug!(destination = %output_key, "Output not produced yet");
                }
                Err(e) => return Err(PipelineError::new(Stage::Probe, id, e)),
            }
        }

        let scratch = self.scratch_dir().map_err(at(Stage::Fetch, id))?;

        let local = self
            .transfer
            .fetch_and_verify(&source_key, scratch.path())
            .await
            .map_err(at(Stage::Fetch, id))?;

        let raster = {
            let reader = Arc::clone(&self.reader);
            let cog = self.config.cog.clone();
            let path = local.path.clone();
            tokio::task::spawn_blocking(move || {
                BandComposer::new(reader.as_ref(), &cog).compose(&path, &recipe)
            })
            .await
            .map_err(at(Stage::Compose, id))?
            .map_err(at(Stage::Compose, id))?
        };

        debug!(
            bands = raster.bands.len(),
            width = raster.profile.width,
            height = raster.profile.height,
            dtype = %raster.profile.dtype,
            "Composed raster"
        );

        let artifact = self
            .transfer
            .encode(raster, Arc::clone(&self.encoder), &output_key, scratch.path())
            .await
            .map_err(at(Stage::Encode, id))?;

        let remote = self
            .transfer
            .upload_and_verify(artifact, &output_key)
            .await
            .map_err(at(Stage::Upload, id))?;

        let output = OutputFile::new(
            &remote.bucket,
            &remote.key,
            &output_name,
            remote.size,
            created(remote.last_modified),
        );
        let converted = granule.augment_primary(output).map_err(at(Stage::Upload, id))?;

        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            warn!(path = %scratch_path.display(), error = %e, "Failed to remove scratch directory");
        }

        info!(
            destination = %remote.key,
            size = remote.size,
            parts = remote.parts,
            "Granule converted"
        );

        Ok(converted)
    }

    fn scratch_dir(&self) -> crate::Result<tempfile::TempDir> {
        let root: &Path = &self.config.scratch_dir;
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(root)?;
        debug!(path = %dir.path().display(), "Created scratch directory");
        Ok(dir)
    }
}

fn at<E: Into<IngestionError>>(stage: Stage, granule: &str) -> impl FnOnce(E) -> PipelineError + '_ {
    move |e| PipelineError::new(stage, granule, e)
}

fn created(last_modified: Option<DateTime<Utc>>) -> String {
    last_modified
        .unwrap_or_else(Utc::now)
        .format(CREATED_FORMAT)
        .to_string()
}
