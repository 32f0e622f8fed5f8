//! Integrity-checked transfers between the object store and local scratch.
//!
//! Every object that crosses the boundary is digested locally and compared
//! with the tag the store reports for it. Nothing is retried; a mismatch is
//! returned to the caller with both tags and the chunk size used.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use integrity::{chunk_size_for, ChecksumEngine, IntegrityOutcome, IntegrityTag};
use raster::{ComposedRaster, RasterEncoder};
use storage::{ObjectHead, ObjectStorage, StoragePath};
use tracing::{debug, info, instrument, warn};

use crate::error::{IngestionError, Result};

/// A downloaded object whose bytes matched the store's tag.
#[derive(Debug, Clone)]
pub struct LocalObject {
    pub key: String,
    pub path: PathBuf,
    pub size: u64,
    pub outcome: IntegrityOutcome,
}

/// An uploaded object whose stored tag matched the local bytes.
#[derive(Debug, Clone)]
pub struct RemoteObject {
    pub bucket: String,
    pub key: String,
    /// Content length reported by the store after upload
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    /// Number of upload requests used (1 for a single put)
    pub parts: u32,
    pub outcome: IntegrityOutcome,
}

/// An encoded file read back into memory, with the tag its upload must
/// produce.
#[derive(Debug, Clone)]
pub struct EncodedArtifact {
    pub path: PathBuf,
    pub data: Bytes,
    pub tag: String,
    /// Upload part size the tag was computed with
    pub chunk_size: u64,
}

/// Moves objects to and from the store, verifying each transfer.
pub struct TransferVerifier {
    storage: Arc<dyn ObjectStorage>,
    engine: ChecksumEngine,
}

impl TransferVerifier {
    /// `chunk_size` is both the upload part size and the default digest
    /// chunk size.
    pub fn new(storage: Arc<dyn ObjectStorage>, chunk_size: u64) -> Result<Self> {
        Ok(Self {
            storage,
            engine: ChecksumEngine::new(chunk_size)?,
        })
    }

    pub fn chunk_size(&self) -> u64 {
        self.engine.chunk_size()
    }

    /// Download `key` into `dest_dir` and check it against the stored tag.
    #[instrument(skip(self, dest_dir))]
    pub async fn fetch_and_verify(&self, key: &str, dest_dir: &Path) -> Result<LocalObject> {
        let data = self.storage.get(key).await?;
        let size = data.len() as u64;
        let path = dest_dir.join(StoragePath::file_name(key));
        tokio::fs::write(&path, &data).await?;
        drop(data);

        debug!(key = %key, path = %path.display(), size = size, "Downloaded object");

        let head = self.storage.head(key).await?;
        let (reported, tag) = reported_tag(key, &head)?;

        let first_part_len = if tag.is_multipart() {
            Some(self.storage.head_part(key, 1).await?.content_length)
        } else {
            None
        };
        let chunk_size = chunk_size_for(&tag, first_part_len, size, self.engine.chunk_size());

        let outcome = self.verify(path.clone(), reported, chunk_size).await?;
        if !outcome.matched {
            warn!(
                key = %key,
                expected = %outcome.reported,
                computed = %outcome.computed,
                chunk_size = chunk_size,
                "Downloaded object failed integrity check"
            );
            return Err(IngestionError::DownloadIntegrityMismatch {
                key: key.to_string(),
                expected: outcome.reported,
                computed: outcome.computed,
                chunk_size,
            });
        }

        info!(key = %key, size = size, tag = %outcome.computed, "Verified download");

        Ok(LocalObject {
            key: key.to_string(),
            path,
            size,
            outcome,
        })
    }

    /// Encode `raster` into `scratch_dir`, upload it as `key` and check the
    /// stored tag against the local file.
    pub async fn encode_and_verify(
        &self,
        raster: ComposedRaster,
        encoder: Arc<dyn RasterEncoder>,
        key: &str,
        scratch_dir: &Path,
    ) -> Result<RemoteObject> {
        let artifact = self.encode(raster, encoder, key, scratch_dir).await?;
        self.upload_and_verify(artifact, key).await
    }

    /// Encode `raster` into `scratch_dir` and digest the result with the
    /// chunk size it will be uploaded with.
    #[instrument(skip(self, raster, encoder, scratch_dir))]
    pub async fn encode(
        &self,
        raster: ComposedRaster,
        encoder: Arc<dyn RasterEncoder>,
        key: &str,
        scratch_dir: &Path,
    ) -> Result<EncodedArtifact> {
        let path = scratch_dir.join(StoragePath::file_name(key));
        let encoded = {
            let path = path.clone();
            tokio::task::spawn_blocking(move || encoder.encode(&raster, &path)).await??
        };

        let data = Bytes::from(tokio::fs::read(&encoded.path).await?);
        let chunk_size = self.engine.chunk_size();
        let digest = {
            let engine = self.engine;
            let data = data.clone();
            tokio::task::spawn_blocking(move || engine.digest_bytes(&data, chunk_size)).await??
        };

        debug!(
            path = %encoded.path.display(),
            size = data.len(),
            tag = %digest.tag(),
            "Digested encoded file"
        );

        Ok(EncodedArtifact {
            path: encoded.path,
            data,
            tag: digest.tag(),
            chunk_size,
        })
    }

    /// Upload an encoded file and compare the stored tag with the digest
    /// taken before the upload.
    ///
    /// Files no larger than the chunk size go up in one request; larger ones
    /// as a multipart upload with the chunk size as part size.
    #[instrument(skip(self, artifact), fields(path = %artifact.path.display()))]
    pub async fn upload_and_verify(&self, artifact: EncodedArtifact, key: &str) -> Result<RemoteObject> {
        let EncodedArtifact {
            data,
            tag: computed,
            chunk_size,
            ..
        } = artifact;
        let size = data.len();

        let parts = if size as u64 <= chunk_size {
            self.storage.put(key, data).await?;
            1
        } else {
            let part_size = usize::try_from(chunk_size).map_err(|_| {
                IngestionError::InvalidConfig(format!("chunk size {} is too large", chunk_size))
            })?;
            self.storage.put_multipart(key, data, part_size).await?
        };

        debug!(key = %key, size = size, parts = parts, "Uploaded object");

        let head = self.storage.head(key).await?;
        let (_, reported) = reported_tag(key, &head)?;
        let reported = reported.to_string();
        let matched = computed == reported;

        if !matched {
            warn!(
                key = %key,
                expected = %reported,
                computed = %computed,
                chunk_size = chunk_size,
                "Uploaded object failed integrity check"
            );
            return Err(IngestionError::UploadIntegrityMismatch {
                key: key.to_string(),
                expected: reported,
                computed,
                chunk_size,
            });
        }

        info!(
            key = %key,
            size = head.content_length,
            parts = parts,
            tag = %computed,
            "Verified upload"
        );

        Ok(RemoteObject {
            bucket: self.storage.bucket().to_string(),
            key: key.to_string(),
            size: head.content_length,
            last_modified: head.last_modified,
            parts,
            outcome: IntegrityOutcome {
                computed,
                reported,
                chunk_size,
                matched,
            },
        })
    }

    async fn verify(&self, path: PathBuf, reported: String, chunk_size: u64) -> Result<IntegrityOutcome> {
        let engine = self.engine;
        let outcome = tokio::task::spawn_blocking(move || {
            engine.verify_file(&path, &reported, chunk_size)
        })
        .await??;
        Ok(outcome)
    }
}

fn reported_tag(key: &str, head: &ObjectHead) -> Result<(String, IntegrityTag)> {
    let raw = head
        .e_tag
        .clone()
        .ok_or_else(|| IngestionError::MissingIntegrityTag(key.to_string()))?;
    let tag = IntegrityTag::parse(&raw)?;
    Ok((raw, tag))
}
