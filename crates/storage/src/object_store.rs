//! Object storage interface (S3 compatible).

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// Metadata returned by a head request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHead {
    /// Size in bytes. For a part head this is the size of that part.
    pub content_length: u64,
    /// Last modification time as reported by the store.
    pub last_modified: Option<DateTime<Utc>>,
    /// Entity tag, as returned (may be quoted).
    pub e_tag: Option<String>,
    /// Number of parts, present for multipart objects when a part was requested.
    pub parts_count: Option<u32>,
}

/// Object storage operations needed for granule conversion.
///
/// Keys are bucket-relative and never start with '/'.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Bucket this store reads from and writes to.
    fn bucket(&self) -> &str;

    /// Read a whole object.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Object metadata.
    async fn head(&self, key: &str) -> StorageResult<ObjectHead>;

    /// Metadata for one part of an object (1-based part number).
    ///
    /// For an object uploaded in one request the whole object is part 1.
    async fn head_part(&self, key: &str, part_number: u32) -> StorageResult<ObjectHead>;

    /// Write an object in a single request.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Write an object as a multipart upload with fixed-size parts.
    ///
    /// Returns the number of parts uploaded.
    async fn put_multipart(&self, key: &str, data: Bytes, part_size: usize) -> StorageResult<u32>;

    /// Check if an object exists.
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self.head(key).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Configuration for object storage connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStorageConfig {
    /// Bucket name
    pub bucket: String,
    /// Custom endpoint URL (MinIO, localstack). `None` means AWS S3.
    pub endpoint: Option<String>,
    /// AWS region (use "us-east-1" for MinIO)
    pub region: String,
    /// Access key ID. Falls back to the ambient AWS credential chain when unset.
    pub access_key_id: Option<String>,
    /// Secret access key
    pub secret_access_key: Option<String>,
    /// Path-style addressing (required by MinIO)
    pub force_path_style: bool,
}

impl ObjectStorageConfig {
    /// Configuration for AWS S3 with ambient credentials.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            endpoint: None,
            region: "us-east-1".to_string(),
            access_key_id: None,
            secret_access_key: None,
            force_path_style: false,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// `BUCKET` is required. Optional: `S3_ENDPOINT`, `S3_REGION` (or
    /// `AWS_REGION`), `S3_ACCESS_KEY`, `S3_SECRET_KEY`, `S3_FORCE_PATH_STYLE`.
    pub fn from_env() -> StorageResult<Self> {
        let bucket = std::env::var("BUCKET")
            .map_err(|_| StorageError::Config("BUCKET is not set".to_string()))?;

        let region = std::env::var("S3_REGION")
            .or_else(|_| std::env::var("AWS_REGION"))
            .unwrap_or_else(|_| "us-east-1".to_string());

        let force_path_style = std::env::var("S3_FORCE_PATH_STYLE")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        let config = Self {
            bucket,
            endpoint: std::env::var("S3_ENDPOINT").ok().filter(|s| !s.is_empty()),
            region,
            access_key_id: std::env::var("S3_ACCESS_KEY").ok(),
            secret_access_key: std::env::var("S3_SECRET_KEY").ok(),
            force_path_style,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> StorageResult<()> {
        if self.bucket.is_empty() {
            return Err(StorageError::Config("bucket must not be empty".to_string()));
        }
        if self.access_key_id.is_some() != self.secret_access_key.is_some() {
            return Err(StorageError::Config(
                "access key and secret key must be set together".to_string(),
            ));
        }
        Ok(())
    }
}

/// Helpers for building storage keys and URIs.
pub struct StoragePath;

impl StoragePath {
    /// Join a staging directory and a file name into an object key.
    pub fn staged(staging_dir: &str, name: &str) -> String {
        let dir = staging_dir.trim_matches('/');
        if dir.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", dir, name)
        }
    }

    /// `s3://bucket/key` form of a location.
    pub fn s3_uri(bucket: &str, key: &str) -> String {
        format!("s3://{}/{}", bucket, key.trim_start_matches('/'))
    }

    /// Last path component of a key.
    pub fn file_name(key: &str) -> &str {
        key.rsplit('/').next().unwrap_or(key)
    }
}
