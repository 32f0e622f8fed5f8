//! In-memory object storage.
//!
//! Reproduces the S3 behaviors the converter depends on: ETags are the MD5
//! of the body for single-request uploads and `md5(part md5s)-N` for
//! multipart uploads, and part heads report per-part sizes.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::object_store::{ObjectHead, ObjectStorage};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    /// Part sizes for multipart uploads; empty for single-request uploads.
    part_sizes: Vec<u64>,
    e_tag: String,
    last_modified: DateTime<Utc>,
}

/// Object storage held in process memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    bucket: String,
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl MemoryStorage {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the stored ETag of an object, keeping its body.
    ///
    /// Used to simulate a store whose reported tag disagrees with the bytes.
    pub async fn override_tag(&self, key: &str, e_tag: &str) -> StorageResult<()> {
        let mut objects = self.objects.write().await;
        let object = objects
            .get_mut(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        object.e_tag = e_tag.to_string();
        Ok(())
    }

    /// All keys currently stored, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    async fn store(&self, key: &str, data: Bytes, part_sizes: Vec<u64>, e_tag: String) {
        let object = StoredObject {
            data,
            part_sizes,
            e_tag,
            last_modified: Utc::now(),
        };
        self.objects.write().await.insert(key.to_string(), object);
    }
}

fn quoted(tag: String) -> String {
    format!("\"{}\"", tag)
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|o| o.data.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn head(&self, key: &str) -> StorageResult<ObjectHead> {
        let objects = self.objects.read().await;
        let object = objects
            .get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;

        Ok(ObjectHead {
            content_length: object.data.len() as u64,
            last_modified: Some(object.last_modified),
            e_tag: Some(object.e_tag.clone()),
            parts_count: None,
        })
    }

    async fn head_part(&self, key: &str, part_number: u32) -> StorageResult<ObjectHead> {
        let objects = self.objects.read().await;
        let object = objects
            .get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;

        let invalid = || StorageError::InvalidPart {
            key: key.to_string(),
            part: part_number,
        };

        if part_number == 0 {
            return Err(invalid());
        }

        let (content_length, parts_count) = if object.part_sizes.is_empty() {
            if part_number != 1 {
                return Err(invalid());
            }
            (object.data.len() as u64, None)
        } else {
            let size = object
                .part_sizes
                .get(part_number as usize - 1)
                .copied()
                .ok_or_else(invalid)?;
            (size, Some(object.part_sizes.len() as u32))
        };

        Ok(ObjectHead {
            content_length,
            last_modified: Some(object.last_modified),
            e_tag: Some(object.e_tag.clone()),
            parts_count,
        })
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        let e_tag = quoted(hex::encode(Md5::digest(&data)));
        debug!(key = %key, size = data.len(), "Stored object in memory");
        self.store(key, data, Vec::new(), e_tag).await;
        Ok(())
    }

    async fn put_multipart(&self, key: &str, data: Bytes, part_size: usize) -> StorageResult<u32> {
        if part_size == 0 {
            return Err(StorageError::InvalidPartSize(part_size));
        }
        if data.is_empty() {
            self.put(key, data).await?;
            return Ok(1);
        }

        let mut combined = Md5::new();
        let mut part_sizes = Vec::new();
        for part in data.chunks(part_size) {
            combined.update(Md5::digest(part));
            part_sizes.push(part.len() as u64);
        }

        let part_count = part_sizes.len() as u32;
        let e_tag = quoted(format!("{}-{}", hex::encode(combined.finalize()), part_count));
        debug!(key = %key, size = data.len(), parts = part_count, "Stored multipart object in memory");
        self.store(key, data, part_sizes, e_tag).await;
        Ok(part_count)
    }
}
