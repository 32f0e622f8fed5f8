//! S3-compatible storage backend using the AWS SDK.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use crate::error::{StorageError, StorageResult};
use crate::object_store::{ObjectHead, ObjectStorage, ObjectStorageConfig};

/// Minimum part size for S3 multipart uploads (5 MiB).
/// S3 requires all parts except the last to be at least 5 MiB.
pub const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// Object storage client backed by S3 or an S3-compatible service.
pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    /// Create a new S3 client from config.
    pub async fn new(config: &ObjectStorageConfig) -> StorageResult<Self> {
        config.validate()?;

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);

        if let (Some(key_id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            let credentials = aws_sdk_s3::config::Credentials::new(
                key_id.clone(),
                secret.clone(),
                None,
                None,
                "granule-cog-config",
            );
            builder = builder.credentials_provider(credentials);
        }

        if let Some(endpoint) = &config.endpoint {
            let lower = endpoint.to_ascii_lowercase();
            let endpoint = if lower.starts_with("http://") || lower.starts_with("https://") {
                endpoint.clone()
            } else {
                format!("http://{}", endpoint)
            };
            builder = builder.endpoint_url(endpoint);
        }

        if config.force_path_style {
            builder = builder.force_path_style(true);
        }

        debug!(
            bucket = %config.bucket,
            endpoint = ?config.endpoint,
            region = %config.region,
            "Created S3 client"
        );

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        })
    }

    /// Convert an AWS SDK error to StorageError, mapping 404 to NotFound.
    fn map_sdk_error<E>(err: aws_sdk_s3::error::SdkError<E>, key: &str) -> StorageError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        if let aws_sdk_s3::error::SdkError::ServiceError(ref service_err) = err {
            if service_err.raw().status().as_u16() == 404 {
                return StorageError::NotFound(key.to_string());
            }
        }
        StorageError::S3(Box::new(err))
    }

    async fn head_inner(&self, key: &str, part_number: Option<u32>) -> StorageResult<ObjectHead> {
        let mut request = self.client.head_object().bucket(&self.bucket).key(key);
        if let Some(part) = part_number {
            request = request.part_number(part as i32);
        }

        let output = request
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, key))?;

        let last_modified = output.last_modified().and_then(|dt| {
            let converted = DateTime::<Utc>::from_timestamp(dt.secs(), dt.subsec_nanos());
            if converted.is_none() {
                warn!(key = %key, timestamp = dt.secs(), "Failed to convert S3 timestamp");
            }
            converted
        });

        Ok(ObjectHead {
            content_length: output.content_length().unwrap_or(0).max(0) as u64,
            last_modified,
            e_tag: output.e_tag().map(|s| s.to_string()),
            parts_count: output
                .parts_count()
                .and_then(|n| u32::try_from(n).ok())
                .filter(|n| *n > 0),
        })
    }

    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        data: &Bytes,
        part_size: usize,
    ) -> StorageResult<Vec<CompletedPart>> {
        let mut parts = Vec::new();

        for (index, start) in (0..data.len()).step_by(part_size).enumerate() {
            let end = (start + part_size).min(data.len());
            let part_number = (index + 1) as i32;

            let output = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(data.slice(start..end).into())
                .send()
                .await
                .map_err(|e| Self::map_sdk_error(e, key))?;

            parts.push(
                CompletedPart::builder()
                    .e_tag(output.e_tag().unwrap_or_default())
                    .part_number(part_number)
                    .build(),
            );
        }

        Ok(parts)
    }

    async fn abort(&self, key: &str, upload_id: &str) {
        if let Err(e) = self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
        {
            warn!(
                key = %key,
                upload_id = %upload_id,
                error = %e,
                "Failed to abort multipart upload, orphaned parts may remain"
            );
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, key))?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::S3(Box::new(e)))?
            .into_bytes();

        debug!(size = bytes.len(), "Read object");
        Ok(bytes)
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn head(&self, key: &str) -> StorageResult<ObjectHead> {
        self.head_inner(key, None).await
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn head_part(&self, key: &str, part_number: u32) -> StorageResult<ObjectHead> {
        if part_number == 0 {
            return Err(StorageError::InvalidPart {
                key: key.to_string(),
                part: part_number,
            });
        }
        self.head_inner(key, Some(part_number)).await
    }

    #[instrument(skip(self, data), fields(bucket = %self.bucket, size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(data.into())
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, key))?;

        debug!("Wrote object");
        Ok(())
    }

    #[instrument(skip(self, data), fields(bucket = %self.bucket, size = data.len()))]
    async fn put_multipart(&self, key: &str, data: Bytes, part_size: usize) -> StorageResult<u32> {
        if part_size < MIN_PART_SIZE {
            return Err(StorageError::InvalidPartSize(part_size));
        }

        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, key))?;

        let upload_id = created
            .upload_id()
            .ok_or_else(|| StorageError::MissingField {
                key: key.to_string(),
                field: "upload_id",
            })?
            .to_string();

        let parts = match self.upload_parts(key, &upload_id, &data, part_size).await {
            Ok(parts) if !parts.is_empty() => parts,
            Ok(_) => {
                // Multipart parts must be at least one byte
                self.abort(key, &upload_id).await;
                self.put(key, data).await?;
                return Ok(1);
            }
            Err(e) => {
                self.abort(key, &upload_id).await;
                return Err(e);
            }
        };

        let part_count = parts.len() as u32;
        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();

        if let Err(e) = self
            .client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(&upload_id)
            .multipart_upload(completed)
            .send()
            .await
        {
            self.abort(key, &upload_id).await;
            return Err(Self::map_sdk_error(e, key));
        }

        debug!(parts = part_count, "Completed multipart upload");
        Ok(part_count)
    }
}
