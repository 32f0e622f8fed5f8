//! Storage abstractions for granule conversion.
//!
//! Provides one interface, [`ObjectStorage`], over:
//! - S3-compatible object storage (AWS S3, MinIO) via the AWS SDK
//! - An in-memory store that reproduces S3 ETag semantics, for tests and
//!   local runs
//!
//! Besides plain get/put the interface exposes what integrity checking
//! needs: the store's ETag, the part count of multipart objects, the size of
//! an individual part, and multipart uploads with a caller-chosen part size.

pub mod error;
pub mod memory;
pub mod object_store;
pub mod s3;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStorage;
pub use self::object_store::{ObjectHead, ObjectStorage, ObjectStorageConfig, StoragePath};
pub use s3::S3Storage;
