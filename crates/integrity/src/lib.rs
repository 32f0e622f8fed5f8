//! Content-integrity tags for object-store transfers.
//!
//! S3-compatible stores report an ETag that is computed differently
//! depending on how the object was uploaded:
//!
//! - single-part upload: hex MD5 of the whole object
//! - multipart upload: hex MD5 of the concatenated raw part MD5s, followed
//!   by `-<part count>`
//!
//! This crate reproduces both forms for any seekable byte source so a local
//! file (or buffer) can be compared byte-for-byte against what the store
//! reports.
//!
//! # Example
//!
//! ```
//! use integrity::{ChecksumEngine, DEFAULT_CHUNK_SIZE};
//!
//! let engine = ChecksumEngine::default();
//! let digest = engine.digest_bytes(b"abc", DEFAULT_CHUNK_SIZE).unwrap();
//! assert_eq!(digest.tag(), "900150983cd24fb0d6963f7d28e17f72");
//! ```

pub mod digest;
pub mod engine;
pub mod error;
pub mod tag;

pub use digest::{ChunkedDigest, DEFAULT_CHUNK_SIZE};
pub use engine::{chunk_size_for, ChecksumEngine, IntegrityOutcome};
pub use error::{IntegrityError, Result};
pub use tag::IntegrityTag;
