//! Digest and verify byte sources against store-reported tags.

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

use tracing::debug;

use crate::digest::{ChunkedDigest, DEFAULT_CHUNK_SIZE};
use crate::error::{IntegrityError, Result};
use crate::tag::IntegrityTag;

/// Result of comparing a computed digest to a store-reported tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityOutcome {
    /// Tag computed from the local bytes
    pub computed: String,
    /// Tag reported by the store (normalised)
    pub reported: String,
    /// Chunk size used for the computation
    pub chunk_size: u64,
    /// Whether the two tags agree
    pub matched: bool,
}

/// Computes chunked-upload integrity tags.
///
/// File-backed and memory-backed sources go through the same
/// [`ChunkedDigest::compute`] path, so identical bytes and chunk size always
/// produce identical tags.
#[derive(Debug, Clone, Copy)]
pub struct ChecksumEngine {
    chunk_size: u64,
}

impl Default for ChecksumEngine {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ChecksumEngine {
    /// Create an engine with a non-default chunk size.
    pub fn new(chunk_size: u64) -> Result<Self> {
        if chunk_size == 0 {
            return Err(IntegrityError::InvalidChunkSize(chunk_size));
        }
        Ok(Self { chunk_size })
    }

    /// The engine's default chunk size.
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Digest any seekable source.
    pub fn digest<R: Read + Seek + ?Sized>(
        &self,
        source: &mut R,
        chunk_size: u64,
    ) -> Result<ChunkedDigest> {
        ChunkedDigest::compute(source, chunk_size)
    }

    /// Digest a file on disk.
    pub fn digest_file(&self, path: &Path, chunk_size: u64) -> Result<ChunkedDigest> {
        let mut reader = BufReader::new(File::open(path)?);
        self.digest(&mut reader, chunk_size)
    }

    /// Digest an in-memory buffer.
    pub fn digest_bytes(&self, data: &[u8], chunk_size: u64) -> Result<ChunkedDigest> {
        self.digest(&mut Cursor::new(data), chunk_size)
    }

    /// Compute a digest and compare it with `reported_tag`.
    ///
    /// `chunk_size` must be the part size the store actually used for the
    /// object (see [`chunk_size_for`]); a different chunk size yields a
    /// different tag even for identical bytes.
    pub fn verify<R: Read + Seek + ?Sized>(
        &self,
        source: &mut R,
        reported_tag: &str,
        chunk_size: u64,
    ) -> Result<IntegrityOutcome> {
        let reported = IntegrityTag::parse(reported_tag)?;

        let mut digest = ChunkedDigest::compute(source, chunk_size)?;
        if reported.is_multipart() && !digest.is_chunked() {
            // One-part multipart uploads are tagged `<hash>-1`
            digest = ChunkedDigest::compute_multipart(source, chunk_size)?;
        }

        let computed = digest.tag();
        let reported = reported.to_string();
        let matched = computed == reported;

        debug!(
            computed = %computed,
            reported = %reported,
            chunk_size = chunk_size,
            matched = matched,
            "Compared integrity tags"
        );

        Ok(IntegrityOutcome {
            computed,
            reported,
            chunk_size,
            matched,
        })
    }

    /// [`verify`](Self::verify) for a file on disk.
    pub fn verify_file(
        &self,
        path: &Path,
        reported_tag: &str,
        chunk_size: u64,
    ) -> Result<IntegrityOutcome> {
        let mut reader = BufReader::new(File::open(path)?);
        self.verify(&mut reader, reported_tag, chunk_size)
    }
}

/// Pick the chunk size to verify an object with.
///
/// Multipart tags must be recomputed with the store's own part size, which
/// is the content length of part 1. Plain tags do not depend on chunking as
/// long as the whole object fits in one chunk, so `default` is returned;
/// `object_len` widens it when the object is larger.
pub fn chunk_size_for(
    reported: &IntegrityTag,
    first_part_len: Option<u64>,
    object_len: u64,
    default: u64,
) -> u64 {
    match (reported.is_multipart(), first_part_len) {
        (true, Some(part_len)) if part_len > 0 => part_len,
        (true, _) => default,
        (false, _) => default.max(object_len),
    }
}
