//! Chunked MD5 digests matching the store's multipart ETag algorithm.

use std::io::{ErrorKind, Read, Seek, SeekFrom};

use md5::{Digest, Md5};

use crate::error::{IntegrityError, Result};

/// Default multipart threshold and part size (8 MiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 8 * 1024 * 1024;

/// Read buffer used while streaming a source through the hasher.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// A computed integrity tag for one byte source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDigest {
    chunk_digests: Vec<[u8; 16]>,
    chunk_size: u64,
    length: u64,
    chunked: bool,
}

impl ChunkedDigest {
    /// Digest a source the way the store tags it.
    ///
    /// Sources of at most `chunk_size` bytes get a plain whole-source MD5;
    /// longer sources are split into `chunk_size` parts and tagged
    /// `md5(concat(part md5s))-<parts>`.
    ///
    /// The whole source is hashed from offset 0 and the stream position is
    /// restored before returning, so repeated calls are side-effect free.
    pub fn compute<R: Read + Seek + ?Sized>(source: &mut R, chunk_size: u64) -> Result<Self> {
        Self::compute_inner(source, chunk_size, false)
    }

    /// Digest a source in multipart form regardless of its length.
    ///
    /// Needed for objects uploaded as a single-part multipart upload, which
    /// the store tags as `<hash>-1`.
    pub fn compute_multipart<R: Read + Seek + ?Sized>(
        source: &mut R,
        chunk_size: u64,
    ) -> Result<Self> {
        Self::compute_inner(source, chunk_size, true)
    }

    fn compute_inner<R: Read + Seek + ?Sized>(
        source: &mut R,
        chunk_size: u64,
        force_chunked: bool,
    ) -> Result<Self> {
        if chunk_size == 0 {
            return Err(IntegrityError::InvalidChunkSize(chunk_size));
        }

        let original_position = source.stream_position()?;
        let hashed = hash_chunks(source, chunk_size);
        source.seek(SeekFrom::Start(original_position))?;
        let (chunk_digests, length) = hashed?;

        Ok(Self {
            chunk_digests,
            chunk_size,
            length,
            chunked: force_chunked || length > chunk_size,
        })
    }

    /// The tag string, directly comparable to a store-reported ETag.
    pub fn tag(&self) -> String {
        if !self.chunked {
            return hex::encode(self.chunk_digests[0]);
        }

        let mut hasher = Md5::new();
        for digest in &self.chunk_digests {
            hasher.update(digest);
        }
        format!(
            "{}-{}",
            hex::encode(hasher.finalize()),
            self.chunk_digests.len()
        )
    }

    /// Raw per-chunk digests in source order.
    pub fn chunk_digests(&self) -> &[[u8; 16]] {
        &self.chunk_digests
    }

    /// Number of chunks the source was split into.
    pub fn chunk_count(&self) -> usize {
        self.chunk_digests.len()
    }

    /// Chunk size used for this digest.
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Total number of bytes hashed.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Whether the tag is in multipart (`<hash>-<n>`) form.
    pub fn is_chunked(&self) -> bool {
        self.chunked
    }
}

impl std::fmt::Display for ChunkedDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Stream the source from the start, hashing each `chunk_size` span.
///
/// Always yields at least one digest (an empty source hashes to the MD5 of
/// the empty string).
fn hash_chunks<R: Read + Seek + ?Sized>(
    source: &mut R,
    chunk_size: u64,
) -> Result<(Vec<[u8; 16]>, u64)> {
    source.seek(SeekFrom::Start(0))?;

    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    let mut digests = Vec::new();
    let mut hasher = Md5::new();
    let mut filled: u64 = 0;
    let mut total: u64 = 0;

    loop {
        let remaining_in_chunk = chunk_size - filled;
        let want = remaining_in_chunk.min(READ_BUFFER_SIZE as u64) as usize;

        let read = match source.read(&mut buffer[..want]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };

        hasher.update(&buffer[..read]);
        filled += read as u64;
        total += read as u64;

        if filled == chunk_size {
            digests.push(to_array(&hasher.finalize_reset()));
            filled = 0;
        }
    }

    if filled > 0 || digests.is_empty() {
        digests.push(to_array(&hasher.finalize()));
    }

    Ok((digests, total))
}

fn to_array(digest: &[u8]) -> [u8; 16] {
    let mut out = [0u8; 16];
    out.copy_from_slice(digest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const EMPTY_MD5: &str = "d41d8cd98f00b204e9800998ecf8427e";

    #[test]
    fn test_empty_source_is_plain_md5() {
        let digest = ChunkedDigest::compute(&mut Cursor::new(Vec::<u8>::new()), 8).unwrap();
        assert_eq!(digest.tag(), EMPTY_MD5);
        assert_eq!(digest.chunk_count(), 1);
        assert!(!digest.is_chunked());
    }

    #[test]
    fn test_exactly_chunk_size_is_plain() {
        let data = vec![7u8; 16];
        let digest = ChunkedDigest::compute(&mut Cursor::new(&data), 16).unwrap();
        assert!(!digest.is_chunked());
        assert_eq!(digest.tag(), hex::encode(Md5::digest(&data)));
    }

    #[test]
    fn test_one_byte_over_chunk_size_is_two_parts() {
        let data = vec![7u8; 17];
        let digest = ChunkedDigest::compute(&mut Cursor::new(&data), 16).unwrap();
        assert!(digest.is_chunked());
        assert_eq!(digest.chunk_count(), 2);
        assert!(digest.tag().ends_with("-2"));
    }

    #[test]
    fn test_multipart_tag_matches_manual_computation() {
        let data: Vec<u8> = (0..100u8).collect();
        let digest = ChunkedDigest::compute(&mut Cursor::new(&data), 40).unwrap();

        let mut concat = Vec::new();
        for chunk in data.chunks(40) {
            concat.extend_from_slice(&Md5::digest(chunk));
        }
        let expected = format!("{}-3", hex::encode(Md5::digest(&concat)));

        assert_eq!(digest.tag(), expected);
    }

    #[test]
    fn test_chunk_boundary_independent_of_read_buffer() {
        // Chunk size not aligned with the internal read buffer
        let data = vec![3u8; READ_BUFFER_SIZE * 2 + 5];
        let chunk = READ_BUFFER_SIZE as u64 + 1;
        let digest = ChunkedDigest::compute(&mut Cursor::new(&data), chunk).unwrap();

        let expected: Vec<[u8; 16]> = data
            .chunks(chunk as usize)
            .map(|c| to_array(&Md5::digest(c)))
            .collect();
        assert_eq!(digest.chunk_digests(), expected.as_slice());
    }

    #[test]
    fn test_position_restored() {
        let mut cursor = Cursor::new(vec![1u8; 50]);
        cursor.set_position(13);
        ChunkedDigest::compute(&mut cursor, 8).unwrap();
        assert_eq!(cursor.position(), 13);
    }

    #[test]
    fn test_hashes_from_start_regardless_of_position() {
        let data = vec![9u8; 30];
        let mut cursor = Cursor::new(&data);
        let first = ChunkedDigest::compute(&mut cursor, 8).unwrap();
        cursor.set_position(20);
        let second = ChunkedDigest::compute(&mut cursor, 8).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_forced_multipart_single_part() {
        let data = b"abc".to_vec();
        let digest = ChunkedDigest::compute_multipart(&mut Cursor::new(&data), 16).unwrap();
        let inner = Md5::digest(&data);
        let expected = format!("{}-1", hex::encode(Md5::digest(inner)));
        assert_eq!(digest.tag(), expected);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let result = ChunkedDigest::compute(&mut Cursor::new(vec![1u8]), 0);
        assert!(matches!(result, Err(IntegrityError::InvalidChunkSize(0))));
    }
}
