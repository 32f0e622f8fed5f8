//! Parsing of store-reported integrity tags.

use std::fmt;
use std::str::FromStr;

use crate::error::{IntegrityError, Result};

/// A store-reported integrity tag (ETag), normalised.
///
/// Stores return the tag wrapped in double quotes, e.g. `"9b2c...-3"`.
/// Quotes are stripped and the hash is lowercased so tags compare equal
/// regardless of how the store rendered them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityTag {
    hash: String,
    part_count: Option<u32>,
}

impl IntegrityTag {
    /// Parse a raw tag string.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim().trim_matches('"');

        let (hash, part_count) = match trimmed.split_once('-') {
            Some((hash, count)) => {
                let count: u32 = count
                    .parse()
                    .map_err(|_| IntegrityError::MalformedTag(raw.to_string()))?;
                if count == 0 {
                    return Err(IntegrityError::MalformedTag(raw.to_string()));
                }
                (hash, Some(count))
            }
            None => (trimmed, None),
        };

        if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(IntegrityError::MalformedTag(raw.to_string()));
        }

        Ok(Self {
            hash: hash.to_ascii_lowercase(),
            part_count,
        })
    }

    /// The hex hash portion.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Number of parts, for tags produced by a multipart upload.
    pub fn part_count(&self) -> Option<u32> {
        self.part_count
    }

    /// Whether the tag was produced by a multipart upload.
    pub fn is_multipart(&self) -> bool {
        self.part_count.is_some()
    }
}

impl FromStr for IntegrityTag {
    type Err = IntegrityError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for IntegrityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.part_count {
            Some(count) => write!(f, "{}-{}", self.hash, count),
            None => write!(f, "{}", self.hash),
        }
    }
}
