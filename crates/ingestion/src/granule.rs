//! Workflow granule descriptors.
//!
//! Granules arrive as JSON from the workflow engine and are handed back with
//! the primary file entry rewritten to describe the converted artifact.
//! Fields this crate does not use are carried through unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use storage::StoragePath;

use crate::error::{IngestionError, Result};

const SOURCE_SUFFIX: &str = ".hdf";
const OUTPUT_SUFFIX: &str = ".tif";

/// One unit of work: a source file plus its destination context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Granule {
    pub granule_id: String,

    /// Collection tag, e.g. "MOD13Q1"
    pub data_type: String,

    pub files: Vec<GranuleFile>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A file entry of a granule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GranuleFile {
    /// Name relative to the staging directory; may contain a '/' prefix
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_staging_dir: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Description of an uploaded artifact, merged into the primary file entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    /// `/<key>`
    pub path: String,
    pub name: String,
    pub size: u64,
    /// ISO-8601 UTC with millisecond precision
    pub created: String,
    pub bucket: String,
    /// `s3://<bucket>/<key>`
    pub filename: String,
}

impl OutputFile {
    pub fn new(bucket: &str, key: &str, name: &str, size: u64, created: String) -> Self {
        Self {
            path: format!("/{}", key.trim_start_matches('/')),
            name: name.to_string(),
            size,
            created,
            bucket: bucket.to_string(),
            filename: StoragePath::s3_uri(bucket, key),
        }
    }
}

impl Granule {
    /// The file entry that drives the conversion.
    pub fn primary_file(&self) -> Result<&GranuleFile> {
        self.files.first().ok_or_else(|| {
            IngestionError::InvalidGranule(format!("granule {} has no files", self.granule_id))
        })
    }

    /// Object key of the source container.
    pub fn source_key(&self) -> Result<String> {
        let file = self.primary_file()?;
        Ok(StoragePath::staged(self.staging_dir()?, &file.name))
    }

    /// Name of the converted artifact, relative to the staging directory.
    pub fn output_name(&self) -> Result<String> {
        let file = self.primary_file()?;
        if file.name.is_empty() {
            return Err(IngestionError::InvalidGranule(format!(
                "granule {} has a file without a name",
                self.granule_id
            )));
        }

        let stem = file
            .name
            .strip_suffix(SOURCE_SUFFIX)
            .unwrap_or(file.name.as_str());
        Ok(format!("{}{}", stem, OUTPUT_SUFFIX))
    }

    /// Object key of the converted artifact, next to the source.
    pub fn output_key(&self) -> Result<String> {
        Ok(StoragePath::staged(self.staging_dir()?, &self.output_name()?))
    }

    /// Return a copy with the primary file entry describing `output`.
    pub fn augment_primary(&self, output: OutputFile) -> Result<Self> {
        self.primary_file()?;

        let mut granule = self.clone();
        let file = &mut granule.files[0];
        file.path = Some(output.path);
        file.name = output.name;
        file.size = Some(output.size);
        file.created = Some(output.created);
        file.bucket = Some(output.bucket);
        file.filename = Some(output.filename);
        Ok(granule)
    }

    fn staging_dir(&self) -> Result<&str> {
        self.primary_file()?
            .file_staging_dir
            .as_deref()
            .ok_or_else(|| {
                IngestionError::InvalidGranule(format!(
                    "granule {} has no fileStagingDir",
                    self.granule_id
                ))
            })
    }
}
