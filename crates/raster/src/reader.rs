//! Access to sub-bands inside a container.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{RasterError, Result};
use crate::subdataset::SubdatasetRef;
use crate::types::SourceBand;

/// Reads one addressed sub-band from a container.
///
/// Implementations return [`RasterError::SubdatasetNotFound`] when the
/// address does not name a variable in the container.
pub trait SubdatasetReader: Send + Sync {
    fn open(&self, subdataset: &SubdatasetRef) -> Result<SourceBand>;
}

/// Reader over bands held in memory, keyed by group and variable.
///
/// The container path is ignored unless [`require_container`](Self::require_container)
/// is set, in which case the container file must exist on disk.
#[derive(Debug, Default, Clone)]
pub struct MemoryReader {
    bands: HashMap<(String, String), SourceBand>,
    require_container: bool,
}

impl MemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a band under `group`/`variable`.
    pub fn with_band(
        mut self,
        group: impl Into<String>,
        variable: impl Into<String>,
        band: SourceBand,
    ) -> Self {
        self.bands.insert((group.into(), variable.into()), band);
        self
    }

    /// Fail reads whose container file does not exist.
    pub fn require_container(mut self, require: bool) -> Self {
        self.require_container = require;
        self
    }
}

impl SubdatasetReader for MemoryReader {
    fn open(&self, subdataset: &SubdatasetRef) -> Result<SourceBand> {
        if self.require_container && !Path::new(subdataset.container_path()).is_file() {
            return Err(RasterError::ReadFailed(format!(
                "container {} does not exist",
                subdataset.container_path()
            )));
        }

        self.bands
            .get(&(
                subdataset.group().to_string(),
                subdataset.variable().to_string(),
            ))
            .cloned()
            .ok_or_else(|| RasterError::SubdatasetNotFound(subdataset.to_string()))
    }
}
