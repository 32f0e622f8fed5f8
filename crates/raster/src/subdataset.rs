//! Addresses of embedded raster variables inside a container.
//!
//! The address format is
//! `<driver>:<access-mode>:<container-path>:<group>:<variable>`, e.g.
//! `HDF4_EOS:EOS_GRID:/tmp/x/MOD13Q1.hdf:MODIS_Grid_16DAY_250m_500m_VI:250m 16 days NDVI`.
//! The container path may contain `:`; the other components may not.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::collection::CollectionProfile;
use crate::error::{RasterError, Result};

/// Driver tag for HDF4 EOS containers.
pub const HDF4_EOS_DRIVER: &str = "HDF4_EOS";

/// Access mode for HDF-EOS grid variables.
pub const EOS_GRID_MODE: &str = "EOS_GRID";

/// Address of one variable inside a container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubdatasetRef {
    driver: String,
    access_mode: String,
    container_path: String,
    group: String,
    variable: String,
}

impl SubdatasetRef {
    /// Build an address, rejecting components that would not round-trip.
    pub fn new(
        driver: impl Into<String>,
        access_mode: impl Into<String>,
        container_path: impl Into<String>,
        group: impl Into<String>,
        variable: impl Into<String>,
    ) -> Result<Self> {
        let subdataset = Self {
            driver: driver.into(),
            access_mode: access_mode.into(),
            container_path: container_path.into(),
            group: group.into(),
            variable: variable.into(),
        };

        for (name, value) in [
            ("driver", &subdataset.driver),
            ("access mode", &subdataset.access_mode),
            ("group", &subdataset.group),
            ("variable", &subdataset.variable),
        ] {
            if value.is_empty() || value.contains(':') {
                return Err(RasterError::InvalidAddress(format!(
                    "{} '{}' must be non-empty and must not contain ':'",
                    name, value
                )));
            }
        }
        if subdataset.container_path.is_empty() {
            return Err(RasterError::InvalidAddress(
                "container path must not be empty".to_string(),
            ));
        }

        Ok(subdataset)
    }

    /// Parse an address string.
    ///
    /// Two fields are taken from the left and two from the right; whatever
    /// remains is the container path.
    pub fn parse(address: &str) -> Result<Self> {
        let invalid = || RasterError::InvalidAddress(address.to_string());

        let mut left = address.splitn(3, ':');
        let driver = left.next().ok_or_else(invalid)?;
        let access_mode = left.next().ok_or_else(invalid)?;
        let rest = left.next().ok_or_else(invalid)?;

        let mut right = rest.rsplitn(3, ':');
        let variable = right.next().ok_or_else(invalid)?;
        let group = right.next().ok_or_else(invalid)?;
        let container_path = right.next().ok_or_else(invalid)?;

        Self::new(driver, access_mode, container_path, group, variable)
    }

    pub fn driver(&self) -> &str {
        &self.driver
    }

    pub fn access_mode(&self) -> &str {
        &self.access_mode
    }

    pub fn container_path(&self) -> &str {
        &self.container_path
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }
}

impl fmt::Display for SubdatasetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}",
            self.driver, self.access_mode, self.container_path, self.group, self.variable
        )
    }
}

impl FromStr for SubdatasetRef {
    type Err = RasterError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Address `variable` inside the container at `container_path`.
///
/// Fails with [`RasterError::SubdatasetNotFound`] when the variable is not
/// part of the collection's recipe.
pub fn resolve(
    container_path: &Path,
    profile: &CollectionProfile,
    variable: &str,
) -> Result<SubdatasetRef> {
    if !profile.variables().iter().any(|v| v == variable) {
        return Err(RasterError::SubdatasetNotFound(format!(
            "{} is not a {} variable",
            variable,
            profile.tag()
        )));
    }

    SubdatasetRef::new(
        profile.driver(),
        profile.access_mode(),
        container_path.to_string_lossy(),
        profile.group(),
        variable,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::{collection_profile_for, CollectionTag};

    const NDVI: &str =
        "HDF4_EOS:EOS_GRID:/tmp/x/MOD13Q1.hdf:MODIS_Grid_16DAY_250m_500m_VI:250m 16 days NDVI";

    #[test]
    fn test_parse_components() {
        let subdataset = SubdatasetRef::parse(NDVI).unwrap();
        assert_eq!(subdataset.driver(), "HDF4_EOS");
        assert_eq!(subdataset.access_mode(), "EOS_GRID");
        assert_eq!(subdataset.container_path(), "/tmp/x/MOD13Q1.hdf");
        assert_eq!(subdataset.group(), "MODIS_Grid_16DAY_250m_500m_VI");
        assert_eq!(subdataset.variable(), "250m 16 days NDVI");
    }

    #[test]
    fn test_display_roundtrip() {
        let subdataset = SubdatasetRef::parse(NDVI).unwrap();
        assert_eq!(subdataset.to_string(), NDVI);
        assert_eq!(subdataset.to_string().parse::<SubdatasetRef>().unwrap(), subdataset);
    }

    #[test]
    fn test_path_with_colons_roundtrips() {
        let subdataset = SubdatasetRef::new(
            HDF4_EOS_DRIVER,
            EOS_GRID_MODE,
            "C:\\data\\granule:v2.hdf",
            "Grid",
            "band",
        )
        .unwrap();
        let parsed = SubdatasetRef::parse(&subdataset.to_string()).unwrap();
        assert_eq!(parsed, subdataset);
        assert_eq!(parsed.container_path(), "C:\\data\\granule:v2.hdf");
    }

    #[test]
    fn test_rejects_colon_in_variable() {
        let result = SubdatasetRef::new(HDF4_EOS_DRIVER, EOS_GRID_MODE, "/x.hdf", "g", "a:b");
        assert!(matches!(result, Err(RasterError::InvalidAddress(_))));
    }

    #[test]
    fn test_parse_too_few_fields() {
        assert!(SubdatasetRef::parse("HDF4_EOS:EOS_GRID:/x.hdf:band").is_err());
        assert!(SubdatasetRef::parse("HDF4_EOS").is_err());
        assert!(SubdatasetRef::parse("").is_err());
    }

    #[test]
    fn test_resolve() {
        let profile = collection_profile_for("MOD13Q1").unwrap();
        let subdataset =
            resolve(Path::new("/tmp/x/MOD13Q1.hdf"), &profile, "250m 16 days NDVI").unwrap();
        assert_eq!(subdataset.to_string(), NDVI);

        let missing = resolve(Path::new("/tmp/x.hdf"), &profile, "250m 16 days red reflectance");
        assert!(matches!(missing, Err(RasterError::SubdatasetNotFound(_))));
        assert_eq!(profile.tag(), CollectionTag::Mod13Q1);
    }
}
