//! Per-collection extraction recipes.

use std::fmt;
use std::str::FromStr;

use crate::error::{RasterError, Result};
use crate::subdataset::{EOS_GRID_MODE, HDF4_EOS_DRIVER};
use crate::types::DataType;

/// Fill value of the MODIS vegetation index products.
pub const MODIS_VI_FILL: f64 = -3000.0;

/// Scale factor of the MODIS vegetation index products.
pub const MODIS_VI_SCALE: f64 = 10000.0;

/// Data-type tags the converter knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionTag {
    /// Terra 16-day 250 m vegetation indices
    Mod13Q1,
    /// Aqua 16-day 250 m vegetation indices
    Myd13Q1,
    /// Terra 16-day 500 m vegetation indices
    Mod13A1,
    /// Aqua 16-day 500 m vegetation indices
    Myd13A1,
    /// Terra 16-day 1 km vegetation indices (no recipe)
    Mod13A2,
    /// Aqua 16-day 1 km vegetation indices (no recipe)
    Myd13A2,
}

impl CollectionTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mod13Q1 => "MOD13Q1",
            Self::Myd13Q1 => "MYD13Q1",
            Self::Mod13A1 => "MOD13A1",
            Self::Myd13A1 => "MYD13A1",
            Self::Mod13A2 => "MOD13A2",
            Self::Myd13A2 => "MYD13A2",
        }
    }

    /// Whether a recipe exists for this tag.
    pub fn is_implemented(&self) -> bool {
        !matches!(self, Self::Mod13A2 | Self::Myd13A2)
    }
}

impl fmt::Display for CollectionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CollectionTag {
    type Err = RasterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "MOD13Q1" => Ok(Self::Mod13Q1),
            "MYD13Q1" => Ok(Self::Myd13Q1),
            "MOD13A1" => Ok(Self::Mod13A1),
            "MYD13A1" => Ok(Self::Myd13A1),
            "MOD13A2" => Ok(Self::Mod13A2),
            "MYD13A2" => Ok(Self::Myd13A2),
            _ => Err(RasterError::UnsupportedCollection(s.to_string())),
        }
    }
}

/// Extraction recipe for one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionProfile {
    tag: CollectionTag,
    group: String,
    variables: Vec<String>,
    template: String,
    driver: String,
    access_mode: String,
    scale_factor: Option<f64>,
    output_dtype: Option<DataType>,
}

impl CollectionProfile {
    /// Create a recipe reading `variables` (in output band order) from
    /// `group`, with `template` supplying the output geometry.
    pub fn new(
        tag: CollectionTag,
        group: impl Into<String>,
        variables: Vec<String>,
        template: impl Into<String>,
    ) -> Result<Self> {
        let template = template.into();
        if variables.is_empty() {
            return Err(RasterError::invalid_profile(format!(
                "{} recipe has no variables",
                tag
            )));
        }
        if !variables.contains(&template) {
            return Err(RasterError::invalid_profile(format!(
                "{} template '{}' is not one of the recipe variables",
                tag, template
            )));
        }

        Ok(Self {
            tag,
            group: group.into(),
            variables,
            template,
            driver: HDF4_EOS_DRIVER.to_string(),
            access_mode: EOS_GRID_MODE.to_string(),
            scale_factor: None,
            output_dtype: None,
        })
    }

    /// Divide valid pixels by `scale` when composing.
    pub fn with_scale_factor(mut self, scale: f64) -> Result<Self> {
        if !scale.is_finite() || scale == 0.0 {
            return Err(RasterError::invalid_profile(format!(
                "scale factor {} must be finite and non-zero",
                scale
            )));
        }
        self.scale_factor = Some(scale);
        Ok(self)
    }

    /// Write the output as `dtype` instead of the template's type.
    pub fn with_output_dtype(mut self, dtype: DataType) -> Self {
        self.output_dtype = Some(dtype);
        self
    }

    pub fn tag(&self) -> CollectionTag {
        self.tag
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// Variables in output band order.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn driver(&self) -> &str {
        &self.driver
    }

    pub fn access_mode(&self) -> &str {
        &self.access_mode
    }

    pub fn scale_factor(&self) -> Option<f64> {
        self.scale_factor
    }

    pub fn output_dtype(&self) -> Option<DataType> {
        self.output_dtype
    }
}

/// Look up the recipe for a granule data-type tag.
///
/// Unknown tags and known tags without a recipe both fail with
/// [`RasterError::UnsupportedCollection`]; there is no default.
pub fn collection_profile_for(data_type: &str) -> Result<CollectionProfile> {
    let tag: CollectionTag = data_type.parse()?;

    let (group, resolution) = match tag {
        CollectionTag::Mod13Q1 | CollectionTag::Myd13Q1 => ("MODIS_Grid_16DAY_250m_500m_VI", "250m"),
        CollectionTag::Mod13A1 | CollectionTag::Myd13A1 => ("MODIS_Grid_16DAY_500m_VI", "500m"),
        CollectionTag::Mod13A2 | CollectionTag::Myd13A2 => {
            return Err(RasterError::UnsupportedCollection(format!(
                "{} has no extraction recipe",
                tag
            )))
        }
    };

    let ndvi = format!("{} 16 days NDVI", resolution);
    let evi = format!("{} 16 days EVI", resolution);

    Ok(CollectionProfile::new(tag, group, vec![ndvi.clone(), evi], ndvi)?
        .with_scale_factor(MODIS_VI_SCALE)?
        .with_output_dtype(DataType::Float32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_250m_recipe() {
        for tag in ["MOD13Q1", "MYD13Q1", "mod13q1"] {
            let profile = collection_profile_for(tag).unwrap();
            assert_eq!(profile.group(), "MODIS_Grid_16DAY_250m_500m_VI");
            assert_eq!(
                profile.variables(),
                &["250m 16 days NDVI".to_string(), "250m 16 days EVI".to_string()]
            );
            assert_eq!(profile.template(), "250m 16 days NDVI");
            assert_eq!(profile.scale_factor(), Some(MODIS_VI_SCALE));
            assert_eq!(profile.output_dtype(), Some(DataType::Float32));
            assert_eq!(profile.driver(), "HDF4_EOS");
            assert_eq!(profile.access_mode(), "EOS_GRID");
        }
    }

    #[test]
    fn test_500m_recipe() {
        let profile = collection_profile_for("MYD13A1").unwrap();
        assert_eq!(profile.tag(), CollectionTag::Myd13A1);
        assert_eq!(profile.group(), "MODIS_Grid_16DAY_500m_VI");
        assert_eq!(profile.template(), "500m 16 days NDVI");
    }

    #[test]
    fn test_recognised_but_unimplemented() {
        let tag: CollectionTag = "MOD13A2".parse().unwrap();
        assert!(!tag.is_implemented());
        assert!(matches!(
            collection_profile_for("MOD13A2"),
            Err(RasterError::UnsupportedCollection(_))
        ));
    }

    #[test]
    fn test_unknown_tag() {
        assert!(matches!(
            collection_profile_for("MOD09GA"),
            Err(RasterError::UnsupportedCollection(_))
        ));
        assert!(matches!(
            collection_profile_for(""),
            Err(RasterError::UnsupportedCollection(_))
        ));
    }

    #[test]
    fn test_profile_validation() {
        let empty = CollectionProfile::new(CollectionTag::Mod13Q1, "g", vec![], "a");
        assert!(empty.is_err());

        let missing_template =
            CollectionProfile::new(CollectionTag::Mod13Q1, "g", vec!["a".to_string()], "b");
        assert!(missing_template.is_err());

        let zero_scale = CollectionProfile::new(CollectionTag::Mod13Q1, "g", vec!["a".to_string()], "a")
            .unwrap()
            .with_scale_factor(0.0);
        assert!(zero_scale.is_err());
    }
}
