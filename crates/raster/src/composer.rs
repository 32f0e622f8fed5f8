//! Merge independently addressed sub-bands into one multi-band raster.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::collection::CollectionProfile;
use crate::config::CogConfig;
use crate::error::{RasterError, Result};
use crate::reader::SubdatasetReader;
use crate::subdataset::resolve;
use crate::types::{ComposedRaster, OutputProfile, PixelBuffer, ProfileBuilder, RecastRule, SourceBand};

/// Composes the bands of one collection recipe.
///
/// The template band is opened first and alone defines the output
/// geometry, CRS and nodata. Every band, in recipe order, is then checked
/// against that profile and recast into the output type where needed.
pub struct BandComposer<'a> {
    reader: &'a dyn SubdatasetReader,
    config: &'a CogConfig,
}

impl<'a> BandComposer<'a> {
    pub fn new(reader: &'a dyn SubdatasetReader, config: &'a CogConfig) -> Self {
        Self { reader, config }
    }

    /// Compose the recipe's variables from the container at `container_path`.
    pub fn compose(
        &self,
        container_path: &Path,
        profile: &CollectionProfile,
    ) -> Result<ComposedRaster> {
        let template_ref = resolve(container_path, profile, profile.template())?;
        let template = self.reader.open(&template_ref).map_err(|e| match e {
            RasterError::SubdatasetNotFound(_) => {
                RasterError::TemplateNotFound(template_ref.to_string())
            }
            other => other,
        })?;

        if let Some(source_scale) = template.meta.scale_factor {
            info!(
                collection = %profile.tag(),
                source_scale_factor = source_scale,
                recipe_scale_factor = ?profile.scale_factor(),
                "Template carries a scale factor"
            );
        }

        let mut builder = ProfileBuilder::from_template(&template.meta, self.config)
            .band_names(profile.variables().to_vec());
        if let Some(dtype) = profile.output_dtype() {
            builder = builder.dtype(dtype);
        }
        let output = builder.freeze()?;

        debug!(
            collection = %profile.tag(),
            width = output.width,
            height = output.height,
            dtype = %output.dtype,
            nodata = ?output.nodata,
            crs = %output.crs,
            "Froze output profile"
        );

        let mut bands = Vec::with_capacity(output.band_count);
        for variable in profile.variables() {
            let band = if variable == profile.template() {
                template.clone()
            } else {
                let subdataset = resolve(container_path, profile, variable)?;
                self.reader.open(&subdataset)?
            };

            check_geometry(variable, &band, &output)?;
            bands.push(recast_band(variable, band, &output, profile.scale_factor())?);
        }

        info!(
            collection = %profile.tag(),
            bands = bands.len(),
            width = output.width,
            height = output.height,
            "Composed bands"
        );

        Ok(ComposedRaster {
            profile: output,
            bands,
        })
    }
}

fn check_geometry(variable: &str, band: &SourceBand, output: &OutputProfile) -> Result<()> {
    let mismatch = |detail: String| {
        Err(RasterError::GeometryMismatch {
            band: variable.to_string(),
            detail,
        })
    };

    if (band.meta.width, band.meta.height) != (output.width, output.height) {
        return mismatch(format!(
            "{}x{} instead of {}x{}",
            band.meta.width, band.meta.height, output.width, output.height
        ));
    }
    if band.meta.transform != output.transform {
        return mismatch(format!(
            "transform {:?} instead of {:?}",
            band.meta.transform.0, output.transform.0
        ));
    }
    if band.meta.crs != output.crs {
        return mismatch(format!("CRS {} instead of {}", band.meta.crs, output.crs));
    }
    Ok(())
}

fn same_nodata(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => x == y || (x.is_nan() && y.is_nan()),
        (None, None) => true,
        _ => false,
    }
}

fn recast_band(
    variable: &str,
    band: SourceBand,
    output: &OutputProfile,
    scale_factor: Option<f64>,
) -> Result<PixelBuffer> {
    if band.meta.dtype == output.dtype
        && same_nodata(band.meta.nodata, output.nodata)
        && scale_factor.is_none()
    {
        return Ok(band.data);
    }

    let rule = RecastRule {
        source_nodata: band.meta.nodata,
        target_nodata: output.nodata,
        scale_factor,
    };
    let recast = band.data.recast(output.dtype, &rule)?;

    if recast.out_of_range > 0 {
        warn!(
            band = %variable,
            count = recast.out_of_range,
            dtype = %output.dtype,
            "Values not representable in output type were set to nodata"
        );
    }
    debug!(
        band = %variable,
        from = %band.meta.dtype,
        to = %output.dtype,
        source_nodata = ?band.meta.nodata,
        "Recast band"
    );

    Ok(recast.buffer)
}
