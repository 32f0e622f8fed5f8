//! Parser for HDF-EOS `StructMetadata` text.
//!
//! HDF4-EOS grids keep their georeferencing in an ODL-style text attribute
//! rather than in per-variable attributes:
//!
//! ```text
//! GROUP=GridStructure
//!     GROUP=GRID_1
//!         GridName="MODIS_Grid_16DAY_250m_500m_VI"
//!         XDim=4800
//!         YDim=4800
//!         UpperLeftPointMtrs=(-6671703.118000,5559752.598333)
//!         LowerRightMtrs=(-5559752.598333,4447802.078667)
//!         Projection=GCTP_SNSOID
//!         ProjParams=(6371007.181000,0,0,0,0,0,0,0,0,0,0,0,0)
//!     END_GROUP=GRID_1
//! END_GROUP=GridStructure
//! ```

use crate::error::{RasterError, Result};
use crate::types::{Crs, GeoTransform};

/// GCTP projection of a grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GridProjection {
    /// Geographic lat/lon, corners in packed DMS.
    Geographic,
    /// Sinusoidal, corners in metres.
    Sinusoidal,
}

/// One grid definition from the `GridStructure` group.
#[derive(Debug, Clone, PartialEq)]
pub struct GridDefinition {
    pub name: String,
    pub xdim: usize,
    pub ydim: usize,
    pub upper_left: (f64, f64),
    pub lower_right: (f64, f64),
    pub projection: GridProjection,
    pub proj_params: Vec<f64>,
}

impl GridDefinition {
    /// Affine transform of the grid.
    pub fn geotransform(&self) -> Result<GeoTransform> {
        let (upper_left, lower_right) = match self.projection {
            GridProjection::Sinusoidal => (self.upper_left, self.lower_right),
            GridProjection::Geographic => (
                (dms_to_degrees(self.upper_left.0), dms_to_degrees(self.upper_left.1)),
                (dms_to_degrees(self.lower_right.0), dms_to_degrees(self.lower_right.1)),
            ),
        };
        GeoTransform::from_corners(upper_left, lower_right, self.xdim, self.ydim)
    }

    /// Coordinate reference system of the grid.
    pub fn crs(&self) -> Crs {
        match self.projection {
            GridProjection::Geographic => Crs::Geographic(4326),
            GridProjection::Sinusoidal => {
                let param = |i: usize| self.proj_params.get(i).copied().unwrap_or(0.0);
                let radius = match param(0) {
                    r if r > 0.0 => r,
                    _ => Crs::MODIS_SPHERE_RADIUS,
                };
                Crs::Sinusoidal {
                    sphere_radius: radius,
                    central_meridian: dms_to_degrees(param(4)),
                    false_easting: param(6),
                    false_northing: param(7),
                }
            }
        }
    }
}

/// Parse every grid definition in a `StructMetadata` document.
pub fn parse_grids(text: &str) -> Result<Vec<GridDefinition>> {
    let mut stack: Vec<&str> = Vec::new();
    let mut grids = Vec::new();
    let mut fields: Vec<(&str, &str)> = Vec::new();

    for line in text.lines() {
        let line = line.trim().trim_end_matches('\0');
        if line.is_empty() || line == "END" {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());

        match key {
            "GROUP" | "OBJECT" => {
                stack.push(value);
                if in_grid_definition(&stack) {
                    fields.clear();
                }
            }
            "END_GROUP" | "END_OBJECT" => {
                if in_grid_definition(&stack) {
                    grids.push(build_grid(&fields)?);
                }
                stack.pop();
            }
            _ if in_grid_definition(&stack) => fields.push((key, value)),
            _ => {}
        }
    }

    Ok(grids)
}

/// Find the grid named `name`.
pub fn find_grid(text: &str, name: &str) -> Result<GridDefinition> {
    parse_grids(text)?
        .into_iter()
        .find(|grid| grid.name == name)
        .ok_or_else(|| RasterError::invalid_metadata(format!("grid {} not found", name)))
}

fn in_grid_definition(stack: &[&str]) -> bool {
    stack.len() >= 2
        && stack[stack.len() - 2] == "GridStructure"
        && stack[stack.len() - 1].starts_with("GRID_")
}

fn build_grid(fields: &[(&str, &str)]) -> Result<GridDefinition> {
    let get = |name: &str| {
        fields
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| *v)
            .ok_or_else(|| RasterError::invalid_metadata(format!("grid is missing {}", name)))
    };

    let name = get("GridName")?.trim_matches('"').to_string();
    let xdim = parse_number::<usize>(get("XDim")?, "XDim")?;
    let ydim = parse_number::<usize>(get("YDim")?, "YDim")?;
    let upper_left = parse_pair(get("UpperLeftPointMtrs")?)?;
    let lower_right = parse_pair(get("LowerRightMtrs")?)?;

    let projection = match get("Projection")? {
        "GCTP_SNSOID" => GridProjection::Sinusoidal,
        "GCTP_GEO" => GridProjection::Geographic,
        other => {
            return Err(RasterError::invalid_metadata(format!(
                "grid {} uses unsupported projection {}",
                name, other
            )))
        }
    };

    let proj_params = match get("ProjParams") {
        Ok(value) => parse_list(value)?,
        Err(_) => Vec::new(),
    };

    Ok(GridDefinition {
        name,
        xdim,
        ydim,
        upper_left,
        lower_right,
        projection,
        proj_params,
    })
}

fn parse_number<T: std::str::FromStr>(value: &str, what: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| RasterError::invalid_metadata(format!("invalid {}: {}", what, value)))
}

fn parse_list(value: &str) -> Result<Vec<f64>> {
    value
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .split(',')
        .map(|v| parse_number::<f64>(v, "number"))
        .collect()
}

fn parse_pair(value: &str) -> Result<(f64, f64)> {
    match parse_list(value)?.as_slice() {
        [x, y] => Ok((*x, *y)),
        _ => Err(RasterError::invalid_metadata(format!(
            "expected a coordinate pair, got {}",
            value
        ))),
    }
}

/// Convert a GCTP packed DMS value (`DDDMMMSSS.SS`) to decimal degrees.
pub fn dms_to_degrees(packed: f64) -> f64 {
    let sign = if packed < 0.0 { -1.0 } else { 1.0 };
    let value = packed.abs();
    let degrees = (value / 1_000_000.0).floor();
    let minutes = ((value - degrees * 1_000_000.0) / 1_000.0).floor();
    let seconds = value - degrees * 1_000_000.0 - minutes * 1_000.0;
    sign * (degrees + minutes / 60.0 + seconds / 3600.0)
}
