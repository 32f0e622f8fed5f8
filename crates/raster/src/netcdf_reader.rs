//! Sub-band reader backed by libnetcdf.
//!
//! libnetcdf built with HDF4 support exposes the scientific datasets of an
//! HDF4-EOS file as flat variables named after the grid field, plus the
//! `StructMetadata.0` global attribute that carries the grid's corners and
//! projection. The sub-band group selects the grid definition.

use std::path::Path;

use netcdf::types::{FloatType, IntType, NcVariableType};
use netcdf::AttributeValue;
use num_traits::NumCast;
use tracing::debug;

use crate::error::{RasterError, Result};
use crate::reader::SubdatasetReader;
use crate::struct_metadata::find_grid;
use crate::subdataset::SubdatasetRef;
use crate::types::{BandMeta, DataType, PixelBuffer, SourceBand};

/// Global attribute holding the HDF-EOS structural metadata.
const STRUCT_METADATA: &str = "StructMetadata.0";

/// Reads HDF4-EOS grid fields through the netcdf crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct NetcdfReader;

impl NetcdfReader {
    pub fn new() -> Self {
        Self
    }
}

impl SubdatasetReader for NetcdfReader {
    fn open(&self, subdataset: &SubdatasetRef) -> Result<SourceBand> {
        let path = Path::new(subdataset.container_path());
        let file = netcdf::open(path).map_err(|e| {
            RasterError::ReadFailed(format!("failed to open {}: {}", path.display(), e))
        })?;

        let metadata = file
            .attributes()
            .find(|attr| attr.name() == STRUCT_METADATA)
            .ok_or_else(|| {
                RasterError::invalid_metadata(format!("{} has no {}", path.display(), STRUCT_METADATA))
            })?
            .value()
            .map_err(|e| RasterError::ReadFailed(e.to_string()))?;
        let metadata = match metadata {
            AttributeValue::Str(text) => text,
            AttributeValue::Strs(parts) => parts.concat(),
            other => {
                return Err(RasterError::invalid_metadata(format!(
                    "{} is not text: {:?}",
                    STRUCT_METADATA, other
                )))
            }
        };
        let grid = find_grid(&metadata, subdataset.group())?;

        let variable = file
            .variable(subdataset.variable())
            .ok_or_else(|| RasterError::SubdatasetNotFound(subdataset.to_string()))?;

        let dims: Vec<usize> = variable.dimensions().iter().map(|d| d.len()).collect();
        let (height, width) = match dims.as_slice() {
            [h, w] => (*h, *w),
            _ => {
                return Err(RasterError::invalid_metadata(format!(
                    "{} has {} dimensions, expected 2",
                    subdataset.variable(),
                    dims.len()
                )))
            }
        };
        if (width, height) != (grid.xdim, grid.ydim) {
            return Err(RasterError::invalid_metadata(format!(
                "{} is {}x{} but grid {} is {}x{}",
                subdataset.variable(),
                width,
                height,
                grid.name,
                grid.xdim,
                grid.ydim
            )));
        }

        let dtype = variable_dtype(&variable.vartype()).ok_or_else(|| {
            RasterError::invalid_metadata(format!(
                "{} is not an 8, 16 or 32-bit integer or float variable",
                subdataset.variable()
            ))
        })?;
        let nodata = attribute(&variable, "_FillValue").and_then(attribute_f64);
        let scale_factor = attribute(&variable, "scale_factor").and_then(attribute_f64);

        let values: Vec<f64> = variable
            .get_values(..)
            .map_err(|e| RasterError::ReadFailed(format!("failed to read {}: {}", subdataset, e)))?;
        let data = narrow(&values, dtype)?;

        debug!(
            subdataset = %subdataset,
            width = width,
            height = height,
            dtype = %dtype,
            nodata = ?nodata,
            "Read sub-band"
        );

        SourceBand::new(
            BandMeta {
                width,
                height,
                transform: grid.geotransform()?,
                crs: grid.crs(),
                nodata,
                dtype,
                scale_factor,
            },
            data,
        )
    }
}

/// Check if a variable has an attribute with the given name.
/// This avoids HDF error spam when probing optional attributes.
fn attribute(var: &netcdf::Variable, name: &str) -> Option<AttributeValue> {
    if !var.attributes().any(|attr| attr.name() == name) {
        return None;
    }
    var.attribute_value(name)?.ok()
}

/// Pixel type for a numeric variable; `None` for strings, compounds and
/// 64-bit integers.
fn variable_dtype(vartype: &NcVariableType) -> Option<DataType> {
    match vartype {
        NcVariableType::Int(IntType::U8) => Some(DataType::UInt8),
        NcVariableType::Int(IntType::I8) => Some(DataType::Int8),
        NcVariableType::Int(IntType::U16) => Some(DataType::UInt16),
        NcVariableType::Int(IntType::I16) => Some(DataType::Int16),
        NcVariableType::Int(IntType::U32) => Some(DataType::UInt32),
        NcVariableType::Int(IntType::I32) => Some(DataType::Int32),
        NcVariableType::Float(FloatType::F32) => Some(DataType::Float32),
        NcVariableType::Float(FloatType::F64) => Some(DataType::Float64),
        _ => None,
    }
}

fn attribute_f64(value: AttributeValue) -> Option<f64> {
    f64::try_from(value).ok()
}

/// Convert values read as f64 back to the variable's storage type.
fn narrow(values: &[f64], dtype: DataType) -> Result<PixelBuffer> {
    fn cast<T: NumCast>(values: &[f64]) -> Result<Vec<T>> {
        values
            .iter()
            .map(|v| {
                <T as NumCast>::from(*v).ok_or_else(|| {
                    RasterError::ReadFailed(format!("value {} does not fit the variable type", v))
                })
            })
            .collect()
    }

    Ok(match dtype {
        DataType::UInt8 => PixelBuffer::UInt8(cast(values)?),
        DataType::Int8 => PixelBuffer::Int8(cast(values)?),
        DataType::UInt16 => PixelBuffer::UInt16(cast(values)?),
        DataType::Int16 => PixelBuffer::Int16(cast(values)?),
        DataType::UInt32 => PixelBuffer::UInt32(cast(values)?),
        DataType::Int32 => PixelBuffer::Int32(cast(values)?),
        DataType::Float32 => PixelBuffer::Float32(cast(values)?),
        DataType::Float64 => PixelBuffer::Float64(values.to_vec()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::require_test_file;

    #[test]
    fn test_narrow_int16() {
        let data = narrow(&[-3000.0, 0.0, 10000.0], DataType::Int16).unwrap();
        assert_eq!(data, PixelBuffer::Int16(vec![-3000, 0, 10000]));
        assert!(narrow(&[70000.0], DataType::Int16).is_err());
    }

    #[test]
    fn test_variable_dtype() {
        assert_eq!(
            variable_dtype(&NcVariableType::Int(IntType::I16)),
            Some(DataType::Int16)
        );
        assert_eq!(
            variable_dtype(&NcVariableType::Float(FloatType::F64)),
            Some(DataType::Float64)
        );
        assert_eq!(variable_dtype(&NcVariableType::Int(IntType::I64)), None);
        assert_eq!(variable_dtype(&NcVariableType::String), None);
    }

    #[test]
    fn test_attribute_f64() {
        assert_eq!(attribute_f64(AttributeValue::Short(-3000)), Some(-3000.0));
        assert_eq!(attribute_f64(AttributeValue::Uchar(255)), Some(255.0));
        assert_eq!(attribute_f64(AttributeValue::Str("fill".to_string())), None);
    }

    #[test]
    fn test_reads_modis_granule() {
        let path = require_test_file!(test_utils::fixtures::modis::MOD13Q1_NAME);
        let address = format!(
            "HDF4_EOS:EOS_GRID:{}:{}:250m 16 days NDVI",
            path.display(),
            test_utils::fixtures::modis::GRID_250M
        );
        let band = NetcdfReader::new()
            .open(&SubdatasetRef::parse(&address).unwrap())
            .unwrap();
        assert_eq!(band.meta.width, 4800);
        assert_eq!(band.meta.dtype, DataType::Int16);
        assert_eq!(band.meta.nodata, Some(-3000.0));
    }
}
