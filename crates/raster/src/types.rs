//! Core raster types: sample types, pixel buffers, georeferencing and the
//! write-time output profile.

use num_traits::{NumCast, ToPrimitive};
use serde::{Deserialize, Serialize};

use crate::config::{CogConfig, Compression};
use crate::error::{RasterError, Result};

/// Sample data type of a band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    UInt8,
    Int8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float32,
    Float64,
}

impl DataType {
    /// Size of one sample in bytes.
    pub fn size_bytes(&self) -> usize {
        match self {
            Self::UInt8 | Self::Int8 => 1,
            Self::UInt16 | Self::Int16 => 2,
            Self::UInt32 | Self::Int32 | Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }

    /// Bits per sample.
    pub fn bits(&self) -> u16 {
        (self.size_bytes() * 8) as u16
    }

    /// TIFF SampleFormat value (1 = unsigned, 2 = signed, 3 = IEEE float).
    pub fn sample_format(&self) -> u16 {
        match self {
            Self::UInt8 | Self::UInt16 | Self::UInt32 => 1,
            Self::Int8 | Self::Int16 | Self::Int32 => 2,
            Self::Float32 | Self::Float64 => 3,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UInt8 => "uint8",
            Self::Int8 => "int8",
            Self::UInt16 => "uint16",
            Self::Int16 => "int16",
            Self::UInt32 => "uint32",
            Self::Int32 => "int32",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DataType {
    type Err = RasterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "uint8" | "u8" => Ok(Self::UInt8),
            "int8" | "i8" => Ok(Self::Int8),
            "uint16" | "u16" => Ok(Self::UInt16),
            "int16" | "i16" => Ok(Self::Int16),
            "uint32" | "u32" => Ok(Self::UInt32),
            "int32" | "i32" => Ok(Self::Int32),
            "float32" | "f32" => Ok(Self::Float32),
            "float64" | "f64" => Ok(Self::Float64),
            other => Err(RasterError::invalid_profile(format!(
                "unknown data type '{}'",
                other
            ))),
        }
    }
}

/// Pixel values of one band, row-major.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelBuffer {
    UInt8(Vec<u8>),
    Int8(Vec<i8>),
    UInt16(Vec<u16>),
    Int16(Vec<i16>),
    UInt32(Vec<u32>),
    Int32(Vec<i32>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

/// Apply `$body` to the inner vector of every variant.
macro_rules! with_values {
    ($buffer:expr, $values:ident => $body:expr) => {
        match $buffer {
            PixelBuffer::UInt8($values) => $body,
            PixelBuffer::Int8($values) => $body,
            PixelBuffer::UInt16($values) => $body,
            PixelBuffer::Int16($values) => $body,
            PixelBuffer::UInt32($values) => $body,
            PixelBuffer::Int32($values) => $body,
            PixelBuffer::Float32($values) => $body,
            PixelBuffer::Float64($values) => $body,
        }
    };
}

/// Same as [`with_values!`] but rebuilds a buffer of the same variant.
macro_rules! map_values {
    ($buffer:expr, $values:ident => $body:expr) => {
        match $buffer {
            PixelBuffer::UInt8($values) => PixelBuffer::UInt8($body),
            PixelBuffer::Int8($values) => PixelBuffer::Int8($body),
            PixelBuffer::UInt16($values) => PixelBuffer::UInt16($body),
            PixelBuffer::Int16($values) => PixelBuffer::Int16($body),
            PixelBuffer::UInt32($values) => PixelBuffer::UInt32($body),
            PixelBuffer::Int32($values) => PixelBuffer::Int32($body),
            PixelBuffer::Float32($values) => PixelBuffer::Float32($body),
            PixelBuffer::Float64($values) => PixelBuffer::Float64($body),
        }
    };
}

pub(crate) use map_values;

/// How source pixels are rewritten into the output type.
#[derive(Debug, Clone, Copy)]
pub struct RecastRule {
    /// Nodata sentinel of the source band.
    pub source_nodata: Option<f64>,
    /// Nodata sentinel of the output profile.
    pub target_nodata: Option<f64>,
    /// Divisor applied to valid pixels.
    pub scale_factor: Option<f64>,
}

/// Output of a recast: the new buffer and how many values could not be
/// represented in the target type.
#[derive(Debug, Clone, PartialEq)]
pub struct Recast {
    pub buffer: PixelBuffer,
    pub out_of_range: usize,
}

impl PixelBuffer {
    /// Sample type of the buffer.
    pub fn data_type(&self) -> DataType {
        match self {
            Self::UInt8(_) => DataType::UInt8,
            Self::Int8(_) => DataType::Int8,
            Self::UInt16(_) => DataType::UInt16,
            Self::Int16(_) => DataType::Int16,
            Self::UInt32(_) => DataType::UInt32,
            Self::Int32(_) => DataType::Int32,
            Self::Float32(_) => DataType::Float32,
            Self::Float64(_) => DataType::Float64,
        }
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        with_values!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `index` widened to f64.
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        with_values!(self, v => v.get(index).and_then(|x| x.to_f64()))
    }

    /// Native-endian bytes of the buffer.
    pub fn as_bytes(&self) -> &[u8] {
        with_values!(self, v => bytemuck::cast_slice(v.as_slice()))
    }

    /// Rewrite every pixel into `target`.
    ///
    /// Pixels equal to the source nodata become the target nodata. Other
    /// pixels are divided by the scale factor (if any) and cast; values the
    /// target type cannot represent become nodata and are counted. For
    /// integer targets that includes any value with a fractional part.
    pub fn recast(&self, target: DataType, rule: &RecastRule) -> Result<Recast> {
        let mut out_of_range = 0usize;
        let integral = !target.is_float();
        let buffer = match target {
            DataType::UInt8 => Self::UInt8(self.cast_values(rule, integral, &mut out_of_range)?),
            DataType::Int8 => Self::Int8(self.cast_values(rule, integral, &mut out_of_range)?),
            DataType::UInt16 => Self::UInt16(self.cast_values(rule, integral, &mut out_of_range)?),
            DataType::Int16 => Self::Int16(self.cast_values(rule, integral, &mut out_of_range)?),
            DataType::UInt32 => Self::UInt32(self.cast_values(rule, integral, &mut out_of_range)?),
            DataType::Int32 => Self::Int32(self.cast_values(rule, integral, &mut out_of_range)?),
            DataType::Float32 => Self::Float32(self.cast_values(rule, integral, &mut out_of_range)?),
            DataType::Float64 => Self::Float64(self.cast_values(rule, integral, &mut out_of_range)?),
        };
        Ok(Recast {
            buffer,
            out_of_range,
        })
    }

    fn cast_values<T: NumCast + Copy>(
        &self,
        rule: &RecastRule,
        integral: bool,
        out_of_range: &mut usize,
    ) -> Result<Vec<T>> {
        let target_nodata: Option<T> = match rule.target_nodata {
            Some(nodata) => Some(<T as NumCast>::from(nodata).ok_or_else(|| {
                RasterError::invalid_profile(format!(
                    "nodata {} is not representable in the output type",
                    nodata
                ))
            })?),
            None => None,
        };

        let mut output = Vec::with_capacity(self.len());
        for index in 0..self.len() {
            let value = self.get_f64(index).unwrap_or(f64::NAN);

            let nodata = is_nodata(value, rule.source_nodata);
            if nodata {
                if let Some(sentinel) = target_nodata {
                    output.push(sentinel);
                    continue;
                }
                // Without an output sentinel the source sentinel is carried as a value
            }

            let scaled = match rule.scale_factor {
                Some(scale) if !nodata => value / scale,
                _ => value,
            };

            let exact = !(integral && scaled.fract() != 0.0);
            match <T as NumCast>::from(scaled).filter(|_| exact) {
                Some(cast) => output.push(cast),
                None => {
                    *out_of_range += 1;
                    output.push(target_nodata.ok_or_else(|| {
                        RasterError::invalid_profile(format!(
                            "value {} is not representable and the output has no nodata",
                            scaled
                        ))
                    })?);
                }
            }
        }
        Ok(output)
    }
}

fn is_nodata(value: f64, nodata: Option<f64>) -> bool {
    match nodata {
        Some(n) if n.is_nan() => value.is_nan(),
        Some(n) => value == n,
        None => false,
    }
}

/// Affine geotransform in GDAL order:
/// `[origin_x, pixel_width, row_rotation, origin_y, column_rotation, pixel_height]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform(pub [f64; 6]);

impl GeoTransform {
    /// North-up transform from an upper-left corner and pixel size.
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self([origin_x, pixel_width, 0.0, origin_y, 0.0, -pixel_height.abs()])
    }

    /// Transform covering `width` x `height` pixels between two corners.
    pub fn from_corners(
        upper_left: (f64, f64),
        lower_right: (f64, f64),
        width: usize,
        height: usize,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(RasterError::invalid_metadata("grid has zero dimensions"));
        }
        let pixel_width = (lower_right.0 - upper_left.0) / width as f64;
        let pixel_height = (upper_left.1 - lower_right.1) / height as f64;
        if pixel_width <= 0.0 || pixel_height <= 0.0 {
            return Err(RasterError::invalid_metadata(format!(
                "corners {:?} / {:?} do not describe a north-up grid",
                upper_left, lower_right
            )));
        }
        Ok(Self::north_up(upper_left.0, upper_left.1, pixel_width, pixel_height))
    }

    pub fn origin(&self) -> (f64, f64) {
        (self.0[0], self.0[3])
    }

    pub fn pixel_size(&self) -> (f64, f64) {
        (self.0[1], self.0[5])
    }

    /// True when the transform has rotation or shear terms.
    pub fn is_rotated(&self) -> bool {
        self.0[2] != 0.0 || self.0[4] != 0.0
    }

    /// Transform of a grid downsampled by `factor`.
    pub fn scaled(&self, factor: usize) -> Self {
        let f = factor as f64;
        let t = self.0;
        Self([t[0], t[1] * f, t[2] * f, t[3], t[4] * f, t[5] * f])
    }
}

/// Coordinate reference system of a raster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Crs {
    /// Geographic CRS identified by EPSG code (e.g. 4326).
    Geographic(u16),
    /// Projected CRS identified by EPSG code.
    Projected(u16),
    /// Sinusoidal projection on a sphere (MODIS land grids).
    Sinusoidal {
        sphere_radius: f64,
        central_meridian: f64,
        false_easting: f64,
        false_northing: f64,
    },
}

impl Crs {
    /// Sphere radius of the MODIS sinusoidal grid in meters.
    pub const MODIS_SPHERE_RADIUS: f64 = 6_371_007.181;

    /// The MODIS land sinusoidal grid.
    pub fn modis_sinusoidal() -> Self {
        Self::Sinusoidal {
            sphere_radius: Self::MODIS_SPHERE_RADIUS,
            central_meridian: 0.0,
            false_easting: 0.0,
            false_northing: 0.0,
        }
    }

    /// PROJ definition string.
    pub fn to_proj4(&self) -> String {
        match self {
            Self::Geographic(code) | Self::Projected(code) => format!("+init=epsg:{}", code),
            Self::Sinusoidal {
                sphere_radius,
                central_meridian,
                false_easting,
                false_northing,
            } => format!(
                "+proj=sinu +lon_0={} +x_0={} +y_0={} +R={} +units=m +no_defs",
                central_meridian, false_easting, false_northing, sphere_radius
            ),
        }
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Geographic(code) | Self::Projected(code) => write!(f, "EPSG:{}", code),
            Self::Sinusoidal { .. } => write!(f, "{}", self.to_proj4()),
        }
    }
}

/// Write-time raster profile shared by every band of an output.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputProfile {
    pub band_count: usize,
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    pub crs: Crs,
    pub nodata: Option<f64>,
    pub dtype: DataType,
    pub tile_size: u32,
    pub compression: Compression,
    pub band_names: Vec<String>,
}

impl OutputProfile {
    /// Number of pixels in one band.
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }
}

/// Builds an [`OutputProfile`] from a template band.
///
/// Geometry, CRS and nodata come only from the template; the data type may
/// be overridden once. The builder is consumed by [`freeze`](Self::freeze).
#[derive(Debug, Clone)]
pub struct ProfileBuilder {
    width: usize,
    height: usize,
    transform: GeoTransform,
    crs: Crs,
    nodata: Option<f64>,
    dtype: DataType,
    tile_size: u32,
    compression: Compression,
    band_names: Vec<String>,
}

impl ProfileBuilder {
    /// Start from the template band's metadata.
    pub fn from_template(template: &BandMeta, config: &CogConfig) -> Self {
        Self {
            width: template.width,
            height: template.height,
            transform: template.transform,
            crs: template.crs.clone(),
            nodata: template.nodata,
            dtype: template.dtype,
            tile_size: config.tile_size,
            compression: config.compression,
            band_names: Vec::new(),
        }
    }

    /// Replace the output data type.
    pub fn dtype(mut self, dtype: DataType) -> Self {
        self.dtype = dtype;
        self
    }

    /// Set the band names in output order.
    pub fn band_names(mut self, names: Vec<String>) -> Self {
        self.band_names = names;
        self
    }

    /// Validate and produce the immutable profile.
    pub fn freeze(self) -> Result<OutputProfile> {
        if self.band_names.is_empty() {
            return Err(RasterError::invalid_profile("profile has no bands"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(RasterError::invalid_profile("profile has zero dimensions"));
        }
        if let Some(nodata) = self.nodata {
            let representable = match self.dtype {
                DataType::UInt8 => <u8 as NumCast>::from(nodata).is_some(),
                DataType::Int8 => <i8 as NumCast>::from(nodata).is_some(),
                DataType::UInt16 => <u16 as NumCast>::from(nodata).is_some(),
                DataType::Int16 => <i16 as NumCast>::from(nodata).is_some(),
                DataType::UInt32 => <u32 as NumCast>::from(nodata).is_some(),
                DataType::Int32 => <i32 as NumCast>::from(nodata).is_some(),
                DataType::Float32 | DataType::Float64 => true,
            };
            if !representable {
                return Err(RasterError::invalid_profile(format!(
                    "nodata {} is not representable as {}",
                    nodata, self.dtype
                )));
            }
        }

        Ok(OutputProfile {
            band_count: self.band_names.len(),
            width: self.width,
            height: self.height,
            transform: self.transform,
            crs: self.crs,
            nodata: self.nodata,
            dtype: self.dtype,
            tile_size: self.tile_size,
            compression: self.compression,
            band_names: self.band_names,
        })
    }
}

/// Metadata of one source sub-band as reported by the container codec.
#[derive(Debug, Clone, PartialEq)]
pub struct BandMeta {
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    pub crs: Crs,
    pub nodata: Option<f64>,
    pub dtype: DataType,
    /// `scale_factor` attribute carried by the source, if any.
    pub scale_factor: Option<f64>,
}

/// A sub-band read from a container.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceBand {
    pub meta: BandMeta,
    pub data: PixelBuffer,
}

impl SourceBand {
    /// Build a band, checking that the buffer matches the metadata.
    pub fn new(meta: BandMeta, data: PixelBuffer) -> Result<Self> {
        if data.len() != meta.width * meta.height {
            return Err(RasterError::invalid_metadata(format!(
                "band has {} pixels, expected {}x{}",
                data.len(),
                meta.width,
                meta.height
            )));
        }
        if data.data_type() != meta.dtype {
            return Err(RasterError::invalid_metadata(format!(
                "band data is {}, metadata says {}",
                data.data_type(),
                meta.dtype
            )));
        }
        Ok(Self { meta, data })
    }
}

/// Composed multi-band raster ready for encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedRaster {
    pub profile: OutputProfile,
    /// One buffer per band, in profile band order.
    pub bands: Vec<PixelBuffer>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(source: Option<f64>, target: Option<f64>, scale: Option<f64>) -> RecastRule {
        RecastRule {
            source_nodata: source,
            target_nodata: target,
            scale_factor: scale,
        }
    }

    #[test]
    fn test_data_type_properties() {
        assert_eq!(DataType::Int16.size_bytes(), 2);
        assert_eq!(DataType::Float64.bits(), 64);
        assert_eq!(DataType::Int32.sample_format(), 2);
        assert_eq!(DataType::Float32.sample_format(), 3);
        assert_eq!("Float32".parse::<DataType>().unwrap(), DataType::Float32);
        assert!("complex64".parse::<DataType>().is_err());
    }

    #[test]
    fn test_recast_replaces_nodata_and_preserves_values() {
        let source = PixelBuffer::Int16(vec![-9999, 0, 1234, -2000, 10000]);
        let recast = source
            .recast(DataType::Int16, &rule(Some(-9999.0), Some(-3000.0), None))
            .unwrap();

        assert_eq!(
            recast.buffer,
            PixelBuffer::Int16(vec![-3000, 0, 1234, -2000, 10000])
        );
        assert_eq!(recast.out_of_range, 0);
    }

    #[test]
    fn test_recast_scales_valid_pixels_only() {
        let source = PixelBuffer::Int16(vec![-3000, 5000, 10000]);
        let recast = source
            .recast(DataType::Float32, &rule(Some(-3000.0), Some(-3000.0), Some(10000.0)))
            .unwrap();

        assert_eq!(recast.buffer, PixelBuffer::Float32(vec![-3000.0, 0.5, 1.0]));
    }

    #[test]
    fn test_recast_counts_out_of_range() {
        let source = PixelBuffer::Int32(vec![10, 300, -5, 255]);
        let recast = source
            .recast(DataType::UInt8, &rule(None, Some(0.0), None))
            .unwrap();

        assert_eq!(recast.buffer, PixelBuffer::UInt8(vec![10, 0, 0, 255]));
        assert_eq!(recast.out_of_range, 2);
    }

    #[test]
    fn test_recast_fractions_into_integers_become_nodata() {
        let source = PixelBuffer::Float32(vec![-9999.0, 2.5, 0.75, 7.0, -12.0]);
        let recast = source
            .recast(DataType::Int16, &rule(Some(-9999.0), Some(-3000.0), None))
            .unwrap();

        assert_eq!(
            recast.buffer,
            PixelBuffer::Int16(vec![-3000, -3000, -3000, 7, -12])
        );
        assert_eq!(recast.out_of_range, 2);
    }

    #[test]
    fn test_recast_fractions_into_floats_are_kept() {
        let source = PixelBuffer::Int16(vec![25, 3]);
        let recast = source
            .recast(DataType::Float64, &rule(None, None, Some(10.0)))
            .unwrap();

        assert_eq!(recast.buffer, PixelBuffer::Float64(vec![2.5, 0.3]));
        assert_eq!(recast.out_of_range, 0);
    }

    #[test]
    fn test_recast_out_of_range_without_nodata_fails() {
        let source = PixelBuffer::Int32(vec![300]);
        assert!(source
            .recast(DataType::UInt8, &rule(None, None, None))
            .is_err());
    }

    #[test]
    fn test_nan_nodata() {
        let source = PixelBuffer::Float32(vec![f32::NAN, 1.5]);
        let recast = source
            .recast(DataType::Float32, &rule(Some(f64::NAN), Some(-1.0), None))
            .unwrap();
        assert_eq!(recast.buffer, PixelBuffer::Float32(vec![-1.0, 1.5]));
    }

    #[test]
    fn test_as_bytes_length() {
        let buffer = PixelBuffer::Float64(vec![0.0; 3]);
        assert_eq!(buffer.as_bytes().len(), 24);
    }

    #[test]
    fn test_geotransform_from_corners() {
        let transform =
            GeoTransform::from_corners((-100.0, 50.0), (100.0, -50.0), 200, 100).unwrap();
        assert_eq!(transform.0, [-100.0, 1.0, 0.0, 50.0, 0.0, -1.0]);
        assert!(!transform.is_rotated());
        assert_eq!(transform.scaled(2).pixel_size(), (2.0, -2.0));

        assert!(GeoTransform::from_corners((100.0, 50.0), (-100.0, -50.0), 200, 100).is_err());
    }

    #[test]
    fn test_sinusoidal_proj4() {
        let proj = Crs::modis_sinusoidal().to_proj4();
        assert!(proj.starts_with("+proj=sinu"));
        assert!(proj.contains("+R=6371007.181"));
    }

    #[test]
    fn test_freeze_rejects_unrepresentable_nodata() {
        let meta = BandMeta {
            width: 2,
            height: 2,
            transform: GeoTransform::north_up(0.0, 0.0, 1.0, 1.0),
            crs: Crs::Geographic(4326),
            nodata: Some(-3000.0),
            dtype: DataType::Int16,
            scale_factor: None,
        };
        let config = CogConfig::default();

        let ok = ProfileBuilder::from_template(&meta, &config)
            .band_names(vec!["a".to_string()])
            .freeze()
            .unwrap();
        assert_eq!(ok.band_count, 1);
        assert_eq!(ok.dtype, DataType::Int16);

        let err = ProfileBuilder::from_template(&meta, &config)
            .dtype(DataType::UInt8)
            .band_names(vec!["a".to_string()])
            .freeze();
        assert!(err.is_err());
    }
}
