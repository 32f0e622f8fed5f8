//! Cloud-optimized GeoTIFF encoding.
//!
//! Output layout:
//! - full-resolution image first, then overviews (`NewSubfileType = 1`)
//!   at factors 2, 4, 8, ... per [`CogConfig::overview_factors`]
//! - square tiles, pixel-interleaved bands, edge tiles padded with nodata
//! - deflate (zlib) compressed tiles
//! - GeoTIFF georeferencing, `GDAL_NODATA` and band descriptions in
//!   `GDAL_METADATA` on the full-resolution image
//!
//! Every encode is re-read with the tiff decoder before it is reported as
//! written.

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufReader, Cursor, Seek, Write};
use std::path::{Path, PathBuf};

use flate2::write::ZlibEncoder;
use num_traits::NumCast;
use tiff::decoder::ifd::Value;
use tiff::decoder::Decoder;
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;
use tracing::{debug, info};

use crate::config::{CogConfig, Compression};
use crate::downsample::{decimated_size, downsample_buffer};
use crate::error::{RasterError, Result};
use crate::geokeys::{
    GeoKeyDirectory, ModelPlacement, GEO_ASCII_PARAMS, GEO_DOUBLE_PARAMS, GEO_KEY_DIRECTORY,
    MODEL_PIXEL_SCALE, MODEL_TIEPOINT, MODEL_TRANSFORMATION,
};
use crate::types::{ComposedRaster, DataType, OutputProfile, PixelBuffer};

const NEW_SUBFILE_TYPE: u16 = 254;
const GDAL_METADATA: u16 = 42112;
const GDAL_NODATA: u16 = 42113;

/// Reduced-resolution image flag for NewSubfileType.
const SUBFILE_REDUCED_IMAGE: u32 = 1;

/// Result of a successful encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRaster {
    pub path: PathBuf,
    /// File size in bytes.
    pub size: u64,
    /// Number of images written, including full resolution.
    pub levels: usize,
}

/// Writes a composed raster to a file.
pub trait RasterEncoder: Send + Sync {
    fn encode(&self, raster: &ComposedRaster, path: &Path) -> Result<EncodedRaster>;
}

/// Tiled, compressed, overview-pyramided GeoTIFF encoder.
#[derive(Debug, Clone, Default)]
pub struct CogEncoder {
    config: CogConfig,
}

/// One image of the pyramid.
struct Level<'a> {
    width: usize,
    height: usize,
    bands: Cow<'a, [PixelBuffer]>,
}

/// What the validator expects to find in each image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LevelShape {
    width: usize,
    height: usize,
    tiles: usize,
}

impl CogEncoder {
    pub fn new(config: CogConfig) -> Result<Self> {
        config.validate().map_err(RasterError::Config)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CogConfig {
        &self.config
    }

    fn check_input(&self, raster: &ComposedRaster) -> Result<()> {
        let profile = &raster.profile;
        if raster.bands.len() != profile.band_count || profile.band_names.len() != profile.band_count {
            return Err(RasterError::encode_failure(format!(
                "profile declares {} bands, got {} buffers and {} names",
                profile.band_count,
                raster.bands.len(),
                profile.band_names.len()
            )));
        }
        for (band, name) in raster.bands.iter().zip(&profile.band_names) {
            if band.len() != profile.pixel_count() || band.data_type() != profile.dtype {
                return Err(RasterError::encode_failure(format!(
                    "band {} is {} x {} pixels, expected {} x {}",
                    name,
                    band.len(),
                    band.data_type(),
                    profile.pixel_count(),
                    profile.dtype
                )));
            }
        }
        if profile.tile_size != self.config.tile_size {
            return Err(RasterError::encode_failure(format!(
                "profile tile size {} does not match encoder tile size {}",
                profile.tile_size, self.config.tile_size
            )));
        }
        Ok(())
    }

    fn levels<'a>(&self, raster: &'a ComposedRaster) -> Vec<Level<'a>> {
        let profile = &raster.profile;
        let mut levels = vec![Level {
            width: profile.width,
            height: profile.height,
            bands: Cow::Borrowed(raster.bands.as_slice()),
        }];

        let step = self.config.overview_factor;
        for _ in self.config.overview_factors(profile.width, profile.height) {
            let previous = &levels[levels.len() - 1];
            let (width, height) = decimated_size(previous.width, previous.height, step);
            let bands = previous
                .bands
                .iter()
                .map(|band| downsample_buffer(band, previous.width, previous.height, step))
                .collect::<Vec<_>>();
            levels.push(Level {
                width,
                height,
                bands: Cow::Owned(bands),
            });
        }

        levels
    }

    fn tiles_for(&self, width: usize, height: usize) -> usize {
        let tile = self.config.tile_size as usize;
        width.div_ceil(tile) * height.div_ceil(tile)
    }

    fn write_level<W: Write + Seek, K: TiffKind>(
        &self,
        dir: &mut DirectoryEncoder<'_, W, K>,
        level: &Level<'_>,
        profile: &OutputProfile,
        overview: bool,
    ) -> Result<()> {
        let bands = level.bands.len();
        let tile = self.config.tile_size;

        if overview {
            dir.write_tag(Tag::from_u16_exhaustive(NEW_SUBFILE_TYPE), SUBFILE_REDUCED_IMAGE)?;
        }
        dir.write_tag(Tag::ImageWidth, level.width as u32)?;
        dir.write_tag(Tag::ImageLength, level.height as u32)?;

        let bits_per_sample: Vec<u16> = vec![profile.dtype.bits(); bands];
        dir.write_tag(Tag::BitsPerSample, bits_per_sample.as_slice())?;
        dir.write_tag(Tag::Compression, self.config.compression.tiff_code())?;

        // PhotometricInterpretation: 1 = BlackIsZero
        dir.write_tag(Tag::PhotometricInterpretation, 1u16)?;
        dir.write_tag(Tag::SamplesPerPixel, bands as u16)?;

        let sample_format: Vec<u16> = vec![profile.dtype.sample_format(); bands];
        dir.write_tag(Tag::SampleFormat, sample_format.as_slice())?;

        // PlanarConfiguration: 1 = Chunky (pixel interleaved)
        dir.write_tag(Tag::PlanarConfiguration, 1u16)?;
        dir.write_tag(Tag::TileWidth, tile)?;
        dir.write_tag(Tag::TileLength, tile)?;

        if bands > 1 {
            let extra_samples: Vec<u16> = vec![0; bands - 1];
            dir.write_tag(Tag::ExtraSamples, extra_samples.as_slice())?;
        }

        if !overview {
            write_georeferencing(dir, profile)?;
            dir.write_tag(
                Tag::from_u16_exhaustive(GDAL_METADATA),
                gdal_metadata(&profile.band_names).as_str(),
            )?;
        }
        if let Some(nodata) = profile.nodata {
            dir.write_tag(Tag::from_u16_exhaustive(GDAL_NODATA), format_nodata(nodata).as_str())?;
        }

        let fill = fill_sample(profile.dtype, profile.nodata);
        let band_bytes: Vec<&[u8]> = level.bands.iter().map(|b| b.as_bytes()).collect();
        let tile = tile as usize;

        let mut offsets = Vec::new();
        let mut byte_counts = Vec::new();
        for tile_y in 0..level.height.div_ceil(tile) {
            for tile_x in 0..level.width.div_ceil(tile) {
                let raw = assemble_tile(&band_bytes, &fill, level.width, level.height, tile, tile_x, tile_y);
                let encoded = self.compress(&raw)?;

                let offset = dir.write_data(encoded.as_slice())?;
                offsets.push(u32::try_from(offset).map_err(|_| {
                    RasterError::encode_failure("output exceeds 4 GiB; BigTIFF is not supported")
                })?);
                byte_counts.push(encoded.len() as u32);
            }
        }

        dir.write_tag(Tag::TileOffsets, offsets.as_slice())?;
        dir.write_tag(Tag::TileByteCounts, byte_counts.as_slice())?;

        debug!(
            width = level.width,
            height = level.height,
            tiles = offsets.len(),
            overview = overview,
            "Wrote image"
        );
        Ok(())
    }

    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>> {
        match self.config.compression {
            Compression::None => Ok(raw.to_vec()),
            Compression::Deflate => {
                let mut encoder = ZlibEncoder::new(
                    Vec::with_capacity(raw.len() / 2),
                    flate2::Compression::new(self.config.deflate_level),
                );
                encoder.write_all(raw)?;
                Ok(encoder.finish()?)
            }
        }
    }

    /// Re-read the file and check every image against what was written.
    fn validate(&self, path: &Path, profile: &OutputProfile, expected: &[LevelShape]) -> Result<()> {
        let mut decoder = Decoder::new(BufReader::new(File::open(path)?))?;

        for (index, shape) in expected.iter().enumerate() {
            if index > 0 {
                if !decoder.more_images() {
                    return Err(RasterError::encode_failure(format!(
                        "expected {} images, found {}",
                        expected.len(),
                        index
                    )));
                }
                decoder.next_image()?;
            }

            let (width, height) = decoder.dimensions()?;
            if (width as usize, height as usize) != (shape.width, shape.height) {
                return Err(RasterError::encode_failure(format!(
                    "image {} is {}x{}, expected {}x{}",
                    index, width, height, shape.width, shape.height
                )));
            }

            let samples = decoder.get_tag_u32(Tag::SamplesPerPixel)? as usize;
            if samples != profile.band_count {
                return Err(RasterError::encode_failure(format!(
                    "image {} has {} bands, expected {}",
                    index, samples, profile.band_count
                )));
            }

            let tile_width = decoder.get_tag_u32(Tag::TileWidth)?;
            let tile_length = decoder.get_tag_u32(Tag::TileLength)?;
            if tile_width != self.config.tile_size || tile_length != self.config.tile_size {
                return Err(RasterError::encode_failure(format!(
                    "image {} has {}x{} tiles, expected {}",
                    index, tile_width, tile_length, self.config.tile_size
                )));
            }

            let tiles = match decoder.get_tag(Tag::TileOffsets)? {
                Value::List(offsets) => offsets.len(),
                _ => 1,
            };
            if tiles != shape.tiles {
                return Err(RasterError::encode_failure(format!(
                    "image {} has {} tiles, expected {}",
                    index, tiles, shape.tiles
                )));
            }
        }

        if decoder.more_images() {
            return Err(RasterError::encode_failure(format!(
                "found more than {} images",
                expected.len()
            )));
        }

        Ok(())
    }
}

impl RasterEncoder for CogEncoder {
    fn encode(&self, raster: &ComposedRaster, path: &Path) -> Result<EncodedRaster> {
        self.check_input(raster)?;
        let profile = &raster.profile;
        let levels = self.levels(raster);

        let mut buffer = Cursor::new(Vec::new());
        {
            let mut encoder = TiffEncoder::new(&mut buffer)?;
            for (index, level) in levels.iter().enumerate() {
                let mut dir = encoder.new_directory()?;
                self.write_level(&mut dir, level, profile, index > 0)?;
                dir.finish()?;
            }
        }

        let bytes = buffer.into_inner();
        std::fs::write(path, &bytes)?;

        let shapes: Vec<LevelShape> = levels
            .iter()
            .map(|level| LevelShape {
                width: level.width,
                height: level.height,
                tiles: self.tiles_for(level.width, level.height),
            })
            .collect();
        self.validate(path, profile, &shapes)?;

        info!(
            path = %path.display(),
            size = bytes.len(),
            bands = profile.band_count,
            overviews = levels.len() - 1,
            compression = %self.config.compression,
            "Encoded cloud-optimized GeoTIFF"
        );

        Ok(EncodedRaster {
            path: path.to_path_buf(),
            size: bytes.len() as u64,
            levels: levels.len(),
        })
    }
}

fn write_georeferencing<W: Write + Seek, K: TiffKind>(
    dir: &mut DirectoryEncoder<'_, W, K>,
    profile: &OutputProfile,
) -> Result<()> {
    match ModelPlacement::for_transform(&profile.transform) {
        ModelPlacement::ScaleTiepoint { scale, tiepoint } => {
            dir.write_tag(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE), scale.as_slice())?;
            dir.write_tag(Tag::from_u16_exhaustive(MODEL_TIEPOINT), tiepoint.as_slice())?;
        }
        ModelPlacement::Transformation(matrix) => {
            dir.write_tag(Tag::from_u16_exhaustive(MODEL_TRANSFORMATION), matrix.as_slice())?;
        }
    }

    let keys = GeoKeyDirectory::for_crs(&profile.crs);
    dir.write_tag(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY), keys.directory.as_slice())?;
    if !keys.doubles.is_empty() {
        dir.write_tag(Tag::from_u16_exhaustive(GEO_DOUBLE_PARAMS), keys.doubles.as_slice())?;
    }
    if !keys.ascii.is_empty() {
        dir.write_tag(Tag::from_u16_exhaustive(GEO_ASCII_PARAMS), ascii(&keys.ascii).as_str())?;
    }
    Ok(())
}

/// Copy one tile out of the band planes, interleaving samples per pixel.
fn assemble_tile(
    bands: &[&[u8]],
    fill: &[u8],
    width: usize,
    height: usize,
    tile: usize,
    tile_x: usize,
    tile_y: usize,
) -> Vec<u8> {
    let sample = fill.len();
    let pixel = sample * bands.len();
    let mut out: Vec<u8> = fill.iter().copied().cycle().take(tile * tile * pixel).collect();

    let x0 = tile_x * tile;
    let y0 = tile_y * tile;
    let cols = tile.min(width - x0);
    let rows = tile.min(height - y0);

    for row in 0..rows {
        for col in 0..cols {
            let src = ((y0 + row) * width + x0 + col) * sample;
            let dst = (row * tile + col) * pixel;
            for (b, band) in bands.iter().enumerate() {
                let at = dst + b * sample;
                out[at..at + sample].copy_from_slice(&band[src..src + sample]);
            }
        }
    }

    out
}

/// Native-endian bytes of the padding value (nodata, or zero).
fn fill_sample(dtype: DataType, nodata: Option<f64>) -> Vec<u8> {
    fn bytes<T: NumCast + bytemuck::Pod + Default>(nodata: Option<f64>) -> Vec<u8> {
        let value: T = nodata.and_then(|n| <T as NumCast>::from(n)).unwrap_or_default();
        bytemuck::bytes_of(&value).to_vec()
    }

    match dtype {
        DataType::UInt8 => bytes::<u8>(nodata),
        DataType::Int8 => bytes::<i8>(nodata),
        DataType::UInt16 => bytes::<u16>(nodata),
        DataType::Int16 => bytes::<i16>(nodata),
        DataType::UInt32 => bytes::<u32>(nodata),
        DataType::Int32 => bytes::<i32>(nodata),
        DataType::Float32 => bytes::<f32>(nodata),
        DataType::Float64 => bytes::<f64>(nodata),
    }
}

/// GDAL's textual nodata form.
fn format_nodata(nodata: f64) -> String {
    if nodata.is_nan() {
        "nan".to_string()
    } else {
        nodata.to_string()
    }
}

/// Band descriptions in GDAL's metadata XML.
fn gdal_metadata(band_names: &[String]) -> String {
    let mut xml = String::from("<GDALMetadata>\n");
    for (index, name) in band_names.iter().enumerate() {
        xml.push_str(&format!(
            "  <Item name=\"DESCRIPTION\" sample=\"{}\" role=\"description\">{}</Item>\n",
            index,
            ascii(&escape_xml(name))
        ));
    }
    xml.push_str("</GDALMetadata>");
    xml
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// TIFF ASCII fields are 7-bit and NUL terminated.
fn ascii(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii() && c != '\0' { c } else { '?' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_tile_interleaves_and_pads() {
        // Two 3x1 uint8 bands, 2x2 tiles, padding value 9
        let a = [1u8, 2, 3];
        let b = [10u8, 20, 30];
        let bands: Vec<&[u8]> = vec![&a, &b];

        let first = assemble_tile(&bands, &[9], 3, 1, 2, 0, 0);
        assert_eq!(first, vec![1, 10, 2, 20, 9, 9, 9, 9]);

        let second = assemble_tile(&bands, &[9], 3, 1, 2, 1, 0);
        assert_eq!(second, vec![3, 30, 9, 9, 9, 9, 9, 9]);
    }

    #[test]
    fn test_fill_sample() {
        assert_eq!(fill_sample(DataType::Int16, Some(-3000.0)), (-3000i16).to_ne_bytes().to_vec());
        assert_eq!(fill_sample(DataType::UInt8, None), vec![0]);
        assert_eq!(fill_sample(DataType::Float32, Some(-3000.0)), (-3000f32).to_ne_bytes().to_vec());
    }

    #[test]
    fn test_format_nodata() {
        assert_eq!(format_nodata(-3000.0), "-3000");
        assert_eq!(format_nodata(0.5), "0.5");
        assert_eq!(format_nodata(f64::NAN), "nan");
    }

    #[test]
    fn test_gdal_metadata() {
        let xml = gdal_metadata(&["250m 16 days NDVI".to_string(), "a<b".to_string()]);
        assert!(xml.contains("sample=\"0\" role=\"description\">250m 16 days NDVI</Item>"));
        assert!(xml.contains("sample=\"1\" role=\"description\">a&lt;b</Item>"));
    }

    #[test]
    fn test_compress_none_is_identity() {
        let encoder = CogEncoder::new(CogConfig {
            compression: Compression::None,
            ..CogConfig::default()
        })
        .unwrap();
        assert_eq!(encoder.compress(&[1, 2, 3]).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = CogEncoder::new(CogConfig {
            tile_size: 10,
            ..CogConfig::default()
        });
        assert!(matches!(result, Err(RasterError::Config(_))));
    }
}
