//! Band composition across mixed nodata sentinels and types.

use std::path::Path;

use raster::{
    collection_profile_for, BandComposer, BandMeta, CogConfig, CollectionProfile, CollectionTag,
    Crs, DataType, GeoTransform, MemoryReader, PixelBuffer, RasterError, SourceBand,
};
use test_utils::{fixtures::modis, int16_band};

const GROUP: &str = "Grid";

fn int16_meta(width: usize, height: usize, nodata: f64) -> BandMeta {
    BandMeta {
        width,
        height,
        transform: GeoTransform::north_up(
            modis::H12V04_UPPER_LEFT.0,
            modis::H12V04_UPPER_LEFT.1,
            231.656_358_263_889,
            231.656_358_263_889,
        ),
        crs: Crs::modis_sinusoidal(),
        nodata: Some(nodata),
        dtype: DataType::Int16,
        scale_factor: None,
    }
}

fn three_band_profile() -> CollectionProfile {
    CollectionProfile::new(
        CollectionTag::Mod13Q1,
        GROUP,
        vec!["first".to_string(), "second".to_string(), "third".to_string()],
        "first",
    )
    .unwrap()
}

#[test]
fn test_second_band_nodata_rewritten_to_template_nodata() {
    let (width, height) = (8, 4);
    let first = int16_band(width, height, -3000, 5);
    let second = int16_band(width, height, -9999, 3);
    let third = int16_band(width, height, -3000, 7);

    let reader = MemoryReader::new()
        .with_band(
            GROUP,
            "first",
            SourceBand::new(int16_meta(width, height, -3000.0), PixelBuffer::Int16(first.clone()))
                .unwrap(),
        )
        .with_band(
            GROUP,
            "second",
            SourceBand::new(int16_meta(width, height, -9999.0), PixelBuffer::Int16(second.clone()))
                .unwrap(),
        )
        .with_band(
            GROUP,
            "third",
            SourceBand::new(int16_meta(width, height, -3000.0), PixelBuffer::Int16(third.clone()))
                .unwrap(),
        );

    let config = CogConfig::default();
    let raster = BandComposer::new(&reader, &config)
        .compose(Path::new("/scratch/granule.hdf"), &three_band_profile())
        .unwrap();

    assert_eq!(raster.profile.band_count, 3);
    assert_eq!(raster.profile.dtype, DataType::Int16);
    assert_eq!(raster.profile.nodata, Some(-3000.0));
    assert_eq!(raster.profile.band_names, vec!["first", "second", "third"]);

    // Template and matching bands pass through untouched
    assert_eq!(raster.bands[0], PixelBuffer::Int16(first));
    assert_eq!(raster.bands[2], PixelBuffer::Int16(third));

    // -9999 becomes -3000, every valid value is preserved
    let expected: Vec<i16> = second
        .iter()
        .map(|&v| if v == -9999 { -3000 } else { v })
        .collect();
    assert_eq!(raster.bands[1], PixelBuffer::Int16(expected));
    match &raster.bands[1] {
        PixelBuffer::Int16(values) => assert!(!values.contains(&-9999)),
        other => panic!("unexpected buffer {other:?}"),
    }
}

#[test]
fn test_mixed_types_recast_into_template_type() {
    let (width, height) = (2, 2);
    let first = vec![-3000i16, 1, 2, 3];

    let mut int32_meta = int16_meta(width, height, -9999.0);
    int32_meta.dtype = DataType::Int32;
    let mut float_meta = int16_meta(width, height, -9999.0);
    float_meta.dtype = DataType::Float32;

    let reader = MemoryReader::new()
        .with_band(
            GROUP,
            "first",
            SourceBand::new(int16_meta(width, height, -3000.0), PixelBuffer::Int16(first))
                .unwrap(),
        )
        .with_band(
            GROUP,
            "second",
            SourceBand::new(int32_meta, PixelBuffer::Int32(vec![-9999, 32_767, -32_768, 40_000]))
                .unwrap(),
        )
        .with_band(
            GROUP,
            "third",
            SourceBand::new(float_meta, PixelBuffer::Float32(vec![-9999.0, 2.5, 0.75, 7.0]))
                .unwrap(),
        );

    let config = CogConfig::default();
    let raster = BandComposer::new(&reader, &config)
        .compose(Path::new("/scratch/granule.hdf"), &three_band_profile())
        .unwrap();

    assert_eq!(raster.profile.dtype, DataType::Int16);
    assert_eq!(raster.profile.nodata, Some(-3000.0));

    // In-range integers survive; 40000 does not fit in int16
    assert_eq!(
        raster.bands[1],
        PixelBuffer::Int16(vec![-3000, 32_767, -32_768, -3000])
    );
    // Fractions are not representable in int16 and are never truncated
    assert_eq!(raster.bands[2], PixelBuffer::Int16(vec![-3000, -3000, -3000, 7]));
}

#[test]
fn test_band_order_follows_recipe() {
    let (width, height) = (2, 2);
    let band = |value: i16| {
        SourceBand::new(
            int16_meta(width, height, -3000.0),
            PixelBuffer::Int16(vec![value; width * height]),
        )
        .unwrap()
    };
    let reader = MemoryReader::new()
        .with_band(GROUP, "third", band(3))
        .with_band(GROUP, "first", band(1))
        .with_band(GROUP, "second", band(2));

    let config = CogConfig::default();
    let raster = BandComposer::new(&reader, &config)
        .compose(Path::new("/scratch/granule.hdf"), &three_band_profile())
        .unwrap();

    let firsts: Vec<i16> = raster
        .bands
        .iter()
        .map(|b| b.get_f64(0).unwrap() as i16)
        .collect();
    assert_eq!(firsts, vec![1, 2, 3]);
}

#[test]
fn test_modis_recipe_output_is_scaled_float() {
    let (width, height) = (4, 4);
    let ndvi = int16_band(width, height, modis::VI_FILL, 4);
    let profile = collection_profile_for("MYD13Q1").unwrap();

    let mut meta = int16_meta(width, height, modis::VI_FILL as f64);
    meta.scale_factor = Some(modis::VI_SCALE);
    let reader = MemoryReader::new()
        .with_band(
            modis::GRID_250M,
            "250m 16 days NDVI",
            SourceBand::new(meta.clone(), PixelBuffer::Int16(ndvi.clone())).unwrap(),
        )
        .with_band(
            modis::GRID_250M,
            "250m 16 days EVI",
            SourceBand::new(meta, PixelBuffer::Int16(ndvi.clone())).unwrap(),
        );

    let config = CogConfig::default();
    let raster = BandComposer::new(&reader, &config)
        .compose(Path::new("/scratch/granule.hdf"), &profile)
        .unwrap();

    assert_eq!(raster.profile.dtype, DataType::Float32);
    match &raster.bands[0] {
        PixelBuffer::Float32(values) => {
            for (out, raw) in values.iter().zip(&ndvi) {
                if *raw == modis::VI_FILL {
                    assert_eq!(*out, -3000.0);
                } else {
                    assert_eq!(*out, (*raw as f64 / modis::VI_SCALE) as f32);
                }
            }
        }
        other => panic!("unexpected buffer {other:?}"),
    }
}

#[test]
fn test_unknown_collection_fails_before_reading() {
    assert!(matches!(
        collection_profile_for("MCD43A4"),
        Err(RasterError::UnsupportedCollection(_))
    ));
}
