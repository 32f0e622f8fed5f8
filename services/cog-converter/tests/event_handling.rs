//! Workflow event handling against in-memory storage.

use std::sync::Arc;

use bytes::Bytes;
use cog_converter::{handle, parse_event, EventError};
use ingestion::{ConverterConfig, Pipeline, Stage};
use raster::{
    BandMeta, CogConfig, CogEncoder, Crs, DataType, GeoTransform, MemoryReader, PixelBuffer,
    SourceBand,
};
use storage::{MemoryStorage, ObjectStorage};
use test_utils::{deterministic_bytes, int16_band, modis};

const SOURCE_KEY: &str = "staging/MOD13Q1___061/2021001/MOD13Q1.A2021001.h12v04.061.2021018041334.hdf";
const OUTPUT_KEY: &str = "staging/MOD13Q1___061/2021001/MOD13Q1.A2021001.h12v04.061.2021018041334.tif";

const EVENT: &str = r#"{
    "config": {"stack": "nncpp-dev", "buckets": {}},
    "input": {
        "granules": [{
            "granuleId": "MOD13Q1.A2021001.h12v04.061",
            "dataType": "MOD13Q1",
            "version": "061",
            "files": [{
                "name": "2021001/MOD13Q1.A2021001.h12v04.061.2021018041334.hdf",
                "fileStagingDir": "staging/MOD13Q1___061",
                "type": "data"
            }]
        }]
    }
}"#;

fn band() -> SourceBand {
    let (width, height) = (40, 40);
    SourceBand::new(
        BandMeta {
            width,
            height,
            transform: GeoTransform::north_up(
                modis::H12V04_UPPER_LEFT.0,
                modis::H12V04_UPPER_LEFT.1,
                231.656,
                231.656,
            ),
            crs: Crs::modis_sinusoidal(),
            nodata: Some(modis::VI_FILL as f64),
            dtype: DataType::Int16,
            scale_factor: Some(modis::VI_SCALE),
        },
        PixelBuffer::Int16(int16_band(width, height, modis::VI_FILL, 5)),
    )
    .unwrap()
}

fn pipeline(storage: Arc<MemoryStorage>, scratch: &std::path::Path) -> Pipeline {
    let config = ConverterConfig {
        scratch_dir: scratch.to_path_buf(),
        cog: CogConfig {
            tile_size: 16,
            ..CogConfig::default()
        },
        ..ConverterConfig::default()
    };
    let reader = MemoryReader::new()
        .with_band(modis::GRID_250M, "250m 16 days NDVI", band())
        .with_band(modis::GRID_250M, "250m 16 days EVI", band());
    let encoder = Arc::new(CogEncoder::new(config.cog.clone()).unwrap());
    Pipeline::new(storage, Arc::new(reader), encoder, config).unwrap()
}

#[tokio::test]
async fn test_event_output_shape() {
    let storage = Arc::new(MemoryStorage::new("nncpp-staging"));
    storage
        .put(SOURCE_KEY, Bytes::from(deterministic_bytes(2048, 1)))
        .await
        .unwrap();
    let scratch = tempfile::tempdir().unwrap();

    let event = parse_event(EVENT).unwrap();
    let output = handle(&pipeline(storage.clone(), scratch.path()), event)
        .await
        .unwrap();

    let value = serde_json::to_value(&output).unwrap();
    let granules = value["granules"].as_array().unwrap();
    assert_eq!(granules.len(), 1);

    let file = &granules[0]["files"][0];
    assert_eq!(file["path"], format!("/{}", OUTPUT_KEY));
    assert_eq!(file["bucket"], "nncpp-staging");
    assert_eq!(file["filename"], format!("s3://nncpp-staging/{}", OUTPUT_KEY));
    assert_eq!(file["type"], "data");
    assert_eq!(granules[0]["version"], "061");
    assert!(file["size"].as_u64().unwrap() > 0);
    assert!(file["created"].as_str().unwrap().ends_with('Z'));

    assert!(storage.exists(OUTPUT_KEY).await.unwrap());
}

#[tokio::test]
async fn test_event_without_granules() {
    let storage = Arc::new(MemoryStorage::new("nncpp-staging"));
    let scratch = tempfile::tempdir().unwrap();
    let event = parse_event(r#"{"config": {}, "input": {"granules": []}}"#).unwrap();

    let err = handle(&pipeline(storage, scratch.path()), event)
        .await
        .unwrap_err();
    assert!(matches!(err, EventError::NoGranules));
}

#[tokio::test]
async fn test_event_pipeline_failure() {
    let storage = Arc::new(MemoryStorage::new("nncpp-staging"));
    let scratch = tempfile::tempdir().unwrap();
    let event = parse_event(EVENT).unwrap();

    let err = handle(&pipeline(storage, scratch.path()), event)
        .await
        .unwrap_err();
    match err {
        EventError::Pipeline(e) => assert_eq!(e.stage, Stage::Fetch),
        other => panic!("unexpected error: {other}"),
    }
}
