//! Workflow task that converts one MODIS vegetation-index granule per
//! invocation into a cloud-optimized GeoTIFF next to its source.
//!
//! The binary reads a workflow event, runs the [`ingestion::Pipeline`] on
//! its first granule and writes the workflow output.

pub mod event;

pub use event::{handle, parse_event, EventError, EventInput, WorkflowEvent, WorkflowOutput};
