//! Workflow event contract.
//!
//! Input: `{ "config": {...}, "input": { "granules": [...] } }`
//! Output: `{ "granules": [granule] }`, the granule's first file entry
//! describing the converted artifact.

use ingestion::{Granule, Pipeline, PipelineError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

/// Errors from handling one workflow event.
#[derive(Error, Debug)]
pub enum EventError {
    #[error("Malformed workflow event: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Workflow event contains no granules")]
    NoGranules,

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Event handed to the task by the workflow engine.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowEvent {
    /// Task configuration; carried for the workflow's benefit, not used here.
    #[serde(default)]
    pub config: Map<String, Value>,
    pub input: EventInput,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventInput {
    pub granules: Vec<Granule>,
}

/// Task output handed back to the workflow engine.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowOutput {
    pub granules: Vec<Granule>,
}

/// Parse a workflow event from JSON text.
pub fn parse_event(raw: &str) -> Result<WorkflowEvent, EventError> {
    Ok(serde_json::from_str(raw)?)
}

/// Convert the event's granule.
///
/// Only the first granule is processed; additional granules are logged and
/// dropped from the output.
pub async fn handle(pipeline: &Pipeline, event: WorkflowEvent) -> Result<WorkflowOutput, EventError> {
    let mut granules = event.input.granules.into_iter();
    let granule = granules.next().ok_or(EventError::NoGranules)?;

    let ignored = granules.count();
    if ignored > 0 {
        warn!(ignored = ignored, "Event carries more than one granule; only the first is converted");
    }

    info!(granule = %granule.granule_id, data_type = %granule.data_type, "Handling workflow event");

    let converted = pipeline.process(&granule).await?;
    Ok(WorkflowOutput {
        granules: vec![converted],
    })
}
