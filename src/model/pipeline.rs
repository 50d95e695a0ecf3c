//! Pipeline entity: an ordered, pure chain of transform steps.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    pub kind: String,
    #[serde(default)]
    pub config: JsonValue,
    #[serde(default)]
    pub strict_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub id: String,
    pub name: String,
    pub steps: Vec<StepSpec>,
}

/// Per-pipeline runtime counters, surfaced by `/pipelines/stats`.
#[derive(Debug, Default)]
pub struct PipelineCounters {
    pub processed: std::sync::atomic::AtomicU64,
    pub filtered: std::sync::atomic::AtomicU64,
    pub errors: std::sync::atomic::AtomicU64,
}

impl PipelineCounters {
    pub fn new() -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self::default())
    }
}
