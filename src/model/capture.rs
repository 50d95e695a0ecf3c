//! Capture entity: a short-lived rolling writer attached to a Source's
//! Live Tail Hub.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureFormat {
    Line,
    JsonLines,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureInfo {
    pub id: String,
    pub source_id: String,
    pub path: String,
    pub format: CaptureFormat,
    pub started_at: DateTime<Utc>,
}
