//! `/loadtest/start`, `/stop`, `/status`: provisions and removes the
//! synthetic load-test Source.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::error::ApiError;
use crate::runtime::loadtest::LoadTestStatus;

use super::AppState;

#[derive(Deserialize)]
pub struct LoadTestRequest {
    #[serde(default = "default_eps")]
    pub events_per_second: u64,
    #[serde(default = "default_size_bytes")]
    pub size_bytes: usize,
    #[serde(default = "default_workers")]
    pub workers: u32,
    #[serde(default = "default_template")]
    pub template: String,
    #[serde(default)]
    pub compression: bool,
}

fn default_eps() -> u64 {
    100
}
fn default_size_bytes() -> usize {
    256
}
fn default_workers() -> u32 {
    1
}
fn default_template() -> String {
    "synthetic event {{n}} from worker {{worker}}".to_string()
}

pub async fn start(
    State(state): State<AppState>,
    Json(req): Json<LoadTestRequest>,
) -> Result<(), ApiError> {
    state
        .start_loadtest(
            req.events_per_second,
            req.size_bytes,
            req.workers,
            req.template,
            req.compression,
        )
        .await?;
    Ok(())
}

pub async fn stop(State(state): State<AppState>) -> Result<(), ApiError> {
    state.stop_loadtest().await?;
    Ok(())
}

pub async fn status(State(state): State<AppState>) -> Json<LoadTestStatus> {
    Json(state.loadtest_status())
}
