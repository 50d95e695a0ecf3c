//! `/sources/{id}/stream`, `/capture/start`, `/capture/stop/{id}`. The
//! SSE contract is bit-exact: one `data: <raw>\n\n` line per delivered
//! record.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::Json;
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use crate::error::ApiError;
use crate::model::CaptureFormat;

use super::AppState;

#[derive(Deserialize)]
pub struct TailQuery {
    #[serde(default)]
    pub tail: usize,
    pub limit: Option<usize>,
}

pub async fn tail(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<TailQuery>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let source = state
        .get_source(&id)
        .ok_or_else(|| ApiError::NotFound(format!("source {id} not found")))?;

    let rx = source.hub.subscribe(query.tail, query.limit);
    let stream = ReceiverStream::new(rx).map(|record| Ok(SseEvent::default().data(record.raw)));

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

#[derive(Deserialize)]
pub struct CaptureStartRequest {
    #[serde(default)]
    pub format: CaptureFormatRequest,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptureFormatRequest {
    #[default]
    Line,
    JsonLines,
}

impl From<CaptureFormatRequest> for CaptureFormat {
    fn from(value: CaptureFormatRequest) -> Self {
        match value {
            CaptureFormatRequest::Line => CaptureFormat::Line,
            CaptureFormatRequest::JsonLines => CaptureFormat::JsonLines,
        }
    }
}

#[derive(Serialize)]
pub struct CaptureStartResponse {
    pub capture_id: String,
    pub path: String,
}

pub async fn capture_start(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CaptureStartRequest>,
) -> Result<Json<CaptureStartResponse>, ApiError> {
    let info = state
        .start_capture(&id, req.format.into())
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(Json(CaptureStartResponse {
        capture_id: info.id,
        path: info.path,
    }))
}

pub async fn capture_stop(
    State(state): State<AppState>,
    Path((_id, capture_id)): Path<(String, String)>,
) -> Result<(), ApiError> {
    state
        .stop_capture(&capture_id)
        .map_err(|e| ApiError::NotFound(e.to_string()))
}
