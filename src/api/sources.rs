//! `/sources` CRUD + start/stop.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::error::ApiError;
use crate::model::{SourceSpec, SourceState};

use super::{AppState, Items};

#[derive(Serialize)]
pub struct SourceView {
    #[serde(flatten)]
    pub spec: SourceSpec,
    pub status: SourceState,
    pub buffer_size: usize,
    pub buffer_dropped: u64,
    pub last_activity_unix: i64,
}

fn view(state: &AppState, spec: SourceSpec) -> SourceView {
    let running = state.get_source(&spec.id);
    let (status, buffer_size, buffer_dropped, last_activity_unix) = match &running {
        Some(src) => (
            src.state(),
            src.buffer.size(),
            src.buffer.dropped() + src.counters.dropped(),
            src.counters.last_activity_unix().max(src.buffer.last_activity_unix()),
        ),
        None => (SourceState::Stopped, 0, 0, 0),
    };
    SourceView {
        spec,
        status,
        buffer_size,
        buffer_dropped,
        last_activity_unix,
    }
}

pub async fn list(State(state): State<AppState>) -> Json<Items<SourceView>> {
    let views = state
        .list_sources()
        .into_iter()
        .map(|spec| view(&state, spec))
        .collect();
    Json(Items::new(views))
}

pub async fn create(
    State(state): State<AppState>,
    Json(spec): Json<SourceSpec>,
) -> Result<Json<SourceView>, ApiError> {
    let spec = state.create_source(spec).await?;
    Ok(Json(view(&state, spec)))
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SourceView>, ApiError> {
    let running = state
        .get_source(&id)
        .ok_or_else(|| ApiError::NotFound(format!("source {id} not found")))?;
    Ok(Json(view(&state, running.spec.clone())))
}

pub async fn replace(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut spec): Json<SourceSpec>,
) -> Result<Json<SourceView>, ApiError> {
    spec.id = id.clone();
    let spec = state.replace_source(&id, spec).await?;
    Ok(Json(view(&state, spec)))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(), ApiError> {
    state.delete_source(&id).await?;
    Ok(())
}

pub async fn start(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(), ApiError> {
    state.start_source_by_id(&id).await?;
    Ok(())
}

pub async fn stop(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(), ApiError> {
    state.stop_source_by_id(&id).await?;
    Ok(())
}
