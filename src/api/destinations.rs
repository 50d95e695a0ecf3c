//! `/destinations` CRUD.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::error::ApiError;
use crate::model::{DestinationSpec, DestinationStatus};

use super::{AppState, Items};

#[derive(Serialize)]
pub struct DestinationView {
    #[serde(flatten)]
    pub spec: DestinationSpec,
    pub status: DestinationStatus,
}

fn view(state: &AppState, spec: DestinationSpec) -> DestinationView {
    let status = state
        .destination_status(&spec.id)
        .unwrap_or(DestinationStatus::Disconnected);
    DestinationView { spec, status }
}

pub async fn list(State(state): State<AppState>) -> Json<Items<DestinationView>> {
    let views = state
        .list_destinations()
        .into_iter()
        .map(|spec| view(&state, spec))
        .collect();
    Json(Items::new(views))
}

pub async fn create(
    State(state): State<AppState>,
    Json(spec): Json<DestinationSpec>,
) -> Result<Json<DestinationView>, ApiError> {
    let spec = state.create_destination(spec)?;
    Ok(Json(view(&state, spec)))
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DestinationView>, ApiError> {
    state
        .list_destinations()
        .into_iter()
        .find(|d| d.id == id)
        .map(|spec| Json(view(&state, spec)))
        .ok_or_else(|| ApiError::NotFound(format!("destination {id} not found")))
}

pub async fn replace(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut spec): Json<DestinationSpec>,
) -> Result<Json<DestinationView>, ApiError> {
    spec.id = id.clone();
    let spec = state.replace_destination(&id, spec)?;
    Ok(Json(view(&state, spec)))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(), ApiError> {
    state.delete_destination(&id)?;
    Ok(())
}
