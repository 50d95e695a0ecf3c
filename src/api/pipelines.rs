//! `/pipelines` CRUD and `/pipelines/stats`.

use axum::extract::{Path, State};
use axum::Json;

use crate::error::ApiError;
use crate::model::PipelineSpec;

use super::{AppState, Items};

pub async fn list(State(state): State<AppState>) -> Json<Items<PipelineSpec>> {
    Json(Items::new(state.list_pipelines()))
}

pub async fn create(
    State(state): State<AppState>,
    Json(spec): Json<PipelineSpec>,
) -> Result<Json<PipelineSpec>, ApiError> {
    Ok(Json(state.create_pipeline(spec)?))
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PipelineSpec>, ApiError> {
    state
        .list_pipelines()
        .into_iter()
        .find(|p| p.id == id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("pipeline {id} not found")))
}

pub async fn replace(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut spec): Json<PipelineSpec>,
) -> Result<Json<PipelineSpec>, ApiError> {
    spec.id = id.clone();
    Ok(Json(state.replace_pipeline(&id, spec)?))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(), ApiError> {
    state.delete_pipeline(&id)?;
    Ok(())
}

pub async fn stats(State(state): State<AppState>) -> Json<Vec<serde_json::Value>> {
    Json(state.pipeline_stats())
}
