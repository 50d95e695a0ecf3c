//! `/routes` CRUD. Routes are stored and evaluated in `order` order;
//! re-ordering is a set-level atomic swap.

use axum::extract::{Path, State};
use axum::Json;

use crate::error::ApiError;
use crate::model::RouteSpec;

use super::{AppState, Items};

pub async fn list(State(state): State<AppState>) -> Json<Items<RouteSpec>> {
    Json(Items::new(state.list_routes()))
}

pub async fn create(
    State(state): State<AppState>,
    Json(spec): Json<RouteSpec>,
) -> Result<Json<RouteSpec>, ApiError> {
    state.upsert_route(spec.clone())?;
    Ok(Json(spec))
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RouteSpec>, ApiError> {
    state
        .list_routes()
        .into_iter()
        .find(|r| r.id == id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("route {id} not found")))
}

pub async fn replace(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut spec): Json<RouteSpec>,
) -> Result<Json<RouteSpec>, ApiError> {
    spec.id = id;
    state.upsert_route(spec.clone())?;
    Ok(Json(spec))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(), ApiError> {
    state.delete_route(&id)?;
    Ok(())
}
