//! `/enrich/{geoip,asn}/status` and `/upload`: swap an MMDB atomically,
//! never observed torn by a concurrent reader.

use axum::extract::{Multipart, State};
use axum::Json;

use crate::error::ApiError;

use super::AppState;

pub async fn geoip_status(State(state): State<AppState>) -> Json<crate::enrichment::DbStatus> {
    Json(state.enrichment.geo_status())
}

pub async fn asn_status(State(state): State<AppState>) -> Json<crate::enrichment::DbStatus> {
    Json(state.enrichment.asn_status())
}

pub async fn geoip_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(), ApiError> {
    let path = save_upload(&state, multipart, "geoip.mmdb").await?;
    state
        .enrichment
        .load_geo(&path)
        .map_err(|e| ApiError::BadRequest(format!("invalid geoip database: {e}")))
}

pub async fn asn_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(), ApiError> {
    let path = save_upload(&state, multipart, "asn.mmdb").await?;
    state
        .enrichment
        .load_asn(&path)
        .map_err(|e| ApiError::BadRequest(format!("invalid asn database: {e}")))
}

/// Buffers the uploaded multipart field to disk verbatim under the data
/// directory, then returns the path for the caller to hand to
/// [`crate::enrichment::EnrichmentStore`].
async fn save_upload(
    state: &AppState,
    mut multipart: Multipart,
    filename: &str,
) -> Result<std::path::PathBuf, ApiError> {
    let dir = state.config.data_dir.join("enrichment");
    std::fs::create_dir_all(&dir).map_err(|e| ApiError::Internal(e.to_string()))?;
    let path = dir.join(filename);

    let field = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
        .ok_or_else(|| ApiError::BadRequest("missing multipart field".to_string()))?;
    let bytes = field
        .bytes()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    std::fs::write(&path, &bytes).map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(path)
}
