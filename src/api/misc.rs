//! `/health`, `/version`, `/info`, `/metrics`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use super::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(Serialize)]
pub struct VersionResponse {
    version: &'static str,
}

pub async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        version: crate::VERSION,
    })
}

#[derive(Serialize)]
pub struct InfoResponse {
    host: String,
    port: u16,
    http_addr: String,
    tls_enabled: bool,
    tls_min: String,
}

pub async fn info(State(state): State<AppState>) -> Json<InfoResponse> {
    let (host, port) = state
        .config
        .http_addr
        .rsplit_once(':')
        .map(|(h, p)| (h.to_string(), p.parse().unwrap_or(0)))
        .unwrap_or_else(|| (state.config.http_addr.clone(), 0));

    Json(InfoResponse {
        host,
        port,
        http_addr: state.config.http_addr.clone(),
        tls_enabled: state.config.tls_enabled,
        tls_min: state.config.tls_min.clone(),
    })
}

pub async fn metrics_text() -> Response {
    match crate::metrics::render() {
        Ok(body) => (
            StatusCode::OK,
            [("Content-Type", "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
