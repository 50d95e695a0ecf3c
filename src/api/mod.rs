//! Control plane: the `/api/v1` REST surface. Every handler
//! here is a thin translation layer onto [`crate::runtime::Runtime`] — the
//! sole mutation surface onto the dataplane. Error bodies are
//! `text/plain` with a human-readable reason, via [`crate::error::ApiError`].

mod destinations;
mod enrichment;
mod library;
mod loadtest;
mod misc;
mod pipelines;
mod preview;
mod routes;
mod sources;
mod stream;

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post, put};
use axum::Router as AxumRouter;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::metrics::metrics;
use crate::runtime::Runtime;

pub type AppState = Arc<Runtime>;

/// List responses historically mixed a bare JSON array and `{items: [...]}`.
/// This implementation picks `{items: [...]}` as the one canonical shape
/// going forward; see DESIGN.md for the migration note.
#[derive(serde::Serialize)]
pub struct Items<T: serde::Serialize> {
    pub items: Vec<T>,
}

impl<T: serde::Serialize> Items<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self { items }
    }
}

pub fn build_router(state: AppState) -> AxumRouter {
    AxumRouter::new()
        .route("/health", get(misc::health))
        .route("/version", get(misc::version))
        .route("/info", get(misc::info))
        .route("/metrics", get(misc::metrics_text))
        .route("/sources", get(sources::list).post(sources::create))
        .route(
            "/sources/:id",
            get(sources::get_one)
                .put(sources::replace)
                .delete(sources::delete),
        )
        .route("/sources/:id/start", post(sources::start))
        .route("/sources/:id/stop", post(sources::stop))
        .route("/sources/:id/stream", get(stream::tail))
        .route("/sources/:id/capture/start", post(stream::capture_start))
        .route(
            "/sources/:id/capture/stop/:capture_id",
            post(stream::capture_stop),
        )
        .route("/pipelines", get(pipelines::list).post(pipelines::create))
        .route(
            "/pipelines/:id",
            get(pipelines::get_one)
                .put(pipelines::replace)
                .delete(pipelines::delete),
        )
        .route("/pipelines/stats", get(pipelines::stats))
        .route("/routes", get(routes::list).post(routes::create))
        .route(
            "/routes/:id",
            get(routes::get_one)
                .put(routes::replace)
                .delete(routes::delete),
        )
        .route(
            "/destinations",
            get(destinations::list).post(destinations::create),
        )
        .route(
            "/destinations/:id",
            get(destinations::get_one)
                .put(destinations::replace)
                .delete(destinations::delete),
        )
        .route("/preview/regex", post(preview::regex))
        .route("/preview/enrich", post(preview::enrich))
        .route("/enrich/geoip/status", get(enrichment::geoip_status))
        .route("/enrich/asn/status", get(enrichment::asn_status))
        .route("/enrich/geoip/upload", put(enrichment::geoip_upload))
        .route("/enrich/asn/upload", put(enrichment::asn_upload))
        .route("/library", get(library::list))
        .route("/library/:name", get(library::get_one))
        .route("/loadtest/start", post(loadtest::start))
        .route("/loadtest/stop", post(loadtest::stop))
        .route("/loadtest/status", get(loadtest::status))
        .layer(middleware::from_fn(track_http_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Records HTTP request/latency/in-flight metrics for every route via
/// middleware rather than per-handler instrumentation.
async fn track_http_metrics(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    metrics().http_in_flight.with_label_values(&[&method]).inc();
    let start = Instant::now();

    let response = next.run(req).await;

    let status = response.status().as_u16().to_string();
    metrics()
        .http_in_flight
        .with_label_values(&[&method])
        .dec();
    metrics()
        .http_requests_total
        .with_label_values(&[&method, &path, &status])
        .inc();
    metrics()
        .http_request_duration_seconds
        .with_label_values(&[&method, &path, &status])
        .observe(start.elapsed().as_secs_f64());

    response
}
