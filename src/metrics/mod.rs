//! Prometheus metrics surface.
//!
//! Registered once into a process-global registry via `once_cell::Lazy`,
//! the same idempotent-registration pattern used elsewhere in this
//! codebase for ingestion-path metrics, generalized to the full
//! counter/gauge/histogram set this dataplane publishes.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_gauge_vec, CounterVec, Encoder,
    HistogramVec, IntGaugeVec, TextEncoder,
};

pub struct Metrics {
    pub http_requests_total: CounterVec,
    pub http_request_duration_seconds: HistogramVec,
    pub http_in_flight: IntGaugeVec,

    pub buffer_size: IntGaugeVec,
    pub buffer_dropped: IntGaugeVec,

    pub pipeline_processing_seconds: HistogramVec,
    pub ingest_events_total: CounterVec,

    pub sink_retries_total: CounterVec,
    pub sink_delivered_total: CounterVec,
    pub sink_dropped_total: CounterVec,
}

impl Metrics {
    fn new() -> anyhow::Result<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "logstream_http_requests_total",
                "Total HTTP requests handled by the control plane",
                &["method", "path", "status"]
            )?,
            http_request_duration_seconds: register_histogram_vec!(
                "logstream_http_request_duration_seconds",
                "HTTP request latency",
                &["method", "path", "status"]
            )?,
            http_in_flight: register_int_gauge_vec!(
                "logstream_http_in_flight",
                "In-flight HTTP requests",
                &["method"]
            )?,
            buffer_size: register_int_gauge_vec!(
                "logstream_buffer_size",
                "Current ring buffer occupancy per source",
                &["source"]
            )?,
            buffer_dropped: register_int_gauge_vec!(
                "logstream_buffer_dropped",
                "Cumulative ring buffer drops per source",
                &["source"]
            )?,
            pipeline_processing_seconds: register_histogram_vec!(
                "logstream_pipeline_processing_seconds",
                "End-to-end pipeline processing cost",
                &["pipeline", "route", "source"]
            )?,
            ingest_events_total: register_counter_vec!(
                "logstream_ingest_events_total",
                "Events dispatched by route to a pipeline/destination pair",
                &["source", "route", "destination"]
            )?,
            sink_retries_total: register_counter_vec!(
                "logstream_sink_retries_total",
                "Batch delivery retries per destination",
                &["destination"]
            )?,
            sink_delivered_total: register_counter_vec!(
                "logstream_sink_delivered_total",
                "Batches delivered per destination",
                &["destination"]
            )?,
            sink_dropped_total: register_counter_vec!(
                "logstream_sink_dropped_total",
                "Batches dropped (permanent failure or overflow) per destination",
                &["destination", "reason"]
            )?,
        })
    }
}

static METRICS: Lazy<Metrics> =
    Lazy::new(|| Metrics::new().expect("metrics registration is infallible at startup"));

pub fn metrics() -> &'static Metrics {
    &METRICS
}

/// Render the process-global registry as Prometheus text exposition
/// (`/metrics`). Idempotent and side-effect free on repeated calls.
pub fn render() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buf = Vec::new();
    encoder.encode(&families, &mut buf)?;
    Ok(String::from_utf8(buf)?)
}
