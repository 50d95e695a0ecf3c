//! Log streaming hub: a single process that listens for logs on multiple
//! protocols, buffers them per source, evaluates routes against a small
//! predicate language, runs pipelines that normalize and enrich events,
//! and batches the result out to security and storage destinations.
//!
//! The crate is organized around the data plane's pipeline stages:
//!
//! - [`model`] — the shared types every other module passes around:
//!   `Event`, `SourceSpec`, `RouteSpec`, `PipelineSpec`, `DestinationSpec`.
//! - [`listener`] — Source Listeners: syslog (UDP/TCP/TLS), HTTP, Kafka,
//!   file tail, Windows Event Log, vendor pollers and the synthetic
//!   load-test source.
//! - [`buffer`] — the per-source Ring Buffer every listener pushes into.
//! - [`livetail`] — the Live Tail Hub (SSE subscribers and file captures)
//!   fed from the same ring buffer.
//! - [`router`] — route table and predicate evaluation.
//! - [`pipeline`] — the Pipeline Engine and its normalization/enrichment
//!   steps.
//! - [`enrichment`] — the swappable GeoIP/ASN lookup store pipelines read
//!   from.
//! - [`destination`] — the Destination Batcher: accumulation, retry and
//!   delivery to each sink kind.
//! - [`runtime`] — ties the stages above together and performs the
//!   control plane's atomic reconfiguration protocol.
//! - [`api`] — the `/api/v1` REST surface.
//! - [`config`] — process configuration, loaded from the environment.
//! - [`error`] — the error taxonomy each component surfaces through the
//!   control plane.
//! - [`metrics`] — the Prometheus metrics surface.

pub mod api;
pub mod buffer;
pub mod config;
pub mod destination;
pub mod enrichment;
pub mod error;
pub mod listener;
pub mod livetail;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod router;
pub mod runtime;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
