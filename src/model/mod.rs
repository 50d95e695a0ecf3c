//! Core data model: Event, Source, Route, Pipeline, Destination, Capture.

pub mod capture;
pub mod destination;
pub mod event;
pub mod pipeline;
pub mod route;
pub mod source;

pub use capture::{CaptureFormat, CaptureInfo};
pub use destination::{
    BatchingPolicy, CompressionKind, DestinationCounters, DestinationKind, DestinationSpec,
    DestinationStatus, HttpAuth,
};
pub use event::{Event, EventMeta, Value};
pub use pipeline::{PipelineCounters, PipelineSpec, StepSpec};
pub use route::{PredicateSpec, RouteSpec};
pub use source::{
    SourceCounters, SourceKind, SourceSpec, SourceState, SyslogTransport, TlsConfig, TlsMinVersion,
};
