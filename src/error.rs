//! Error taxonomy for the dataplane and control plane.
//!
//! Mirrors the error classes in the design: most are counted and logged at
//! the component boundary and never propagate into unrelated components.
//! Only `ConfigInvalid` and fatal startup failures reach the control plane
//! as hard errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors a Source Listener can raise while starting a transport.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source start failed: {reason}")]
    StartFailed { reason: String },
    #[error("source {0} not found")]
    NotFound(String),
    #[error("source {0} already exists")]
    AlreadyExists(String),
    #[error("invalid source config: {0}")]
    ConfigInvalid(String),
}

/// Runtime framing errors: counted, never fatal.
#[derive(Debug, Error)]
pub enum FramingError {
    #[error("frame too large: {0} bytes")]
    TooLarge(usize),
    #[error("malformed frame: {0}")]
    Malformed(String),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Router-level errors.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("predicate compile error: {0}")]
    PredicateCompile(String),
    #[error("predicate runtime error: {0}")]
    PredicateRuntime(String),
    #[error("route {0} not found")]
    NotFound(String),
}

/// Pipeline engine errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("transform error in step {step}: {reason}")]
    Transform { step: String, reason: String },
    #[error("pipeline {0} not found")]
    NotFound(String),
    #[error("invalid step config: {0}")]
    ConfigInvalid(String),
}

/// Destination / batcher errors.
#[derive(Debug, Error)]
pub enum DestinationError {
    #[error("destination {0} not found")]
    NotFound(String),
    #[error("invalid destination config: {0}")]
    ConfigInvalid(String),
    #[error("sink transient error: {0}")]
    SinkTransient(String),
    #[error("sink permanent error: {0}")]
    SinkPermanent(String),
}

/// Top-level control-plane API error, rendered as a `text/plain` body with
/// a human-readable reason.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

impl From<SourceError> for ApiError {
    fn from(e: SourceError) -> Self {
        match e {
            SourceError::NotFound(_) => ApiError::NotFound(e.to_string()),
            SourceError::AlreadyExists(_) => ApiError::Conflict(e.to_string()),
            SourceError::ConfigInvalid(_) => ApiError::BadRequest(e.to_string()),
            SourceError::StartFailed { .. } => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<RouterError> for ApiError {
    fn from(e: RouterError) -> Self {
        match e {
            RouterError::NotFound(_) => ApiError::NotFound(e.to_string()),
            RouterError::PredicateCompile(_) => ApiError::BadRequest(e.to_string()),
            RouterError::PredicateRuntime(_) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::NotFound(_) => ApiError::NotFound(e.to_string()),
            PipelineError::ConfigInvalid(_) => ApiError::BadRequest(e.to_string()),
            PipelineError::Transform { .. } => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<DestinationError> for ApiError {
    fn from(e: DestinationError) -> Self {
        match e {
            DestinationError::NotFound(_) => ApiError::NotFound(e.to_string()),
            DestinationError::ConfigInvalid(_) => ApiError::BadRequest(e.to_string()),
            DestinationError::SinkTransient(_) | DestinationError::SinkPermanent(_) => {
                ApiError::Internal(e.to_string())
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e.to_string())
    }
}
