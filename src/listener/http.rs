//! HTTP source listener: POST to a configured path; body is either
//! newline-delimited text, one JSON object, or a JSON array (one record
//! per element); `Content-Encoding: gzip` is transparently decoded.

use std::io::Read;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use tokio::task::JoinHandle;

use crate::error::SourceError;
use crate::model::{SourceKind, SourceSpec};

use super::FrameSink;

#[derive(Clone)]
struct HttpListenerState {
    sink: FrameSink,
}

pub async fn spawn(
    spec: SourceSpec,
    sink: FrameSink,
    stop: Arc<AtomicBool>,
) -> Result<JoinHandle<()>, SourceError> {
    let SourceKind::Http { bind, path } = spec.kind.clone() else {
        unreachable!("http::spawn called with non-http source kind")
    };

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .map_err(|e| SourceError::StartFailed {
            reason: format!("http bind {bind}: {e}"),
        })?;

    let state = HttpListenerState { sink };
    let app = Router::new()
        .route(&path, post(ingest))
        .with_state(state);

    Ok(tokio::spawn(async move {
        let shutdown = async move {
            while !stop.load(std::sync::atomic::Ordering::SeqCst) {
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            }
        };
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await;
    }))
}

async fn ingest(
    State(state): State<HttpListenerState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let decoded = match decode_body(&headers, &body) {
        Ok(bytes) => bytes,
        Err(_) => {
            state.sink.record_framing_error();
            return StatusCode::BAD_REQUEST;
        }
    };

    match split_records(&decoded) {
        Ok(records) => {
            for record in records {
                state.sink.accept(record);
            }
            StatusCode::ACCEPTED
        }
        Err(_) => {
            state.sink.record_framing_error();
            StatusCode::BAD_REQUEST
        }
    }
}

fn decode_body(headers: &HeaderMap, body: &[u8]) -> anyhow::Result<Vec<u8>> {
    let is_gzip = headers
        .get("content-encoding")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("gzip"))
        .unwrap_or(false);

    if !is_gzip {
        return Ok(body.to_vec());
    }

    let mut decoder = flate2::read::GzDecoder::new(body);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// One JSON object -> one record; a JSON array -> one record per element;
/// otherwise treat the body as newline-delimited text.
fn split_records(bytes: &[u8]) -> anyhow::Result<Vec<String>> {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim();

    if trimmed.starts_with('[') {
        let values: Vec<serde_json::Value> = serde_json::from_str(trimmed)?;
        return Ok(values
            .into_iter()
            .map(|v| serde_json::to_string(&v).unwrap_or_default())
            .collect());
    }

    if trimmed.starts_with('{') {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
            return Ok(vec![serde_json::to_string(&value)?]);
        }
    }

    Ok(trimmed
        .lines()
        .filter(|l| !l.is_empty())
        .map(|l| l.to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_json_array_into_one_record_per_element() {
        let records = split_records(br#"[{"a":1},{"a":2}]"#).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn single_json_object_is_one_record() {
        let records = split_records(br#"{"a":1}"#).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn newline_delimited_text_splits_on_lines() {
        let records = split_records(b"line one\nline two\n").unwrap();
        assert_eq!(records, vec!["line one", "line two"]);
    }
}
