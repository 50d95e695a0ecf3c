//! End-to-end dataplane scenarios: pipeline normalization through to a
//! batched, retried delivery against a mock HTTP sink. Mirrors the
//! concrete scenarios a syslog-to-Sentinel style route and a flaky sink
//! are expected to produce.

use std::time::Duration;

use logstream_hub::destination::Batcher;
use logstream_hub::model::{
    BatchingPolicy, CompressionKind, DestinationKind, DestinationSpec, Event, EventMeta,
    HttpAuth, PipelineSpec, StepSpec, Value,
};
use logstream_hub::pipeline::{Pipeline, PipelineOutcome, StepContext};
use logstream_hub::enrichment::EnrichmentStore;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn kv_pipeline() -> Pipeline {
    let spec = PipelineSpec {
        id: "p1".into(),
        name: "kv normalize".into(),
        steps: vec![StepSpec {
            kind: "universal_kv".into(),
            config: serde_json::Value::Null,
            strict_mode: false,
        }],
    };
    Pipeline::compile(spec).unwrap()
}

fn step_ctx() -> StepContext {
    StepContext {
        enrichment: EnrichmentStore::empty(),
    }
}

/// Scenario 1 (syslog UDP -> Sentinel): two raw records carrying
/// `severity=critical`/`severity=warning` normalize to the bucketed
/// `critical`/`medium` values and keep `_raw` verbatim.
#[test]
fn universal_kv_normalizes_severity_and_preserves_raw() {
    let pipeline = kv_pipeline();
    let ctx = step_ctx();

    let mut e1 = Event::from_raw(
        "src=10.0.0.1 action=allow severity=critical",
        EventMeta::new("s1"),
    );
    assert!(matches!(pipeline.run(&mut e1, &ctx), PipelineOutcome::Kept));
    assert_eq!(e1.get("severity").unwrap().as_str(), Some("critical"));
    assert_eq!(e1.get("src").unwrap().as_str(), Some("10.0.0.1"));
    assert_eq!(e1.raw(), "src=10.0.0.1 action=allow severity=critical");

    let mut e2 = Event::from_raw(
        "src=10.0.0.2 action=deny severity=warning",
        EventMeta::new("s1"),
    );
    assert!(matches!(pipeline.run(&mut e2, &ctx), PipelineOutcome::Kept));
    assert_eq!(e2.get("severity").unwrap().as_str(), Some("medium"));
    assert_eq!(
        e2.get("_original_severity").unwrap().as_str(),
        Some("warning")
    );
}

/// `universal_kv` run twice over its own output must not change it again:
/// every extracted key is already present, so the second pass is a no-op.
#[test]
fn universal_kv_is_idempotent() {
    let pipeline = kv_pipeline();
    let ctx = step_ctx();

    let mut event = Event::from_raw("src=10.0.0.1 severity=critical", EventMeta::new("s1"));
    pipeline.run(&mut event, &ctx);
    let once: std::collections::BTreeMap<String, Value> = event
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    pipeline.run(&mut event, &ctx);
    let twice: std::collections::BTreeMap<String, Value> = event
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    assert_eq!(once, twice);
}

fn splunk_destination(endpoint: String) -> DestinationSpec {
    DestinationSpec {
        id: "d1".into(),
        name: "mock splunk".into(),
        kind: DestinationKind::SplunkHec {
            endpoint,
            auth: HttpAuth {
                bearer_token: Some("test-token".into()),
                shared_key: None,
                shared_key_id: None,
            },
            index: None,
        },
        enabled: true,
        batching: BatchingPolicy {
            max_events: 2,
            max_bytes: 1_000_000,
            flush_interval_seconds: 60,
            concurrency: 1,
            compression: CompressionKind::None,
            max_retries: 6,
            queue_capacity: 100,
        },
    }
}

/// Scenario 1, destination side: a batch sealed at `maxEvents=2` is
/// delivered as a single POST carrying both events once it trips.
#[tokio::test]
async fn batcher_seals_on_max_events_and_delivers_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let spec = splunk_destination(server.uri());
    let client = reqwest::Client::new();
    let batcher = Batcher::spawn(spec, client, Duration::from_secs(5));

    let mut e1 = Event::from_raw("src=10.0.0.1 action=allow severity=critical", EventMeta::new("s1"));
    e1.insert("severity", Value::Str("critical".into()));
    let mut e2 = Event::from_raw("src=10.0.0.2 action=deny severity=warning", EventMeta::new("s1"));
    e2.insert("severity", Value::Str("medium".into()));

    batcher.enqueue(e1);
    batcher.enqueue(e2);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(batcher.counters.delivered_batches.load(std::sync::atomic::Ordering::Relaxed), 1);
    assert_eq!(batcher.counters.delivered_events.load(std::sync::atomic::Ordering::Relaxed), 2);
}

/// Scenario 5: a 429 with `Retry-After` is retried exactly once, after
/// which a 200 marks the batch delivered and `sink_retries_total` reflects
/// one retry.
#[tokio::test]
async fn batcher_retries_after_429_then_delivers() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(429).insert_header("Retry-After", "1"),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let mut spec = splunk_destination(server.uri());
    spec.batching.max_events = 1;
    let client = reqwest::Client::new();
    let batcher = Batcher::spawn(spec, client, Duration::from_secs(5));

    let event = Event::from_raw("anything", EventMeta::new("s1"));
    let started = std::time::Instant::now();
    batcher.enqueue(event);

    tokio::time::sleep(Duration::from_millis(1800)).await;
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_secs(1));
    assert_eq!(batcher.counters.delivered_batches.load(std::sync::atomic::Ordering::Relaxed), 1);
    assert_eq!(batcher.counters.retries.load(std::sync::atomic::Ordering::Relaxed), 1);
}

/// A non-transient (non-408/429) 4xx drops the batch without retrying and
/// the destination stays enabled.
#[tokio::test]
async fn batcher_drops_on_permanent_client_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&server)
        .await;

    let mut spec = splunk_destination(server.uri());
    spec.batching.max_events = 1;
    let client = reqwest::Client::new();
    let batcher = Batcher::spawn(spec, client, Duration::from_secs(5));

    batcher.enqueue(Event::from_raw("bad record", EventMeta::new("s1")));
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(batcher.counters.permanent_failures.load(std::sync::atomic::Ordering::Relaxed), 1);
    assert_eq!(batcher.counters.delivered_batches.load(std::sync::atomic::Ordering::Relaxed), 0);
}
