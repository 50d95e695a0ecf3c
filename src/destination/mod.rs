//! Destination Batcher: per-destination queue, size/byte/time-triggered
//! batching, bounded concurrency, retry/backoff.

pub mod path_template;
pub mod sink;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use rand::Rng;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::Instant;

use crate::model::{
    CompressionKind, DestinationCounters, DestinationSpec, DestinationStatus, Event,
};
use sink::{Sink, SinkOutcome};

const RETRY_BASE: Duration = Duration::from_secs(1);
const RETRY_CAP: Duration = Duration::from_secs(60);

/// One sealed group of events, ready for serialization and delivery.
struct OpenBatch {
    events: Vec<Event>,
    serialized_bytes: usize,
    opened_at: Instant,
}

impl OpenBatch {
    fn new() -> Self {
        Self {
            events: Vec::new(),
            serialized_bytes: 0,
            opened_at: Instant::now(),
        }
    }

    fn push(&mut self, event: Event) {
        self.serialized_bytes += event.approx_serialized_size();
        self.events.push(event);
    }
}

pub struct Batcher {
    spec: DestinationSpec,
    tx: mpsc::Sender<Event>,
    pub counters: Arc<DestinationCounters>,
    status: arc_swap::ArcSwap<DestinationStatus>,
    _accumulator: tokio::task::JoinHandle<()>,
}

impl Batcher {
    pub fn spawn(spec: DestinationSpec, client: reqwest::Client, sink_timeout: Duration) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(spec.batching.queue_capacity);
        let counters = DestinationCounters::new();
        let sink = Arc::from(sink::build_sink(&spec.kind, client, sink_timeout));

        let accumulator = tokio::spawn(run_accumulator(
            spec.clone(),
            rx,
            Arc::clone(&counters),
            sink,
        ));

        Arc::new(Self {
            spec,
            tx,
            counters,
            status: arc_swap::ArcSwap::from_pointee(DestinationStatus::Connected),
            _accumulator: accumulator,
        })
    }

    /// Non-blocking; on overflow the event is dropped and counted.
    /// Never applies backpressure upstream onto ingest.
    pub fn enqueue(&self, event: Event) {
        match self.tx.try_send(event) {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn status(&self) -> DestinationStatus {
        *self.status.load().as_ref()
    }

    pub fn id(&self) -> &str {
        &self.spec.id
    }
}

async fn run_accumulator(
    spec: DestinationSpec,
    mut rx: mpsc::Receiver<Event>,
    counters: Arc<DestinationCounters>,
    sink: Arc<dyn Sink>,
) {
    let policy = spec.batching.clone();
    let semaphore = Arc::new(Semaphore::new(policy.concurrency.max(1)));
    let flush_interval = Duration::from_secs(policy.flush_interval_seconds.max(1));

    let mut batch = OpenBatch::new();
    let mut deadline = tokio::time::sleep(flush_interval);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            maybe_event = rx.recv() => {
                match maybe_event {
                    Some(event) => {
                        if batch.events.is_empty() {
                            deadline.as_mut().reset(Instant::now() + flush_interval);
                        }
                        batch.push(event);
                        let sealed = batch.events.len() >= policy.max_events
                            || batch.serialized_bytes >= policy.max_bytes;
                        if sealed {
                            let sealed_batch = std::mem::replace(&mut batch, OpenBatch::new());
                            deadline.as_mut().reset(Instant::now() + flush_interval);
                            dispatch(sealed_batch, &spec, Arc::clone(&semaphore), Arc::clone(&counters), Arc::clone(&sink));
                        }
                    }
                    None => {
                        // sender dropped: destination disabled. Drain the
                        // open batch after a grace period, then stop.
                        if !batch.events.is_empty() {
                            tokio::time::sleep(Duration::from_secs(5)).await;
                            dispatch(batch, &spec, Arc::clone(&semaphore), Arc::clone(&counters), Arc::clone(&sink));
                        }
                        return;
                    }
                }
            }
            _ = &mut deadline => {
                if !batch.events.is_empty() {
                    let sealed_batch = std::mem::replace(&mut batch, OpenBatch::new());
                    dispatch(sealed_batch, &spec, Arc::clone(&semaphore), Arc::clone(&counters), Arc::clone(&sink));
                }
                deadline.as_mut().reset(Instant::now() + flush_interval);
            }
        }
    }
}

fn dispatch(
    batch: OpenBatch,
    spec: &DestinationSpec,
    semaphore: Arc<Semaphore>,
    counters: Arc<DestinationCounters>,
    sink: Arc<dyn Sink>,
) {
    let policy = spec.batching.clone();
    let destination_id = spec.id.clone();
    tokio::spawn(async move {
        let _permit = semaphore.acquire_owned().await.ok();
        let sealed_at = chrono::Utc::now();
        let event_count = batch.events.len() as u64;
        let payload = serialize_batch(&batch.events, policy.compression);

        let mut attempt = 0u32;
        loop {
            match sink.deliver(&payload, sealed_at).await {
                SinkOutcome::Delivered => {
                    counters.delivered_batches.fetch_add(1, Ordering::Relaxed);
                    counters
                        .delivered_events
                        .fetch_add(event_count, Ordering::Relaxed);
                    crate::metrics::metrics()
                        .sink_delivered_total
                        .with_label_values(&[&destination_id])
                        .inc();
                    return;
                }
                SinkOutcome::Permanent { reason } => {
                    tracing::warn!(destination = %destination_id, %reason, "batch dropped: permanent sink error");
                    counters.permanent_failures.fetch_add(1, Ordering::Relaxed);
                    crate::metrics::metrics()
                        .sink_dropped_total
                        .with_label_values(&[&destination_id, "permanent"])
                        .inc();
                    return;
                }
                SinkOutcome::Transient { reason, retry_after } => {
                    attempt += 1;
                    if attempt > policy.max_retries {
                        tracing::warn!(destination = %destination_id, %reason, "batch dropped: retries exhausted");
                        counters.permanent_failures.fetch_add(1, Ordering::Relaxed);
                        crate::metrics::metrics()
                            .sink_dropped_total
                            .with_label_values(&[&destination_id, "retries_exhausted"])
                            .inc();
                        return;
                    }
                    counters.retries.fetch_add(1, Ordering::Relaxed);
                    crate::metrics::metrics()
                        .sink_retries_total
                        .with_label_values(&[&destination_id])
                        .inc();
                    let backoff = retry_after.unwrap_or_else(|| backoff_for_attempt(attempt));
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    });
}

/// Exponential backoff starting at 1s, doubling to a 60s cap, jittered
/// ±25%. `retry_after` (e.g. HTTP 429's `Retry-After`) takes precedence
/// over this computed value at the call site.
fn backoff_for_attempt(attempt: u32) -> Duration {
    let exp = RETRY_BASE.saturating_mul(1u32 << (attempt - 1).min(6));
    let capped = exp.min(RETRY_CAP);
    let jitter_frac = rand::thread_rng().gen_range(-0.25..=0.25);
    let jittered_millis = (capped.as_millis() as f64) * (1.0 + jitter_frac);
    Duration::from_millis(jittered_millis.max(0.0) as u64)
}

fn serialize_batch(events: &[Event], compression: CompressionKind) -> Vec<u8> {
    let mut buf = Vec::new();
    for event in events {
        if let Ok(line) = serde_json::to_vec(event) {
            buf.extend_from_slice(&line);
            buf.push(b'\n');
        }
    }
    match compression {
        CompressionKind::None => buf,
        CompressionKind::Gzip => {
            use std::io::Write;
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            let _ = encoder.write_all(&buf);
            encoder.finish().unwrap_or(buf)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps_within_jitter() {
        let b1 = backoff_for_attempt(1);
        assert!(b1.as_millis() >= 750 && b1.as_millis() <= 1250);
        let b_large = backoff_for_attempt(10);
        assert!(b_large.as_secs_f64() <= 75.0);
    }

    #[test]
    fn serialize_batch_preserves_raw() {
        let event = Event::from_raw("hello", crate::model::EventMeta::new("s1"));
        let bytes = serialize_batch(&[event], CompressionKind::None);
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("hello"));
    }
}
