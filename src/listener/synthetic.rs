//! Synthetic (load-test) source: generates templated events at a target
//! events-per-second across N workers, optionally compressed in transit.
//! Backing implementation for the `/loadtest/*` control-plane endpoints.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::error::SourceError;
use crate::model::{SourceKind, SourceSpec};

use super::{stopped, FrameSink};

/// Live counters surfaced by `/loadtest/status`: produced total and
/// current events-per-second.
#[derive(Default)]
pub struct LoadTestCounters {
    pub produced_total: AtomicU64,
}

pub async fn spawn(
    spec: SourceSpec,
    sink: FrameSink,
    stop: Arc<AtomicBool>,
) -> Result<JoinHandle<()>, SourceError> {
    let SourceKind::Synthetic {
        events_per_second,
        template,
        workers,
        size_bytes,
        compression: _,
    } = spec.kind.clone()
    else {
        unreachable!("synthetic::spawn called with non-synthetic source kind")
    };

    let workers = workers.max(1);
    let per_worker_eps = (events_per_second.max(1) / workers as u64).max(1);

    Ok(tokio::spawn(async move {
        let mut handles = Vec::with_capacity(workers as usize);
        for worker_id in 0..workers {
            let sink = sink.clone();
            let stop = Arc::clone(&stop);
            let template = template.clone();
            handles.push(tokio::spawn(run_worker(
                worker_id,
                per_worker_eps,
                template,
                size_bytes,
                sink,
                stop,
            )));
        }
        for handle in handles {
            let _ = handle.await;
        }
    }))
}

async fn run_worker(
    worker_id: u32,
    events_per_second: u64,
    template: String,
    size_bytes: usize,
    sink: FrameSink,
    stop: Arc<AtomicBool>,
) {
    let interval = Duration::from_secs_f64(1.0 / events_per_second as f64);
    let mut ticker = tokio::time::interval(interval);
    let mut counter: u64 = 0;

    loop {
        if stopped(&stop) {
            return;
        }
        ticker.tick().await;
        counter += 1;
        let body = render_template(&template, worker_id, counter, size_bytes);
        sink.accept(body);
        crate::runtime::loadtest::record_produced(1);
    }
}

/// Renders `{{n}}` (monotonic sequence number) and `{{worker}}` tokens in
/// the template, then pads with filler bytes up to `size_bytes` if the
/// rendered body is shorter.
fn render_template(template: &str, worker_id: u32, n: u64, size_bytes: usize) -> String {
    let mut body = template
        .replace("{{n}}", &n.to_string())
        .replace("{{worker}}", &worker_id.to_string());
    if body.len() < size_bytes {
        let padding = "x".repeat(size_bytes - body.len());
        body.push_str(&padding);
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_substitutes_sequence_and_worker() {
        let rendered = render_template("evt {{n}} from {{worker}}", 2, 7, 0);
        assert_eq!(rendered, "evt 7 from 2");
    }

    #[test]
    fn template_pads_to_requested_size() {
        let rendered = render_template("x", 0, 1, 10);
        assert_eq!(rendered.len(), 10);
    }
}
