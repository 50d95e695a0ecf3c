//! Load-test registry: tracks the single synthetic Source a running load
//! test provisions, so `/loadtest/status` can report produced-total and
//! current EPS and `/loadtest/stop` knows which source to remove.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

const SYNTHETIC_SOURCE_ID: &str = "__loadtest";

#[derive(Default)]
pub struct LoadTestRegistry {
    active: Mutex<Option<ActiveLoadTest>>,
}

struct ActiveLoadTest {
    source_id: String,
    events_per_second: u64,
    started_at: std::time::Instant,
}

#[derive(Debug, Serialize)]
pub struct LoadTestStatus {
    pub running: bool,
    pub source_id: Option<String>,
    pub events_per_second: Option<u64>,
    pub produced_total: u64,
    pub current_eps: f64,
}

impl LoadTestRegistry {
    pub fn source_id() -> &'static str {
        SYNTHETIC_SOURCE_ID
    }

    pub fn mark_started(&self, events_per_second: u64) {
        *self.active.lock() = Some(ActiveLoadTest {
            source_id: SYNTHETIC_SOURCE_ID.to_string(),
            events_per_second,
            started_at: std::time::Instant::now(),
        });
    }

    pub fn mark_stopped(&self) {
        *self.active.lock() = None;
    }

    pub fn is_running(&self) -> bool {
        self.active.lock().is_some()
    }

    pub fn status(&self, produced_total: u64) -> LoadTestStatus {
        let active = self.active.lock();
        match active.as_ref() {
            Some(a) => {
                let elapsed = a.started_at.elapsed().as_secs_f64().max(0.001);
                LoadTestStatus {
                    running: true,
                    source_id: Some(a.source_id.clone()),
                    events_per_second: Some(a.events_per_second),
                    produced_total,
                    current_eps: produced_total as f64 / elapsed,
                }
            }
            None => LoadTestStatus {
                running: false,
                source_id: None,
                events_per_second: None,
                produced_total: 0,
                current_eps: 0.0,
            },
        }
    }
}

/// Shared atomic counter a synthetic source's workers increment; surfaced
/// through `/loadtest/status` as `produced_total`. Kept process-global per
/// source id since only one load test may be active at a time.
pub static PRODUCED_TOTAL: AtomicU64 = AtomicU64::new(0);

pub fn reset_counters() {
    PRODUCED_TOTAL.store(0, Ordering::Relaxed);
}

pub fn record_produced(n: u64) {
    PRODUCED_TOTAL.fetch_add(n, Ordering::Relaxed);
}

pub fn produced_total() -> u64 {
    PRODUCED_TOTAL.load(Ordering::Relaxed)
}

pub type SharedLoadTest = Arc<LoadTestRegistry>;
