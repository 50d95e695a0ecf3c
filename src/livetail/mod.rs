//! Live Tail Hub: fan-out of raw records to SSE subscribers and rolling
//! captures. Subscriber slots are guarded by a short lock; writes copy
//! the record into each slot's bounded mailbox; an overflowing mailbox
//! closes that subscriber rather than blocking the producer.

pub mod capture;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::buffer::RawRecord;
use capture::CaptureWriter;

const SUBSCRIBER_MAILBOX_CAPACITY: usize = 1024;
const BACKFILL_RING_CAPACITY: usize = 1024;

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<RawRecord>,
    limit: Option<usize>,
    delivered: usize,
}

/// Per-source fan-out point. Owned exclusively by that Source.
pub struct LiveTailHub {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<Subscriber>>,
    backfill: Mutex<VecDeque<RawRecord>>,
    captures: Mutex<Vec<Arc<CaptureWriter>>>,
}

impl Default for LiveTailHub {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveTailHub {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            subscribers: Mutex::new(Vec::new()),
            backfill: Mutex::new(VecDeque::with_capacity(BACKFILL_RING_CAPACITY)),
            captures: Mutex::new(Vec::new()),
        }
    }

    /// Tee a record to every live subscriber and capture. Never blocks the
    /// producer: a full subscriber mailbox closes that subscriber instead.
    pub fn publish(&self, record: &RawRecord) {
        {
            let mut backfill = self.backfill.lock();
            if backfill.len() == BACKFILL_RING_CAPACITY {
                backfill.pop_front();
            }
            backfill.push_back(record.clone());
        }

        {
            let mut subs = self.subscribers.lock();
            subs.retain_mut(|sub| match sub.tx.try_send(record.clone()) {
                Ok(()) => {
                    sub.delivered += 1;
                    match sub.limit {
                        Some(limit) if sub.delivered >= limit => false,
                        _ => true,
                    }
                }
                Err(_) => false, // mailbox full or closed: drop the subscriber
            });
        }

        let captures: Vec<_> = self.captures.lock().clone();
        for capture in captures {
            capture.write(record);
        }
    }

    /// Subscribe for SSE delivery. `tail` backfills the last N records
    /// (default 0); `limit`, if set, terminates the stream after that many
    /// deliveries.
    pub fn subscribe(&self, tail: usize, limit: Option<usize>) -> mpsc::Receiver<RawRecord> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_MAILBOX_CAPACITY);

        if tail > 0 {
            let backfill = self.backfill.lock();
            let start = backfill.len().saturating_sub(tail);
            for record in backfill.iter().skip(start) {
                let _ = tx.try_send(record.clone());
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().push(Subscriber {
            id,
            tx,
            limit,
            delivered: 0,
        });
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn add_capture(&self, writer: Arc<CaptureWriter>) {
        self.captures.lock().push(writer);
    }

    pub fn remove_capture(&self, capture_id: &str) {
        self.captures.lock().retain(|c| c.id() != capture_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_delivers_to_active_subscriber() {
        let hub = LiveTailHub::new();
        let mut rx = hub.subscribe(0, None);
        hub.publish(&RawRecord::new("hello"));
        let record = rx.recv().await.unwrap();
        assert_eq!(record.raw, "hello");
    }

    #[tokio::test]
    async fn tail_backfills_recent_records() {
        let hub = LiveTailHub::new();
        for i in 0..5 {
            hub.publish(&RawRecord::new(format!("r{i}")));
        }
        let mut rx = hub.subscribe(3, None);
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(rx.recv().await.unwrap().raw);
        }
        assert_eq!(seen, vec!["r2", "r3", "r4"]);
    }

    #[tokio::test]
    async fn limit_terminates_after_n_deliveries() {
        let hub = LiveTailHub::new();
        let _rx = hub.subscribe(0, Some(2));
        hub.publish(&RawRecord::new("a"));
        hub.publish(&RawRecord::new("b"));
        assert_eq!(hub.subscriber_count(), 0);
        hub.publish(&RawRecord::new("c"));
    }

    #[tokio::test]
    async fn slow_consumer_is_closed_without_blocking_producer() {
        let hub = LiveTailHub::new();
        let _rx = hub.subscribe(0, None); // never drained
        for i in 0..(SUBSCRIBER_MAILBOX_CAPACITY + 10) {
            hub.publish(&RawRecord::new(format!("r{i}")));
        }
        assert_eq!(hub.subscriber_count(), 0);
    }
}
