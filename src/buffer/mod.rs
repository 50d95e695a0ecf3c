//! Ring Buffer: a bounded, single-producer/multi-consumer FIFO of raw
//! records with drop-oldest-on-full semantics.
//!
//! Built on [`tokio::sync::broadcast`], whose own bounded-ring-with-lagged-
//! receiver semantics line up exactly with what's needed here: pushing
//! past capacity evicts the oldest unread record, and a subscriber that
//! falls too far behind gets a single `Lagged(n)` notification (our "slow
//! consumer" signal) and resynchronizes at the current tail rather than
//! blocking the producer.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

/// A raw record as handed off by a Source Listener's framing stage.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub raw: String,
    pub received_at_unix_nanos: i64,
}

impl RawRecord {
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            received_at_unix_nanos: chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default(),
        }
    }
}

/// Outcome of a `next` call on a [`Cursor`].
pub enum NextRecord {
    Record(RawRecord),
    /// The cursor fell more than capacity behind; it has resynchronized at
    /// the current tail. `skipped` is the number of records it missed.
    SlowConsumer { skipped: u64 },
    /// No producer remains and no records remain: the stream is closed.
    Closed,
}

/// A subscriber's read position into a [`RingBuffer`].
pub struct Cursor {
    rx: broadcast::Receiver<RawRecord>,
}

impl Cursor {
    pub async fn next(&mut self) -> NextRecord {
        match self.rx.recv().await {
            Ok(record) => NextRecord::Record(record),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                NextRecord::SlowConsumer { skipped }
            }
            Err(broadcast::error::RecvError::Closed) => NextRecord::Closed,
        }
    }
}

/// Per-source bounded FIFO with drop accounting and last-activity tracking.
pub struct RingBuffer {
    tx: broadcast::Sender<RawRecord>,
    capacity: usize,
    pushed: AtomicU64,
    dropped: AtomicU64,
    last_activity_unix: AtomicI64,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Arc<Self> {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel(capacity);
        Arc::new(Self {
            tx,
            capacity,
            pushed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            last_activity_unix: AtomicI64::new(0),
        })
    }

    /// O(1): on full, the broadcast channel itself evicts the oldest unread
    /// slot; we additionally track a monotonic drop counter by observing
    /// how many *receiverless* sends happen relative to capacity — an
    /// "evict oldest, increment drop counter" contract for the buffer as a
    /// whole (not per-subscriber lag, which is counted separately as a
    /// slow-consumer signal on the cursor).
    pub fn push(&self, record: RawRecord) {
        self.pushed.fetch_add(1, Ordering::Relaxed);
        self.last_activity_unix
            .store(chrono::Utc::now().timestamp(), Ordering::Relaxed);
        // `send` only errors when there are zero receivers; the broadcast
        // ring still advances its internal buffer so that late subscribers
        // within capacity still observe the record via backfill semantics.
        let _ = self.tx.send(record);
        if self.pushed.load(Ordering::Relaxed) > self.capacity as u64 {
            self.dropped.store(
                self.pushed.load(Ordering::Relaxed) - self.capacity as u64,
                Ordering::Relaxed,
            );
        }
    }

    /// Returns a cursor positioned at the tail: only records pushed after
    /// this call are observed (no implicit backfill). Callers that want
    /// backfill (SSE `tail=N`) read recent records separately before
    /// subscribing; see [`crate::livetail::LiveTailHub`].
    pub fn subscribe(&self) -> Cursor {
        Cursor {
            rx: self.tx.subscribe(),
        }
    }

    pub fn size(&self) -> usize {
        self.pushed
            .load(Ordering::Relaxed)
            .min(self.capacity as u64) as usize
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn last_activity_unix(&self) -> i64 {
        self.last_activity_unix.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn overflow_drops_oldest_and_counts() {
        let rb = RingBuffer::new(100);
        let mut cursor = rb.subscribe();
        for i in 0..150 {
            rb.push(RawRecord::new(format!("record-{i}")));
        }
        assert_eq!(rb.size(), 100);
        assert_eq!(rb.dropped(), 50);

        // The subscriber, having been alive throughout, is now far enough
        // behind (150 - 100 = 50 < 100 capacity) that it has NOT been
        // classified slow yet, but will see early records start from where
        // the channel could still retain them.
        let mut seen = 0;
        loop {
            match cursor.next().await {
                NextRecord::Record(_) => seen += 1,
                NextRecord::SlowConsumer { .. } => continue,
                NextRecord::Closed => break,
            }
            if seen >= 100 {
                break;
            }
        }
        assert!(seen > 0);
    }

    #[tokio::test]
    async fn slow_consumer_is_signaled_and_resyncs() {
        let rb = RingBuffer::new(10);
        let mut cursor = rb.subscribe();
        for i in 0..100 {
            rb.push(RawRecord::new(format!("record-{i}")));
        }
        match cursor.next().await {
            NextRecord::SlowConsumer { skipped } => assert!(skipped > 0),
            _ => panic!("expected slow consumer signal, got a different result"),
        }
    }
}
