//! Source Listener: transport-specific framing of bytes into raw event
//! records, handed off to the Ring Buffer with never-blocking semantics.

pub mod file_tail;
pub mod http;
pub mod kafka;
pub mod syslog;
pub mod synthetic;
pub mod vendor_poller;
pub mod windows_event;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::buffer::{RawRecord, RingBuffer};
use crate::error::SourceError;
use crate::livetail::LiveTailHub;
use crate::model::{SourceCounters, SourceKind, SourceSpec, SourceState};

/// A running Source: its buffer, live-tail hub, counters, and the
/// listener task(s) feeding them. Exclusively owns its Ring Buffer and
/// Live Tail Hub. Nothing else holds a reference to either, so dropping
/// the `RunningSource` is enough to tear down both.
pub struct RunningSource {
    pub spec: SourceSpec,
    pub buffer: Arc<RingBuffer>,
    pub hub: Arc<LiveTailHub>,
    pub counters: Arc<SourceCounters>,
    state: parking_lot::RwLock<SourceState>,
    stop: Arc<AtomicBool>,
    handle: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl RunningSource {
    pub fn state(&self) -> SourceState {
        *self.state.read()
    }

    fn set_state(&self, state: SourceState) {
        *self.state.write() = state;
    }

    /// Start the transport-specific listener task. Only a `running`
    /// listener accepts bytes.
    pub async fn start(spec: SourceSpec) -> Result<Arc<Self>, SourceError> {
        let buffer = RingBuffer::new(spec.ring_buffer_capacity);
        let hub = Arc::new(LiveTailHub::new());
        let counters = SourceCounters::new();
        let stop = Arc::new(AtomicBool::new(false));

        let source = Arc::new(Self {
            spec: spec.clone(),
            buffer: Arc::clone(&buffer),
            hub: Arc::clone(&hub),
            counters: Arc::clone(&counters),
            state: parking_lot::RwLock::new(SourceState::Starting),
            stop: Arc::clone(&stop),
            handle: parking_lot::Mutex::new(None),
        });

        if !spec.enabled {
            source.set_state(SourceState::Stopped);
            return Ok(source);
        }

        let sink = FrameSink {
            buffer,
            hub,
            counters: Arc::clone(&counters),
        };

        let handle = match &spec.kind {
            SourceKind::Syslog { .. } => syslog::spawn(spec.clone(), sink, Arc::clone(&stop)).await?,
            SourceKind::Http { .. } => http::spawn(spec.clone(), sink, Arc::clone(&stop)).await?,
            SourceKind::Kafka { .. } => kafka::spawn(spec.clone(), sink, Arc::clone(&stop)).await?,
            SourceKind::File { .. } => file_tail::spawn(spec.clone(), sink, Arc::clone(&stop)).await?,
            SourceKind::WindowsEvent { .. } => {
                windows_event::spawn(spec.clone(), sink, Arc::clone(&stop)).await?
            }
            SourceKind::VendorPoller { .. } => {
                vendor_poller::spawn(spec.clone(), sink, Arc::clone(&stop)).await?
            }
            SourceKind::Synthetic { .. } => {
                synthetic::spawn(spec.clone(), sink, Arc::clone(&stop)).await?
            }
        };

        *source.handle.lock() = Some(handle);
        source.set_state(SourceState::Running);
        Ok(source)
    }

    /// Signal the listener task to stop and await its exit. Once stopped,
    /// no new records enter the ring buffer.
    pub async fn stop(&self) {
        self.set_state(SourceState::Stopping);
        self.stop.store(true, Ordering::SeqCst);
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.set_state(SourceState::Stopped);
    }
}

/// Handed to each transport's listener task: where framed records go.
/// Push is wait-free; publishing to the live-tail hub is likewise
/// non-blocking by construction.
#[derive(Clone)]
pub struct FrameSink {
    buffer: Arc<RingBuffer>,
    hub: Arc<LiveTailHub>,
    counters: Arc<SourceCounters>,
}

impl FrameSink {
    pub fn accept(&self, raw: impl Into<String>) {
        let record = RawRecord::new(raw);
        self.counters.record_received();
        self.hub.publish(&record);
        self.buffer.push(record);
    }

    pub fn record_framing_error(&self) {
        self.counters.record_framing_error();
    }
}

pub(crate) fn stopped(stop: &Arc<AtomicBool>) -> bool {
    stop.load(Ordering::SeqCst)
}
