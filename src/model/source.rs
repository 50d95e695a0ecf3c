//! Source entity: identity, kind-specific config, and lifecycle state.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceKind {
    Syslog {
        transport: SyslogTransport,
        bind: String,
        tls: Option<TlsConfig>,
        allowlist: Vec<String>,
    },
    Http {
        bind: String,
        path: String,
    },
    Kafka {
        brokers: Vec<String>,
        topics: Vec<String>,
        group_id: String,
    },
    File {
        path: String,
    },
    WindowsEvent {
        channel: String,
    },
    VendorPoller {
        vendor: String,
        endpoint: String,
        interval_seconds: u64,
    },
    Synthetic {
        events_per_second: u64,
        template: String,
        workers: u32,
        size_bytes: usize,
        compression: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyslogTransport {
    Udp,
    Tcp,
    Tls,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    pub cert_path: String,
    pub key_path: String,
    pub min_version: TlsMinVersion,
    pub require_client_cert: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsMinVersion {
    Tls12,
    Tls13,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSpec {
    pub id: String,
    pub name: String,
    pub kind: SourceKind,
    pub enabled: bool,
    pub ring_buffer_capacity: usize,
}

impl Default for SourceSpec {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            kind: SourceKind::Synthetic {
                events_per_second: 1,
                template: "synthetic event {{n}}".to_string(),
                workers: 1,
                size_bytes: 128,
                compression: false,
            },
            enabled: true,
            ring_buffer_capacity: 10_000,
        }
    }
}

/// Runtime-observable counters for a Source, read by the control plane and
/// the metrics surface. Cheaply cloneable via `Arc`.
#[derive(Debug, Default)]
pub struct SourceCounters {
    pub dropped: AtomicU64,
    pub received: AtomicU64,
    pub framing_errors: AtomicU64,
    pub last_activity_unix: AtomicI64,
}

impl SourceCounters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
        self.last_activity_unix
            .store(chrono::Utc::now().timestamp(), Ordering::Relaxed);
    }

    pub fn record_dropped(&self, n: u64) {
        self.dropped.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_framing_error(&self) {
        self.framing_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn last_activity_unix(&self) -> i64 {
        self.last_activity_unix.load(Ordering::Relaxed)
    }
}
