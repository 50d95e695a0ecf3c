//! Destination entity: sink identity, kind-specific config, batching policy.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionKind {
    None,
    Gzip,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchingPolicy {
    pub max_events: usize,
    pub max_bytes: usize,
    pub flush_interval_seconds: u64,
    pub concurrency: usize,
    pub compression: CompressionKind,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_max_retries() -> u32 {
    6
}

fn default_queue_capacity() -> usize {
    50_000
}

impl Default for BatchingPolicy {
    fn default() -> Self {
        Self {
            max_events: 500,
            max_bytes: 1_000_000,
            flush_interval_seconds: 10,
            concurrency: 2,
            compression: CompressionKind::None,
            max_retries: default_max_retries(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpAuth {
    #[serde(default)]
    pub bearer_token: Option<String>,
    #[serde(default)]
    pub shared_key: Option<String>,
    #[serde(default)]
    pub shared_key_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DestinationKind {
    Sentinel {
        workspace_id: String,
        auth: HttpAuth,
        log_type: String,
    },
    LogAnalytics {
        workspace_id: String,
        auth: HttpAuth,
    },
    SplunkHec {
        endpoint: String,
        auth: HttpAuth,
        index: Option<String>,
    },
    S3 {
        bucket: String,
        region: String,
        path_template: String,
    },
    AzureBlob {
        account: String,
        container: String,
        path_template: String,
        auth: HttpAuth,
    },
    AzureDataLake {
        account: String,
        filesystem: String,
        path_template: String,
        auth: HttpAuth,
    },
    Elasticsearch {
        endpoint: String,
        index: String,
        auth: HttpAuth,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationSpec {
    pub id: String,
    pub name: String,
    pub kind: DestinationKind,
    pub enabled: bool,
    pub batching: BatchingPolicy,
}

/// Status reported to the UI: among {connected, disconnected, error}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationStatus {
    Connected,
    Disconnected,
    Error,
}

#[derive(Debug, Default)]
pub struct DestinationCounters {
    pub enqueued: std::sync::atomic::AtomicU64,
    pub dropped: std::sync::atomic::AtomicU64,
    pub delivered_batches: std::sync::atomic::AtomicU64,
    pub delivered_events: std::sync::atomic::AtomicU64,
    pub retries: std::sync::atomic::AtomicU64,
    pub permanent_failures: std::sync::atomic::AtomicU64,
}

impl DestinationCounters {
    pub fn new() -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self::default())
    }
}
