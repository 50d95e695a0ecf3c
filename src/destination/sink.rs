//! Per-kind sink delivery: one HTTPS POST per batch for the
//! log-analytics-style sinks; one object PUT per batch for the
//! object-store sinks. Vendor-specific signing/provisioning helpers
//! beyond what's needed to deliver a batch are out of scope.

use std::sync::Arc;
use std::time::Duration;

use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tokio::sync::OnceCell;

use crate::model::{DestinationKind, HttpAuth};

use super::path_template::render as render_path;

pub enum SinkOutcome {
    Delivered,
    Transient {
        reason: String,
        retry_after: Option<Duration>,
    },
    Permanent {
        reason: String,
    },
}

/// A sink ships one already-serialized, possibly-compressed batch payload.
#[async_trait::async_trait]
pub trait Sink: Send + Sync {
    async fn deliver(&self, payload: &[u8], sealed_at: DateTime<Utc>) -> SinkOutcome;
}

pub fn build_sink(kind: &DestinationKind, client: reqwest::Client, timeout: Duration) -> Box<dyn Sink> {
    match kind.clone() {
        DestinationKind::Sentinel {
            workspace_id,
            auth,
            log_type,
        } => Box::new(HttpSink {
            client,
            timeout,
            url: format!("https://{workspace_id}.ods.opinsights.azure.com/api/logs"),
            auth,
            extra_header: Some(("Log-Type".to_string(), log_type)),
            signing: SigningScheme::SharedKey,
        }),
        DestinationKind::LogAnalytics { workspace_id, auth } => Box::new(HttpSink {
            client,
            timeout,
            url: format!("https://{workspace_id}.ods.opinsights.azure.com/api/logs"),
            auth,
            extra_header: None,
            signing: SigningScheme::SharedKey,
        }),
        DestinationKind::SplunkHec {
            endpoint,
            auth,
            index: _,
        } => Box::new(HttpSink {
            client,
            timeout,
            url: endpoint,
            auth,
            extra_header: None,
            signing: SigningScheme::Bearer,
        }),
        DestinationKind::Elasticsearch {
            endpoint,
            index,
            auth,
        } => Box::new(HttpSink {
            client,
            timeout,
            url: format!("{endpoint}/{index}/_bulk"),
            auth,
            extra_header: None,
            signing: SigningScheme::Bearer,
        }),
        DestinationKind::S3 {
            bucket,
            region,
            path_template,
        } => Box::new(S3Sink {
            bucket,
            region,
            path_template,
            client: Arc::new(OnceCell::new()),
        }),
        DestinationKind::AzureBlob {
            account,
            container,
            path_template,
            auth,
        } => Box::new(ObjectPutSink {
            client,
            timeout,
            url_base: format!("https://{account}.blob.core.windows.net/{container}"),
            path_template,
            auth,
        }),
        DestinationKind::AzureDataLake {
            account,
            filesystem,
            path_template,
            auth,
        } => Box::new(ObjectPutSink {
            client,
            timeout,
            url_base: format!("https://{account}.dfs.core.windows.net/{filesystem}"),
            path_template,
            auth,
        }),
    }
}

#[derive(Clone, Copy)]
enum SigningScheme {
    SharedKey,
    Bearer,
}

struct HttpSink {
    client: reqwest::Client,
    timeout: Duration,
    url: String,
    auth: HttpAuth,
    extra_header: Option<(String, String)>,
    signing: SigningScheme,
}

#[async_trait::async_trait]
impl Sink for HttpSink {
    async fn deliver(&self, payload: &[u8], _sealed_at: DateTime<Utc>) -> SinkOutcome {
        let mut req = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .header("Content-Type", "application/json");

        if let Some((name, value)) = &self.extra_header {
            req = req.header(name, value);
        }

        match self.signing {
            SigningScheme::SharedKey => {
                if let (Some(key_id), Some(key)) = (&self.auth.shared_key_id, &self.auth.shared_key) {
                    if let Some(signature) = sign_shared_key(key, payload.len()) {
                        req = req.header("Authorization", format!("SharedKey {key_id}:{signature}"));
                    }
                }
            }
            SigningScheme::Bearer => {
                if let Some(token) = &self.auth.bearer_token {
                    req = req.header("Authorization", format!("Bearer {token}"));
                }
            }
        }

        let resp = match req.body(payload.to_vec()).send().await {
            Ok(r) => r,
            Err(e) => {
                return SinkOutcome::Transient {
                    reason: e.to_string(),
                    retry_after: None,
                }
            }
        };

        classify_response(resp).await
    }
}

/// HMAC-SHA256 over a canonicalized request string, matching the
/// shared-key signing scheme's shape; the exact canonical string is
/// sink-documented, so this signs a content-length-bearing canonical
/// form general enough for any of the shared-key sinks built on top of
/// [`HttpSink`].
fn sign_shared_key(key: &str, content_length: usize) -> Option<String> {
    let Ok(key_bytes) = base64::engine::general_purpose::STANDARD.decode(key) else {
        return None;
    };
    let canonical = format!("POST\n{content_length}\napplication/json\nx-ms-date:\n/api/logs");
    let mut mac = Hmac::<Sha256>::new_from_slice(&key_bytes).ok()?;
    mac.update(canonical.as_bytes());
    let signature = mac.finalize().into_bytes();
    Some(base64::engine::general_purpose::STANDARD.encode(signature))
}

/// Delivers batches via `PutObject`. The S3 client is built the same way
/// backup tooling elsewhere in this codebase stands up its client:
/// region-scoped defaults loaded once, then reused for every call. The
/// client is built lazily on first
/// delivery so sink construction itself stays synchronous.
struct S3Sink {
    bucket: String,
    region: String,
    path_template: String,
    client: Arc<OnceCell<S3Client>>,
}

impl S3Sink {
    async fn client(&self) -> &S3Client {
        self.client
            .get_or_init(|| async {
                let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
                    .region(aws_sdk_s3::config::Region::new(self.region.clone()))
                    .load()
                    .await;
                S3Client::new(&aws_config)
            })
            .await
    }
}

#[async_trait::async_trait]
impl Sink for S3Sink {
    async fn deliver(&self, payload: &[u8], sealed_at: DateTime<Utc>) -> SinkOutcome {
        let key = render_path(&self.path_template, sealed_at);
        let client = self.client().await;

        let result = client
            .put_object()
            .bucket(&self.bucket)
            .key(key.trim_start_matches('/'))
            .body(ByteStream::from(payload.to_vec()))
            .send()
            .await;

        match result {
            Ok(_) => SinkOutcome::Delivered,
            Err(err) => {
                let retryable = matches!(
                    err.code(),
                    Some("SlowDown") | Some("ServiceUnavailable") | Some("RequestTimeout")
                ) || err.as_service_error().is_none();
                let reason = err.to_string();
                if retryable {
                    SinkOutcome::Transient {
                        reason,
                        retry_after: None,
                    }
                } else {
                    SinkOutcome::Permanent { reason }
                }
            }
        }
    }
}

struct ObjectPutSink {
    client: reqwest::Client,
    timeout: Duration,
    url_base: String,
    path_template: String,
    auth: HttpAuth,
}

#[async_trait::async_trait]
impl Sink for ObjectPutSink {
    async fn deliver(&self, payload: &[u8], sealed_at: DateTime<Utc>) -> SinkOutcome {
        let path = render_path(&self.path_template, sealed_at);
        let url = format!("{}/{}", self.url_base.trim_end_matches('/'), path.trim_start_matches('/'));

        let mut req = self.client.put(&url).timeout(self.timeout);
        if let Some(token) = &self.auth.bearer_token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }

        let resp = match req.body(payload.to_vec()).send().await {
            Ok(r) => r,
            Err(e) => {
                return SinkOutcome::Transient {
                    reason: e.to_string(),
                    retry_after: None,
                }
            }
        };
        classify_response(resp).await
    }
}

async fn classify_response(resp: reqwest::Response) -> SinkOutcome {
    let status = resp.status();
    if status.is_success() {
        return SinkOutcome::Delivered;
    }

    let retry_after = resp
        .headers()
        .get("Retry-After")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs);

    let code = status.as_u16();
    let body = resp.text().await.unwrap_or_default();

    if status.is_server_error() || code == 408 || code == 429 {
        SinkOutcome::Transient {
            reason: format!("http {code}: {body}"),
            retry_after,
        }
    } else {
        SinkOutcome::Permanent {
            reason: format!("http {code}: {body}"),
        }
    }
}
