//! Process-level configuration: listen address, data directory, default TLS
//! policy. Loaded via the `config` crate layered over environment
//! variables, generalized to a full `config::Config` builder since this
//! service carries more knobs than a single `env::var` call per field.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default = "default_http_addr")]
    pub http_addr: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub tls_enabled: bool,
    #[serde(default = "default_tls_min")]
    pub tls_min: String,
    #[serde(default = "default_shutdown_grace_seconds")]
    pub shutdown_grace_seconds: u64,
    #[serde(default = "default_sink_timeout_seconds")]
    pub sink_timeout_seconds: u64,
}

fn default_http_addr() -> String {
    "0.0.0.0:8088".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_tls_min() -> String {
    "tls1.2".to_string()
}

fn default_shutdown_grace_seconds() -> u64 {
    5
}

fn default_sink_timeout_seconds() -> u64 {
    30
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            data_dir: default_data_dir(),
            tls_enabled: false,
            tls_min: default_tls_min(),
            shutdown_grace_seconds: default_shutdown_grace_seconds(),
            sink_timeout_seconds: default_sink_timeout_seconds(),
        }
    }
}

impl AppConfig {
    /// Layers environment variables (prefix `LOGSTREAM_`) over defaults,
    /// using the `config` crate so nested keys and `.env` files (via
    /// `dotenvy`) both work instead of hand-rolled `env::var` calls per
    /// field.
    pub fn load() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let builder = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("LOGSTREAM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        match builder.try_deserialize::<Self>() {
            Ok(cfg) => Ok(cfg),
            // No LOGSTREAM_* vars set at all still deserializes fine since every
            // field has a default, but some `config` versions error on a wholly
            // empty source; fall back explicitly rather than let that surprise
            // callers.
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn sink_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sink_timeout_seconds)
    }

    pub fn shutdown_grace(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.shutdown_grace_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.http_addr, "0.0.0.0:8088");
        assert!(!cfg.tls_enabled);
    }
}
