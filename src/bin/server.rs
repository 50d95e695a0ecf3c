//! Single-binary log streaming pipeline: Source Listeners, Ring Buffers,
//! the Router, Pipeline Engine and Destination Batchers all run in this
//! one process behind the control plane REST API.

use logstream_hub::config::AppConfig;
use logstream_hub::runtime::Runtime;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = logstream_hub::VERSION, "starting log streaming hub");

    let config = AppConfig::load()?;
    std::fs::create_dir_all(&config.data_dir)?;
    let addr = config.http_addr.clone();

    let runtime = Runtime::new(config);
    let app = logstream_hub::api::build_router(runtime.clone());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "control plane listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutdown signal received, draining dataplane");
    runtime.shutdown().await;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
