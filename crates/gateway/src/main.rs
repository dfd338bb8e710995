//! ExamFlow API Gateway
//!
//! The main entry point for all external API requests.
//! Handles:
//! - Authentication and authorization
//! - Rate limiting
//! - Paper workflow routing and the change stream
//! - Observability (logging, metrics)

use examflow_common::{
    config::{AppConfig, ObservabilityConfig},
    db::{DbPool, InMemoryPaperStore, PaperStore, Repository},
    metrics,
    storage::FilesystemBlobStore,
};
use examflow_gateway::{create_router, AppState};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    init_tracing(&config.observability);

    info!("Starting ExamFlow API Gateway v{}", examflow_common::VERSION);

    // Initialize metrics
    metrics::register_metrics();
    if config.observability.metrics_port != 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .set_buckets(metrics::LATENCY_BUCKETS)?
            .install()?;
        info!("Prometheus exporter listening on {}", addr);
    }

    // Paper store
    let store: Arc<dyn PaperStore> = if config.uses_memory_store() {
        warn!("Using in-memory paper store; papers are lost on restart");
        Arc::new(InMemoryPaperStore::new())
    } else {
        info!("Connecting to database...");
        let pool = DbPool::new(&config.database).await?;
        pool.ensure_schema().await?;
        Arc::new(Repository::new(pool))
    };

    // Attachment storage
    let blobs = FilesystemBlobStore::new(&config.storage.upload_root);
    blobs.validate().await?;
    info!(root = %config.storage.upload_root, "Attachment storage ready");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let shutdown_timeout = config.shutdown_timeout();
    let state = AppState::new(config, store, Arc::new(blobs))?;

    // Build the router
    let app = create_router(state);

    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let (draining_tx, draining_rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = draining_tx.send(());
    });
    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        result = &mut server => result??,
        _ = draining_rx => {
            // Open change streams never finish on their own
            match tokio::time::timeout(shutdown_timeout, &mut server).await {
                Ok(result) => result??,
                Err(_) => warn!(
                    timeout_secs = shutdown_timeout.as_secs(),
                    "Connections still open after shutdown timeout, closing"
                ),
            }
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.pretty().init();
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
