//! Request Coordinator admin server
//!
//! Serves the cache and rate limiter over HTTP for dashboards and sidecar
//! deployments.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use request_coordinator::api::{create_router, AppState};
use request_coordinator::clock::SystemClock;
use request_coordinator::storage::MemoryKvStore;
use request_coordinator::{spawn_cleanup_task, Config};

/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create cache store and rate limiter over one key-value store
/// 4. Start background rate window cleanup task
/// 5. Serve the admin router until SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "request_coordinator=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Request Coordinator");

    let config = Config::from_env();
    info!(
        "Configuration loaded: cache_max_entries={}, cache_default_ttl={}s, eviction={:?}, port={}, cleanup_interval={}s",
        config.cache_max_entries,
        config.cache_default_ttl,
        config.cache_eviction,
        config.server_port,
        config.rate_limit_cleanup_interval
    );

    let state = AppState::from_config(&config, Arc::new(MemoryKvStore::new()), Arc::new(SystemClock));
    info!("Cache store and rate limiter initialized");

    let cleanup_handle = spawn_cleanup_task(state.limiter.clone(), config.cleanup_interval());
    info!("Background cleanup task started");

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cleanup_handle))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for Ctrl+C or SIGTERM, then aborts the cleanup task.
async fn shutdown_signal(cleanup_handle: tokio::task::JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    cleanup_handle.abort();
    warn!("Cleanup task aborted");
}
