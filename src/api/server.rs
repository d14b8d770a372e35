use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use tokio::net::TcpListener;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::{services, state::AppState};
use crate::config::{Config, StorageProvider};
use crate::ledger::FjallStore;
use crate::observability::Metrics;
use crate::queue::TaskBroker;
use crate::storage::StorageClient;
use crate::worker::WorkerPool;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

const SLOT_CHANNEL_SIZE: usize = 16;

/// Builds the router for a given [`AppState`]. Split out from [`run`] so
/// integration tests can mount it over an in-memory storage backend without
/// binding a real socket.
pub fn router(state: AppState) -> Router {
    let max_body = state.config.storage.max_file_size.as_u64() as usize;
    let downloads_dir = ServeDir::new(&state.config.storage.builds_dir);

    Router::new()
        .route("/health", get(services::health))
        .route("/api", get(services::service_metadata))
        .route("/api/build/html", post(services::submit_html))
        .route("/api/build/zip", post(services::submit_zip))
        .route("/api/build/{taskId}/status", get(services::get_status))
        .route("/api/build/{taskId}/download", get(services::download))
        .route("/api/build/{taskId}", delete(services::delete_job))
        .nest_service("/downloads", downloads_dir)
        .layer(DefaultBodyLimit::max(max_body))
        .layer(RequestDecompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Loads configuration, opens the ledger and storage backends, spawns the
/// worker pool, and serves the HTTP API until shutdown. The API and worker
/// pool run as tasks of one process sharing one embedded Fjall keyspace.
pub async fn run() -> Result<(), AnyError> {
    info!("Loading configuration");
    let config = Config::load().map_err(|e| format!("Failed to load config: {e}"))?;

    std::fs::create_dir_all(&config.storage.builds_dir)?;
    std::fs::create_dir_all(&config.storage.uploads_dir)?;

    info!(path = %config.storage.queue_path.display(), "Opening Fjall store");
    let store = Arc::new(
        FjallStore::open(&config.storage.queue_path)
            .map_err(|e| format!("Failed to open Fjall store: {e}"))?,
    );

    let storage = match config.storage.provider {
        StorageProvider::Local => StorageClient::local(&config.storage.builds_dir)?,
        StorageProvider::Memory => StorageClient::in_memory(),
    };

    let metrics = Arc::new(Metrics::new());

    let (broker, receivers) =
        TaskBroker::new(store.clone(), config.worker.concurrency, SLOT_CHANNEL_SIZE);
    let broker = Arc::new(broker);

    let pool = WorkerPool::spawn(
        store.clone(),
        metrics.clone(),
        config.build.mock_build,
        receivers,
        config.storage.builds_dir.clone(),
        config.retention.file_retention_hours,
    );

    let bind_addr = config.server.bind_addr();
    let state = AppState::new(config, store, storage, broker, metrics);
    let app = router(state);

    let listener = TcpListener::bind(bind_addr).await?;
    info!(%bind_addr, "demo2apk API listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    pool.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())
            .expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
