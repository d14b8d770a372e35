//! Worker pool: build slots, the progress heartbeat decorator, and the
//! retention sweeper (SPEC_FULL.md §4.4).

pub mod heartbeat;
pub mod http;
pub mod pool;
pub mod sweeper;

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::info;

use crate::ledger::FjallStore;
use crate::observability::Metrics;

/// Handle to a running worker pool: joins all slot tasks and the sweeper
/// task, and exposes a shutdown signal.
pub struct WorkerPool {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `num_slots` build-slot tasks consuming `receivers` and one
    /// sweeper task over `builds_dir`.
    pub fn spawn(
        store: Arc<FjallStore>,
        metrics: Arc<Metrics>,
        mock_build: bool,
        receivers: Vec<mpsc::Receiver<String>>,
        builds_dir: std::path::PathBuf,
        file_retention_hours: u64,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut handles = Vec::with_capacity(receivers.len() + 1);

        for (slot_id, receiver) in receivers.into_iter().enumerate() {
            let store = store.clone();
            let metrics = metrics.clone();
            let shutdown_rx = shutdown_rx.clone();
            handles.push(tokio::spawn(async move {
                pool::run_slot(slot_id, store, metrics, mock_build, receiver, shutdown_rx).await;
            }));
        }

        let sweeper_shutdown = shutdown_rx.clone();
        let sweeper_store = store.clone();
        handles.push(tokio::spawn(async move {
            sweeper::run(sweeper_store, builds_dir, file_retention_hours, sweeper_shutdown).await;
        }));

        info!(num_slots = handles.len() - 1, "worker pool spawned");
        Self {
            shutdown_tx,
            handles,
        }
    }

    /// Signals all slots and the sweeper to stop accepting new work, then
    /// waits for in-flight builds to finish. No timeout is enforced on
    /// shutdown, matching the default policy in SPEC_FULL.md §4.4.
    pub async fn shutdown(self) {
        info!("worker pool shutdown requested, draining in-flight builds");
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
        info!("worker pool shutdown complete");
    }
}
