//! Periodic file-retention sweeper (SPEC_FULL.md §4.4): reclaims expired
//! entries under the builds root and expired job records in the ledger, at
//! startup and every 30 minutes after.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::watch;
use tracing::{info, warn};

use crate::ledger::FjallStore;

const SWEEP_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Runs one sweep immediately, then repeats every [`SWEEP_INTERVAL`] until
/// `shutdown` is signaled. Each sweep reclaims both expired on-disk artifacts
/// and expired job records (SPEC_FULL.md's queue-retention rule).
pub async fn run(
    store: Arc<FjallStore>,
    builds_dir: impl AsRef<Path>,
    retention_hours: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    let builds_dir = builds_dir.as_ref();
    sweep_once(builds_dir, retention_hours);
    prune_ledger_once(&store);

    let mut interval = tokio::time::interval(SWEEP_INTERVAL);
    interval.tick().await; // first tick completes instantly

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("sweeper shutting down");
                    break;
                }
            }
            _ = interval.tick() => {
                sweep_once(builds_dir, retention_hours);
                prune_ledger_once(&store);
            }
        }
    }
}

/// Prunes completed/failed job records past the ledger's retention window
/// and enforces its entry cap. Logs and continues on failure.
fn prune_ledger_once(store: &FjallStore) {
    match store.prune_expired() {
        Ok(stats) => {
            if stats.jobs_pruned > 0 {
                info!(
                    jobs_pruned = stats.jobs_pruned,
                    "sweeper pruned expired job records"
                );
            }
        }
        Err(err) => warn!(error = %err, "sweeper failed to prune job records"),
    }
}

/// Scans `builds_dir`'s direct children, removing (file) or recursively
/// deleting (directory) each entry whose mtime is older than
/// `retention_hours`. An individual entry's failure is logged and skipped.
pub fn sweep_once(builds_dir: &Path, retention_hours: u64) -> usize {
    let Ok(entries) = std::fs::read_dir(builds_dir) else {
        warn!(dir = %builds_dir.display(), "sweeper could not read builds directory");
        return 0;
    };

    let retention = Duration::from_secs(retention_hours * 3600);
    let now = SystemTime::now();
    let mut removed = 0;

    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        let age = match entry.metadata().and_then(|m| m.modified()) {
            Ok(modified) => now.duration_since(modified).unwrap_or(Duration::ZERO),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "sweeper could not read mtime, skipping");
                continue;
            }
        };

        if age < retention {
            continue;
        }

        let result = if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };

        match result {
            Ok(()) => {
                removed += 1;
                info!(path = %path.display(), age_secs = age.as_secs(), "sweeper removed expired entry");
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "sweeper failed to remove entry, skipping");
            }
        }
    }

    removed
}
