//! Worker pool: N build slots consuming the shared queue (SPEC_FULL.md §4.4).

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::domain::{JobResult, ProgressSink};
use crate::ledger::FjallStore;
use crate::observability::Metrics;
use crate::pipeline;

/// Writes progress straight into the ledger for one job. Cheap to construct
/// per build; the ledger itself enforces the monotonic-percent guarantee.
struct LedgerProgressSink {
    store: Arc<FjallStore>,
    task_id: String,
}

impl ProgressSink for LedgerProgressSink {
    fn report(&self, message: &str, percent: u8) {
        let progress = crate::domain::Progress {
            message: message.to_string(),
            percent,
        };
        if let Err(err) = self.store.update_progress(&self.task_id, progress) {
            warn!(task_id = %self.task_id, error = %err, "failed to persist progress update");
        }
    }
}

/// One build slot: pulls taskIds from its channel (falling back to a poll
/// of the durable waiting set when idle), runs one build at a time.
pub async fn run_slot(
    slot_id: usize,
    store: Arc<FjallStore>,
    metrics: Arc<Metrics>,
    mock_build: bool,
    mut receiver: mpsc::Receiver<String>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(slot_id, "worker slot starting");
    let mut poll_interval = tokio::time::interval(std::time::Duration::from_secs(2));

    loop {
        let task_id = tokio::select! {
            biased;
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!(slot_id, "worker slot shutting down, no new builds will start");
                    break;
                }
                continue;
            }
            received = receiver.recv() => match received {
                Some(id) => Some(id),
                None => {
                    // Channel closed: keep polling the durable store, since
                    // dispatch and durability are decoupled (queue::TaskBroker).
                    None
                }
            },
            _ = poll_interval.tick() => {
                store.next_waiting_task_id().unwrap_or_else(|err| {
                    warn!(slot_id, error = %err, "poll of durable waiting set failed");
                    None
                })
            }
        };

        let Some(task_id) = task_id else {
            continue;
        };

        run_one_build(slot_id, &store, &metrics, mock_build, &task_id).await;
    }
}

async fn run_one_build(
    slot_id: usize,
    store: &Arc<FjallStore>,
    metrics: &Arc<Metrics>,
    mock_build: bool,
    task_id: &str,
) {
    let job = match store.mark_active(task_id) {
        Ok(job) => job,
        Err(err) => {
            // Another slot already claimed it, or it's no longer waiting
            // (e.g. the client cancelled it); this is expected, not an error.
            warn!(slot_id, task_id, error = %err, "could not claim job, skipping");
            return;
        }
    };

    info!(
        slot_id,
        task_id,
        app_name = %job.task.app_name,
        kind = job.task.kind.as_str(),
        "build started"
    );
    metrics.build_started();

    let sink = LedgerProgressSink {
        store: store.clone(),
        task_id: task_id.to_string(),
    };

    let started = Instant::now();
    let result = pipeline::run(&job.task, mock_build, &sink).await;
    let duration_ms = started.elapsed().as_millis() as u64;

    let job_result = match result {
        Ok(artifact_path) => JobResult {
            success: true,
            apk_path: Some(artifact_path.display().to_string()),
            error: None,
            duration_ms,
        },
        Err(err) => {
            error!(slot_id, task_id, error = %err, "build failed");
            JobResult {
                success: false,
                apk_path: None,
                error: Some(err.to_string()),
                duration_ms,
            }
        }
    };

    let succeeded = job_result.success;
    if let Err(err) = store.complete(task_id, job_result) {
        error!(slot_id, task_id, error = %err, "failed to persist build result");
    }

    metrics.build_finished();
    if succeeded {
        metrics.job_completed();
    } else {
        metrics.job_failed();
    }
}
