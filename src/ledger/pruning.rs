//! Job-record retention. Separate from (and much shorter-lived than) the
//! on-disk artifact retention enforced by the worker's sweeper.

use chrono::Utc;
use fjall::{Keyspace, PartitionHandle};
use tracing::info;

use crate::config::{JOB_COMPLETED_TTL_HOURS, JOB_FAILED_TTL_DAYS, JOB_RETENTION_MAX_ENTRIES};
use crate::domain::{Job, JobStatus};

use super::error::Result;
use super::partitions::{decode_job_key, encode_job_key};

#[derive(Debug, Default)]
pub struct PruneStats {
    pub jobs_pruned: usize,
}

/// Remove completed/failed jobs past their TTL, then enforce the combined
/// entry cap by dropping the oldest (by `updated_at`) terminal jobs first.
pub fn prune_expired(
    keyspace: &Keyspace,
    jobs: &PartitionHandle,
    waiting_order: &PartitionHandle,
) -> Result<PruneStats> {
    let now = Utc::now();
    let mut stats = PruneStats::default();

    let mut terminal: Vec<(String, Job)> = Vec::new();
    for item in jobs.iter() {
        let (key, value) = item?;
        let task_id = match decode_job_key(&key) {
            Some(id) => id,
            None => continue,
        };
        let job: Job = serde_json::from_slice(&value)?;
        match job.effective_status() {
            JobStatus::Completed => {
                let age = now - job.updated_at;
                if age.num_hours() >= JOB_COMPLETED_TTL_HOURS {
                    jobs.remove(key)?;
                    stats.jobs_pruned += 1;
                    continue;
                }
                terminal.push((task_id, job));
            }
            JobStatus::Failed => {
                let age = now - job.updated_at;
                if age.num_days() >= JOB_FAILED_TTL_DAYS {
                    jobs.remove(key)?;
                    stats.jobs_pruned += 1;
                    continue;
                }
                terminal.push((task_id, job));
            }
            JobStatus::Waiting | JobStatus::Active => {}
        }
    }

    if terminal.len() > JOB_RETENTION_MAX_ENTRIES {
        terminal.sort_by_key(|(_, job)| job.updated_at);
        let overflow = terminal.len() - JOB_RETENTION_MAX_ENTRIES;
        for (task_id, _) in terminal.into_iter().take(overflow) {
            jobs.remove(encode_job_key(&task_id))?;
            stats.jobs_pruned += 1;
        }
    }

    // waiting_order entries for jobs no longer waiting are cleared lazily by
    // the broker when it dequeues; nothing terminal should remain there, but
    // a defensive sweep keeps a crashed broker from leaking entries forever.
    let mut stale_waiting_keys = Vec::new();
    for item in waiting_order.iter() {
        let (key, value) = item?;
        let task_id = String::from_utf8_lossy(&value).to_string();
        if jobs.get(task_id.as_bytes())?.is_none() {
            stale_waiting_keys.push(key);
        }
    }
    for key in stale_waiting_keys {
        waiting_order.remove(key)?;
    }

    keyspace.persist(fjall::PersistMode::SyncAll)?;
    info!("job pruning complete: {:?}", stats);
    Ok(stats)
}
