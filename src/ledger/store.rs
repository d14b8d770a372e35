use std::path::Path;

use chrono::Utc;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::{Job, JobResult, JobStatus, Progress, Task};

use super::error::{LedgerError, Result};
use super::partitions::{
    decode_waiting_key, encode_job_key, encode_meta_key, encode_rate_limit_key,
    encode_waiting_key, META_SEQ_COUNTER,
};
use super::pruning::{prune_expired, PruneStats};

/// Bounded scan window for `queue_position`/`queue_total` (SPEC_FULL.md §4.1).
const QUEUE_SCAN_LIMIT: usize = 100;

/// Fjall-backed persistence for job records and rate-limit counters.
///
/// `jobId == taskId` always, so the `jobs` partition alone serves the
/// idempotent-admission duty a separate idempotency partition would
/// otherwise handle.
#[derive(Clone)]
pub struct FjallStore {
    keyspace: Keyspace,
    jobs: PartitionHandle,
    waiting_order: PartitionHandle,
    rate_limits: PartitionHandle,
    meta: PartitionHandle,
}

impl FjallStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("opening ledger store at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let jobs = keyspace.open_partition("jobs", PartitionCreateOptions::default())?;
        let waiting_order =
            keyspace.open_partition("waiting_order", PartitionCreateOptions::default())?;
        let rate_limits =
            keyspace.open_partition("rate_limits", PartitionCreateOptions::default())?;
        let meta = keyspace.open_partition("meta", PartitionCreateOptions::default())?;

        Ok(Self {
            keyspace,
            jobs,
            waiting_order,
            rate_limits,
            meta,
        })
    }

    fn next_seq(&self) -> Result<u64> {
        let key = encode_meta_key(META_SEQ_COUNTER);
        let next = match self.meta.get(&key)? {
            Some(bytes) => {
                let current: u64 = std::str::from_utf8(&bytes)
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(0);
                current + 1
            }
            None => 1,
        };
        self.meta.insert(key, next.to_string().as_bytes())?;
        Ok(next)
    }

    /// Admits a new task. Rejects a re-admission of the same taskId, which
    /// in practice cannot happen given random 12-char tokens but is
    /// enforced anyway so "at-most-one execution per task identifier" holds
    /// even under a pathological client retry.
    pub fn enqueue(&self, task: Task) -> Result<Job> {
        let task_id = task.task_id.clone();
        if self.jobs.get(encode_job_key(&task_id))?.is_some() {
            return Err(LedgerError::AlreadyExists(task_id));
        }

        let seq = self.next_seq()?;
        let job = Job::new(task, seq);

        self.jobs
            .insert(encode_job_key(&task_id), serde_json::to_vec(&job)?)?;
        self.waiting_order
            .insert(encode_waiting_key(seq), task_id.as_bytes())?;

        debug!(task_id = %task_id, seq, "enqueued job");
        Ok(job)
    }

    pub fn get(&self, task_id: &str) -> Result<Option<Job>> {
        match self.jobs.get(encode_job_key(task_id))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    fn load(&self, task_id: &str) -> Result<Job> {
        self.get(task_id)?
            .ok_or_else(|| LedgerError::JobNotFound(task_id.to_string()))
    }

    fn save(&self, job: &Job) -> Result<()> {
        self.jobs
            .insert(encode_job_key(job.task_id()), serde_json::to_vec(job)?)?;
        Ok(())
    }

    /// Atomically claims a waiting job for execution by a worker slot.
    pub fn mark_active(&self, task_id: &str) -> Result<Job> {
        let mut job = self.load(task_id)?;
        if job.status != JobStatus::Waiting {
            return Err(LedgerError::NotWaiting(task_id.to_string()));
        }
        job.status = JobStatus::Active;
        job.updated_at = Utc::now();
        self.save(&job)?;
        self.waiting_order.remove(encode_waiting_key(job.seq))?;
        debug!(task_id = %task_id, "marked active");
        Ok(job)
    }

    /// Updates progress without a state transition. `percent` is clamped to
    /// never regress, matching the status surface's monotonic guarantee.
    pub fn update_progress(&self, task_id: &str, progress: Progress) -> Result<()> {
        let mut job = self.load(task_id)?;
        if job.status != JobStatus::Active {
            return Err(LedgerError::NotActive(task_id.to_string()));
        }
        let percent = progress.percent.max(job.progress.percent);
        job.progress = Progress {
            message: progress.message,
            percent,
        };
        job.updated_at = Utc::now();
        self.save(&job)
    }

    /// Terminal transition: the pipeline ran to completion (successfully or
    /// not) and produced a result payload.
    pub fn complete(&self, task_id: &str, result: JobResult) -> Result<Job> {
        let mut job = self.load(task_id)?;
        if job.status != JobStatus::Active {
            return Err(LedgerError::NotActive(task_id.to_string()));
        }
        job.status = JobStatus::Completed;
        job.progress.percent = 100;
        job.result = Some(result);
        job.updated_at = Utc::now();
        self.save(&job)?;
        Ok(job)
    }

    /// Terminal transition for a worker-level failure that never produced a
    /// full result (panic, process crash, toolchain missing).
    pub fn mark_failed(&self, task_id: &str, error: String) -> Result<Job> {
        let mut job = self.load(task_id)?;
        if job.status != JobStatus::Active {
            return Err(LedgerError::NotActive(task_id.to_string()));
        }
        job.status = JobStatus::Failed;
        job.result = Some(JobResult {
            success: false,
            apk_path: None,
            error: Some(error),
            duration_ms: (Utc::now() - job.created_at).num_milliseconds().max(0) as u64,
        });
        job.updated_at = Utc::now();
        self.save(&job)?;
        Ok(job)
    }

    /// DELETE semantics: removes a waiting, completed, or failed job.
    /// Rejects an active job.
    pub fn remove(&self, task_id: &str) -> Result<()> {
        let job = self.load(task_id)?;
        if job.status == JobStatus::Active {
            return Err(LedgerError::ActiveJobNotRemovable(task_id.to_string()));
        }
        if job.status == JobStatus::Waiting {
            self.waiting_order.remove(encode_waiting_key(job.seq))?;
        }
        self.jobs.remove(encode_job_key(task_id))?;
        Ok(())
    }

    /// 1-based position within the first 100 waiting jobs (FIFO order), or
    /// `None` if the job isn't waiting or falls outside the scan bound.
    pub fn queue_position(&self, task_id: &str) -> Result<Option<usize>> {
        for (index, item) in self.waiting_order.iter().enumerate() {
            if index >= QUEUE_SCAN_LIMIT {
                break;
            }
            let (key, value) = item?;
            let _seq = decode_waiting_key(&key);
            let id = String::from_utf8_lossy(&value);
            if id == task_id {
                return Ok(Some(index + 1));
            }
        }
        Ok(None)
    }

    /// Earliest waiting job's taskId, if any. Used by a worker slot's poll
    /// loop to recover durable work after a restart or a dispatch that
    /// landed on a closed channel.
    pub fn next_waiting_task_id(&self) -> Result<Option<String>> {
        match self.waiting_order.iter().next() {
            Some(item) => {
                let (_, value) = item?;
                Ok(Some(String::from_utf8_lossy(&value).to_string()))
            }
            None => Ok(None),
        }
    }

    /// Count of waiting + active jobs across the whole partition.
    pub fn queue_total(&self) -> Result<usize> {
        let mut total = 0;
        for item in self.jobs.iter() {
            let (_, value) = item?;
            let job: Job = serde_json::from_slice(&value)?;
            if matches!(job.status, JobStatus::Waiting | JobStatus::Active) {
                total += 1;
            }
        }
        Ok(total)
    }

    /// Fixed-window rate limiting, keyed per client (IP or bearer subject),
    /// persisted so the limit survives a process restart within the window.
    pub fn check_and_increment(
        &self,
        client_id: &str,
        max: u32,
        window_secs: u64,
    ) -> Result<RateLimitDecision> {
        let now = Utc::now().timestamp();
        let key = encode_rate_limit_key(client_id);

        let mut bucket = match self.rate_limits.get(&key)? {
            Some(bytes) => serde_json::from_slice::<RateLimitBucket>(&bytes)?,
            None => RateLimitBucket {
                window_start: now,
                count: 0,
            },
        };

        let window_secs_i64 = window_secs as i64;
        if now - bucket.window_start >= window_secs_i64 {
            bucket.window_start = now;
            bucket.count = 0;
        }

        bucket.count += 1;
        let allowed = bucket.count <= max;
        let retry_after_secs = if allowed {
            0
        } else {
            (bucket.window_start + window_secs_i64 - now).max(0) as u64
        };

        self.rate_limits
            .insert(key, serde_json::to_vec(&bucket)?)?;

        Ok(RateLimitDecision {
            allowed,
            retry_after_secs,
        })
    }

    pub fn prune_expired(&self) -> Result<PruneStats> {
        prune_expired(&self.keyspace, &self.jobs, &self.waiting_order)
    }

    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let mut job_count = 0;
        for item in self.jobs.iter() {
            item?;
            job_count += 1;
        }
        let mut waiting_count = 0;
        for item in self.waiting_order.iter() {
            item?;
            waiting_count += 1;
        }
        Ok(StoreStats {
            job_count,
            waiting_count,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RateLimitBucket {
    window_start: i64,
    count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub retry_after_secs: u64,
}

#[derive(Debug, Clone)]
pub struct StoreStats {
    pub job_count: usize,
    pub waiting_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BuildKind;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn test_store() -> (FjallStore, TempDir) {
        let temp = TempDir::new().unwrap();
        let store = FjallStore::open(temp.path().join("ledger")).unwrap();
        (store, temp)
    }

    fn test_task(app_name: &str) -> Task {
        Task {
            task_id: crate::identifiers::generate_task_id(),
            kind: BuildKind::Html,
            app_name: app_name.to_string(),
            app_id: crate::identifiers::derive_app_id(app_name),
            upload_path: PathBuf::from("/tmp/upload.html"),
            icon_path: None,
            created_at: Utc::now(),
            output_dir: PathBuf::from("/tmp/out"),
        }
    }

    #[test]
    fn enqueue_then_get_roundtrips() {
        let (store, _t) = test_store();
        let task = test_task("My App");
        let task_id = task.task_id.clone();
        let job = store.enqueue(task).unwrap();
        assert_eq!(job.status, JobStatus::Waiting);

        let fetched = store.get(&task_id).unwrap().unwrap();
        assert_eq!(fetched.task_id(), task_id);
    }

    #[test]
    fn enqueue_rejects_duplicate_task_id() {
        let (store, _t) = test_store();
        let task = test_task("Dup");
        store.enqueue(task.clone()).unwrap();
        let err = store.enqueue(task).unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyExists(_)));
    }

    #[test]
    fn lifecycle_waiting_active_completed() {
        let (store, _t) = test_store();
        let task = test_task("Lifecycle");
        let task_id = task.task_id.clone();
        store.enqueue(task).unwrap();

        let active = store.mark_active(&task_id).unwrap();
        assert_eq!(active.status, JobStatus::Active);
        assert_eq!(store.queue_position(&task_id).unwrap(), None);

        store
            .update_progress(
                &task_id,
                Progress {
                    message: "Building".to_string(),
                    percent: 40,
                },
            )
            .unwrap();
        let mid = store.get(&task_id).unwrap().unwrap();
        assert_eq!(mid.progress.percent, 40);

        // Progress must not regress.
        store
            .update_progress(
                &task_id,
                Progress {
                    message: "Stalled".to_string(),
                    percent: 10,
                },
            )
            .unwrap();
        let after_regress = store.get(&task_id).unwrap().unwrap();
        assert_eq!(after_regress.progress.percent, 40);

        let completed = store
            .complete(
                &task_id,
                JobResult {
                    success: true,
                    apk_path: Some("builds/lifecycle--abc.apk".into()),
                    error: None,
                    duration_ms: 500,
                },
            )
            .unwrap();
        assert_eq!(completed.effective_status(), JobStatus::Completed);
    }

    #[test]
    fn completed_with_unsuccessful_result_collapses_to_failed() {
        let (store, _t) = test_store();
        let task = test_task("Bad");
        let task_id = task.task_id.clone();
        store.enqueue(task).unwrap();
        store.mark_active(&task_id).unwrap();
        store
            .complete(
                &task_id,
                JobResult {
                    success: false,
                    apk_path: None,
                    error: Some("gradle failed".to_string()),
                    duration_ms: 10,
                },
            )
            .unwrap();
        let job = store.get(&task_id).unwrap().unwrap();
        assert_eq!(job.effective_status(), JobStatus::Failed);
    }

    #[test]
    fn mark_active_rejects_non_waiting() {
        let (store, _t) = test_store();
        let task = test_task("Twice");
        let task_id = task.task_id.clone();
        store.enqueue(task).unwrap();
        store.mark_active(&task_id).unwrap();
        assert!(matches!(
            store.mark_active(&task_id),
            Err(LedgerError::NotWaiting(_))
        ));
    }

    #[test]
    fn remove_rejects_active_job() {
        let (store, _t) = test_store();
        let task = test_task("Active");
        let task_id = task.task_id.clone();
        store.enqueue(task).unwrap();
        store.mark_active(&task_id).unwrap();
        assert!(matches!(
            store.remove(&task_id),
            Err(LedgerError::ActiveJobNotRemovable(_))
        ));
    }

    #[test]
    fn remove_deletes_waiting_job() {
        let (store, _t) = test_store();
        let task = test_task("Waiting");
        let task_id = task.task_id.clone();
        store.enqueue(task).unwrap();
        store.remove(&task_id).unwrap();
        assert!(store.get(&task_id).unwrap().is_none());
    }

    #[test]
    fn queue_position_is_fifo() {
        let (store, _t) = test_store();
        let first = test_task("First");
        let first_id = first.task_id.clone();
        let second = test_task("Second");
        let second_id = second.task_id.clone();
        store.enqueue(first).unwrap();
        store.enqueue(second).unwrap();

        assert_eq!(store.queue_position(&first_id).unwrap(), Some(1));
        assert_eq!(store.queue_position(&second_id).unwrap(), Some(2));
        assert_eq!(store.queue_total().unwrap(), 2);
    }

    #[test]
    fn rate_limit_allows_then_denies_then_resets() {
        let (store, _t) = test_store();
        let d1 = store.check_and_increment("1.2.3.4", 2, 3600).unwrap();
        assert!(d1.allowed);
        let d2 = store.check_and_increment("1.2.3.4", 2, 3600).unwrap();
        assert!(d2.allowed);
        let d3 = store.check_and_increment("1.2.3.4", 2, 3600).unwrap();
        assert!(!d3.allowed);
        assert!(d3.retry_after_secs <= 3600);
    }

    #[test]
    fn next_waiting_task_id_returns_fifo_head() {
        let (store, _t) = test_store();
        let first = test_task("First");
        let first_id = first.task_id.clone();
        store.enqueue(first).unwrap();
        store.enqueue(test_task("Second")).unwrap();

        assert_eq!(store.next_waiting_task_id().unwrap(), Some(first_id.clone()));
        store.mark_active(&first_id).unwrap();
        assert_ne!(store.next_waiting_task_id().unwrap(), Some(first_id));
    }

    #[test]
    fn rate_limit_is_per_client() {
        let (store, _t) = test_store();
        store.check_and_increment("a", 1, 3600).unwrap();
        let other = store.check_and_increment("b", 1, 3600).unwrap();
        assert!(other.allowed);
    }
}
