//! Shared types describing a build task and its lifecycle as a job.
//!
//! These types are persisted verbatim (as JSON) by [`crate::ledger::FjallStore`],
//! dispatched by [`crate::queue::TaskBroker`], and mutated by the worker pool in
//! [`crate::worker`]. They are intentionally thin: no behavior lives here beyond
//! small derived accessors.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which build pipeline a task runs through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildKind {
    Html,
    Zip,
}

impl BuildKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BuildKind::Html => "html",
            BuildKind::Zip => "zip",
        }
    }
}

/// The immutable work item admitted by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub kind: BuildKind,
    pub app_name: String,
    pub app_id: String,
    pub upload_path: PathBuf,
    pub icon_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub output_dir: PathBuf,
}

/// Job state machine. See SPEC_FULL.md §4.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Waiting,
    Active,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    pub message: String,
    pub percent: u8,
}

impl Default for Progress {
    fn default() -> Self {
        Progress {
            message: "Queued".to_string(),
            percent: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub success: bool,
    pub apk_path: Option<String>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// One-to-one with [`Task`]; `job_id == task_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub task: Task,
    pub status: JobStatus,
    pub progress: Progress,
    pub result: Option<JobResult>,
    pub seq: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Target for progress reports emitted by the pipeline and the heartbeat
/// decorator. The worker owns the actual write to the job record; this
/// trait only describes "I have new progress to report."
pub trait ProgressSink: Send + Sync {
    fn report(&self, message: &str, percent: u8);
}

impl Job {
    pub fn new(task: Task, seq: u64) -> Self {
        let now = task.created_at;
        Job {
            task,
            status: JobStatus::Waiting,
            progress: Progress::default(),
            result: None,
            seq,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task.task_id
    }

    /// The status surface collapses a completed-but-unsuccessful result into
    /// "failed" per SPEC_FULL.md §4.1.
    pub fn effective_status(&self) -> JobStatus {
        match (self.status, &self.result) {
            (JobStatus::Completed, Some(result)) if !result.success => JobStatus::Failed,
            (status, _) => status,
        }
    }
}
