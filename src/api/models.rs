//! Response payloads for the build-submission HTTP surface (SPEC_FULL.md §4.1).

use serde::Serialize;

use crate::domain::{JobStatus, Progress};

/// Collapses the internal [`JobStatus`] plus an optional unsuccessful result
/// into the spec's four-value status string (`pending`/`active`/`completed`/`failed`).
pub fn status_label(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Waiting => "pending",
        JobStatus::Active => "active",
        JobStatus::Completed => "completed",
        JobStatus::Failed => "failed",
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildAcceptedResponse {
    pub task_id: String,
    pub status: &'static str,
    pub status_url: String,
    pub download_url: String,
}

#[derive(Debug, Serialize)]
pub struct ProgressView {
    pub message: String,
    pub percent: u8,
}

impl From<Progress> for ProgressView {
    fn from(progress: Progress) -> Self {
        ProgressView {
            message: progress.message,
            percent: progress.percent,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultView {
    pub success: bool,
    pub duration_ms: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub task_id: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<ProgressView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_total: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apk_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub retention_hours: u64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMetadata {
    pub service: &'static str,
    pub version: &'static str,
    pub build_kinds: &'static [&'static str],
}
