//! HTTP handlers for the build-submission surface (SPEC_FULL.md §4.1).

use std::net::SocketAddr;
use std::path::Path as StdPath;

use axum::extract::{ConnectInfo, Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::Json;

use super::error::ApiError;
use super::models::{
    BuildAcceptedResponse, HealthResponse, ProgressView, ResultView, ServiceMetadata,
    StatusResponse, status_label,
};
use super::state::AppState;
use super::utils;
use super::validation;
use crate::domain::{BuildKind, JobStatus, Task};

const SERVICE_NAME: &str = "demo2apk";
const BUILD_KINDS: &[&str] = &["html", "zip"];

pub async fn submit_html(
    state: State<AppState>,
    connect_info: ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    submit_build(state, connect_info, headers, multipart, BuildKind::Html).await
}

pub async fn submit_zip(
    state: State<AppState>,
    connect_info: ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    submit_build(state, connect_info, headers, multipart, BuildKind::Zip).await
}

struct ParsedUpload {
    file_name: String,
    file_bytes: Vec<u8>,
    icon: Option<(String, Vec<u8>)>,
    app_name: Option<String>,
    app_id: Option<String>,
}

async fn parse_multipart(mut multipart: Multipart) -> Result<ParsedUpload, ApiError> {
    let mut file_name = None;
    let mut file_bytes = None;
    let mut icon_name = None;
    let mut icon_bytes = None;
    let mut app_name = None;
    let mut app_id = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::Validation(err.to_string()))?
    {
        match field.name().unwrap_or_default() {
            "file" => {
                file_name = field.file_name().map(str::to_string);
                file_bytes = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|err| ApiError::Validation(err.to_string()))?
                        .to_vec(),
                );
            }
            "icon" => {
                icon_name = field.file_name().map(str::to_string);
                icon_bytes = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|err| ApiError::Validation(err.to_string()))?
                        .to_vec(),
                );
            }
            "appName" => {
                let text = field
                    .text()
                    .await
                    .map_err(|err| ApiError::Validation(err.to_string()))?;
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    app_name = Some(trimmed.to_string());
                }
            }
            "appId" => {
                let text = field
                    .text()
                    .await
                    .map_err(|err| ApiError::Validation(err.to_string()))?;
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    app_id = Some(trimmed.to_string());
                }
            }
            _ => {
                // Unknown fields are ignored, matching the spec's "dispatch on
                // (fieldname, type), fail on unknown *required* fields" design note.
            }
        }
    }

    let file_name = file_name
        .ok_or_else(|| ApiError::Validation("missing required 'file' field".to_string()))?;
    let file_bytes = file_bytes
        .ok_or_else(|| ApiError::Validation("missing required 'file' field".to_string()))?;

    Ok(ParsedUpload {
        file_name,
        file_bytes,
        icon: icon_name.zip(icon_bytes),
        app_name,
        app_id,
    })
}

async fn submit_build(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    multipart: Multipart,
    kind: BuildKind,
) -> Result<impl IntoResponse, ApiError> {
    enforce_rate_limit(&state, &headers, peer)?;

    let upload = parse_multipart(multipart).await?;

    validation::validate_upload_name(&upload.file_name, kind)
        .map_err(|err| ApiError::Validation(err.to_string()))?;

    let max_file_size = state.config.storage.max_file_size.as_u64();
    if upload.file_bytes.len() as u64 > max_file_size {
        return Err(ApiError::Validation(format!(
            "upload exceeds maximum size of {max_file_size} bytes"
        )));
    }

    if let Some((name, bytes)) = &upload.icon {
        validation::validate_icon_name(name).map_err(|err| ApiError::Validation(err.to_string()))?;
        if bytes.len() as u64 > crate::config::MAX_ICON_SIZE_BYTES {
            return Err(ApiError::Validation(format!(
                "icon exceeds maximum size of {} bytes",
                crate::config::MAX_ICON_SIZE_BYTES
            )));
        }
    }

    let task_id = crate::identifiers::generate_task_id();
    let app_name = upload
        .app_name
        .unwrap_or_else(|| utils::default_app_name(kind).to_string());
    let app_id = upload
        .app_id
        .unwrap_or_else(|| crate::identifiers::derive_app_id(&app_name));

    let upload_dir = state.config.storage.uploads_dir.join(&task_id);
    std::fs::create_dir_all(&upload_dir)?;
    let upload_path = upload_dir.join(&upload.file_name);
    std::fs::write(&upload_path, &upload.file_bytes)?;

    let icon_path = match upload.icon {
        Some((name, bytes)) => {
            let path = upload_dir.join(format!("icon-{name}"));
            std::fs::write(&path, &bytes)?;
            Some(path)
        }
        None => None,
    };

    let task = Task {
        task_id: task_id.clone(),
        kind,
        app_name,
        app_id,
        upload_path,
        icon_path,
        created_at: chrono::Utc::now(),
        output_dir: state.config.storage.builds_dir.clone(),
    };

    state.broker.enqueue(task).await?;
    state.metrics.job_admitted();

    let response = BuildAcceptedResponse {
        task_id: task_id.clone(),
        status: "pending",
        status_url: format!("/api/build/{task_id}/status"),
        download_url: format!("/api/build/{task_id}/download"),
    };

    Ok((StatusCode::OK, Json(response)))
}

fn rate_limit_max(state: &AppState, headers: &HeaderMap) -> u32 {
    let authenticated = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.len() > "Bearer ".len() && value.starts_with("Bearer "))
        .unwrap_or(false);

    if authenticated {
        state.config.rate_limit.authenticated_max
    } else {
        state.config.rate_limit.max
    }
}

fn enforce_rate_limit(
    state: &AppState,
    headers: &HeaderMap,
    peer: SocketAddr,
) -> Result<(), ApiError> {
    if !state.config.rate_limit.enabled {
        return Ok(());
    }

    let client_id = utils::client_identifier(headers, peer);
    let max = rate_limit_max(state, headers);
    let decision =
        state
            .store
            .check_and_increment(&client_id, max, state.config.rate_limit.window_secs)?;

    if !decision.allowed {
        state.metrics.rate_limit_rejected();
        return Err(ApiError::RateLimited {
            retry_after_secs: decision.retry_after_secs,
        });
    }

    Ok(())
}

pub async fn get_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job = state
        .store
        .get(&task_id)?
        .ok_or_else(|| ApiError::NotFound(format!("job {task_id}")))?;

    let status = job.effective_status();
    let file_name = job
        .task
        .upload_path
        .file_name()
        .map(|name| name.to_string_lossy().to_string());

    let mut response = StatusResponse {
        task_id: task_id.clone(),
        status: status_label(status),
        file_name,
        progress: None,
        queue_position: None,
        queue_total: None,
        result: None,
        download_url: None,
        apk_size: None,
        error: None,
        expires_at: None,
        retention_hours: state.config.retention.file_retention_hours,
    };

    match status {
        JobStatus::Waiting => {
            response.progress = Some(ProgressView::from(job.progress));
            response.queue_position = state.store.queue_position(&task_id)?;
            response.queue_total = Some(state.store.queue_total()?);
        }
        JobStatus::Active => {
            response.progress = Some(ProgressView::from(job.progress));
        }
        JobStatus::Completed | JobStatus::Failed => {
            if let Some(result) = &job.result {
                response.result = Some(ResultView {
                    success: result.success,
                    duration_ms: result.duration_ms,
                });
                if result.success {
                    response.download_url = Some(format!("/api/build/{task_id}/download"));
                    if let Some(apk_path) = &result.apk_path {
                        if let Ok(metadata) = std::fs::metadata(apk_path) {
                            response.apk_size = Some(metadata.len());
                            if let Ok(modified) = metadata.modified() {
                                let expires = chrono::DateTime::<chrono::Utc>::from(modified)
                                    + chrono::Duration::hours(
                                        state.config.retention.file_retention_hours as i64,
                                    );
                                response.expires_at = Some(expires);
                            }
                        }
                    }
                } else {
                    response.error = result.error.clone();
                }
            }
        }
    }

    Ok((StatusCode::OK, Json(response)))
}

pub async fn download(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job = state
        .store
        .get(&task_id)?
        .ok_or_else(|| ApiError::NotFound(format!("job {task_id}")))?;

    match job.effective_status() {
        JobStatus::Waiting | JobStatus::Active => {
            return Err(ApiError::Validation(format!(
                "job {task_id} is not yet complete"
            )));
        }
        JobStatus::Failed => {
            return Err(ApiError::Validation(format!(
                "job {task_id} failed and has no artifact"
            )));
        }
        JobStatus::Completed => {}
    }

    let result = job
        .result
        .as_ref()
        .ok_or_else(|| ApiError::Internal(format!("job {task_id} completed with no result")))?;
    let apk_path = result
        .apk_path
        .as_ref()
        .ok_or_else(|| ApiError::NotFound(format!("artifact for job {task_id}")))?;

    let key = StdPath::new(apk_path)
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| ApiError::Internal("malformed artifact path".to_string()))?;

    let bytes = state.storage.download(key).await?;

    let filename = utils::download_file_name(&job.task.app_name);
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        "application/vnd.android.package-archive".parse().unwrap(),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        utils::content_disposition(&filename).parse().unwrap(),
    );

    Ok((headers, bytes))
}

pub async fn delete_job(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job = state
        .store
        .get(&task_id)?
        .ok_or_else(|| ApiError::NotFound(format!("job {task_id}")))?;

    state.store.remove(&task_id)?;

    if let Some(result) = &job.result {
        if let Some(apk_path) = &result.apk_path {
            let _ = std::fs::remove_file(apk_path);
        }
    }
    let upload_dir = state.config.storage.uploads_dir.join(&task_id);
    let _ = std::fs::remove_dir_all(&upload_dir);

    Ok(StatusCode::NO_CONTENT)
}

pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "healthy" })
}

pub async fn service_metadata() -> impl IntoResponse {
    Json(ServiceMetadata {
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        build_kinds: BUILD_KINDS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::FjallStore;
    use crate::queue::TaskBroker;
    use crate::storage::StorageClient;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn test_state(temp: &TempDir) -> AppState {
        let store = Arc::new(FjallStore::open(temp.path().join("ledger")).unwrap());
        let storage = StorageClient::local(&temp.path().join("builds")).unwrap();
        let (broker, _receivers) = TaskBroker::new(store.clone(), 2, 10);
        let mut config = crate::config::Config::load_from_path(temp.path().join("missing.toml")).unwrap();
        config.storage.builds_dir = temp.path().join("builds");
        config.storage.uploads_dir = temp.path().join("uploads");
        AppState::new(
            config,
            store,
            storage,
            Arc::new(broker),
            Arc::new(crate::observability::Metrics::new()),
        )
    }

    #[tokio::test]
    async fn get_status_reports_pending_for_waiting_job() {
        let temp = TempDir::new().unwrap();
        let state = test_state(&temp);

        let task = Task {
            task_id: crate::identifiers::generate_task_id(),
            kind: BuildKind::Html,
            app_name: "StatusApp".to_string(),
            app_id: crate::identifiers::derive_app_id("StatusApp"),
            upload_path: std::path::PathBuf::from("/tmp/index.html"),
            icon_path: None,
            created_at: chrono::Utc::now(),
            output_dir: state.config.storage.builds_dir.clone(),
        };
        let task_id = task.task_id.clone();
        state.broker.enqueue(task).await.unwrap();

        let response = get_status(State(state), Path(task_id)).await.unwrap();
        assert_eq!(response.into_response().status(), StatusCode::OK);
    }

    #[test]
    fn rate_limit_max_prefers_authenticated_quota() {
        let temp = TempDir::new().unwrap();
        let state = test_state(&temp);
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer sometoken".parse().unwrap());
        assert_eq!(rate_limit_max(&state, &headers), state.config.rate_limit.authenticated_max);

        let anon_headers = HeaderMap::new();
        assert_eq!(rate_limit_max(&state, &anon_headers), state.config.rate_limit.max);
    }
}
