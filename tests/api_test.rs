//! Integration tests against the full axum router (SPEC_FULL.md §8, scenarios
//! a, d, e, f), driven entirely through HTTP requests with `MOCK_BUILD=true`
//! so no Android toolchain is required.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use demo2apk::api;
use demo2apk::api::state::AppState;
use demo2apk::config::{AppEnv, Config};
use demo2apk::ledger::FjallStore;
use demo2apk::observability::Metrics;
use demo2apk::queue::TaskBroker;
use demo2apk::storage::StorageClient;
use demo2apk::worker::WorkerPool;

const PEER: SocketAddr = SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)), 0);

struct TestApp {
    router: Router,
    store: Arc<FjallStore>,
    _temp: TempDir,
}

async fn build_test_app(rate_limit_max: u32) -> TestApp {
    let temp = TempDir::new().unwrap();
    let builds_dir = temp.path().join("builds");
    let uploads_dir = temp.path().join("uploads");
    std::fs::create_dir_all(&builds_dir).unwrap();
    std::fs::create_dir_all(&uploads_dir).unwrap();

    let store = Arc::new(FjallStore::open(temp.path().join("ledger")).unwrap());
    let storage = StorageClient::local(&builds_dir).unwrap();

    let mut config = Config::load_from_path(temp.path().join("missing.toml")).unwrap();
    config.storage.builds_dir = builds_dir.clone();
    config.storage.uploads_dir = uploads_dir;
    config.build.app_env = AppEnv::Test;
    config.build.mock_build = true;
    config.rate_limit.enabled = true;
    config.rate_limit.max = rate_limit_max;
    config.rate_limit.window_secs = 3600;
    config.worker.concurrency = 2;

    let (broker, receivers) = TaskBroker::new(store.clone(), config.worker.concurrency, 16);
    let broker = Arc::new(broker);

    // Dropping the returned handle without calling `shutdown()` is fine here:
    // the spawned slot/sweeper tasks keep running detached for the test's
    // lifetime, which is all these tests need.
    let _pool = WorkerPool::spawn(
        store.clone(),
        Arc::new(Metrics::new()),
        config.build.mock_build,
        receivers,
        builds_dir,
        config.retention.file_retention_hours,
    );

    let state = AppState::new(config, store.clone(), storage, broker, Arc::new(Metrics::new()));
    let router = api::router(state);

    TestApp {
        router,
        store,
        _temp: temp,
    }
}

fn multipart_html_body(boundary: &str, file_name: &str, html: &str, app_name: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: text/html\r\n\r\n");
    body.extend_from_slice(html.as_bytes());
    body.extend_from_slice(b"\r\n");

    if let Some(name) = app_name {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"appName\"\r\n\r\n");
        body.extend_from_slice(name.as_bytes());
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

fn html_submit_request(boundary: &str, body: Vec<u8>) -> Request<Body> {
    let mut request = Request::builder()
        .method("POST")
        .uri("/api/build/html")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();
    request.extensions_mut().insert(ConnectInfo(PEER));
    request
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Scenario (a): submit an HTML build, poll status through pending/active to
/// completed, then download the artifact.
#[tokio::test]
async fn scenario_a_html_submit_status_and_download() {
    let app = build_test_app(100).await;

    let boundary = "demo2apk-test-boundary";
    let body = multipart_html_body(
        boundary,
        "hello.html",
        "<!doctype html><html><body>Hi</body></html>",
        Some("HelloApp"),
    );
    let response = app
        .router
        .clone()
        .oneshot(html_submit_request(boundary, body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let accepted = body_json(response).await;
    assert_eq!(accepted["status"], "pending");
    let task_id = accepted["taskId"].as_str().unwrap().to_string();
    assert_eq!(task_id.len(), 12);

    let mut last_status = String::new();
    for _ in 0..100 {
        let request = Request::builder()
            .uri(format!("/api/build/{task_id}/status"))
            .body(Body::empty())
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let status = body_json(response).await;
        last_status = status["status"].as_str().unwrap().to_string();
        if last_status == "completed" || last_status == "failed" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(last_status, "completed");

    let request = Request::builder()
        .uri(format!("/api/build/{task_id}/download"))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/vnd.android.package-archive"
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(!bytes.is_empty());
}

/// Scenario (d): RATE_LIMIT_MAX=2, third submission from the same client
/// within the window is rejected with 429 and a bounded retryAfter.
#[tokio::test]
async fn scenario_d_rate_limit_rejects_third_submission() {
    let app = build_test_app(2).await;
    let boundary = "demo2apk-test-boundary";

    for _ in 0..2 {
        let body = multipart_html_body(boundary, "hello.html", "<html></html>", None);
        let response = app
            .router
            .clone()
            .oneshot(html_submit_request(boundary, body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let body = multipart_html_body(boundary, "hello.html", "<html></html>", None);
    let response = app
        .router
        .clone()
        .oneshot(html_submit_request(boundary, body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let error = body_json(response).await;
    assert_eq!(error["error"], "Too Many Requests");
    assert!(error["retryAfter"].as_u64().unwrap() <= 3600);
}

/// Scenario (e): DELETE on an unknown taskId is 404; DELETE on a completed
/// task removes the ledger entry and the uploads subdirectory.
#[tokio::test]
async fn scenario_e_delete_unknown_and_completed_jobs() {
    let app = build_test_app(100).await;

    let request = Request::builder()
        .method("DELETE")
        .uri("/api/build/does-not-exist")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let boundary = "demo2apk-test-boundary";
    let body = multipart_html_body(boundary, "hello.html", "<html></html>", Some("DelApp"));
    let response = app
        .router
        .clone()
        .oneshot(html_submit_request(boundary, body))
        .await
        .unwrap();
    let accepted = body_json(response).await;
    let task_id = accepted["taskId"].as_str().unwrap().to_string();

    for _ in 0..100 {
        let job = app.store.get(&task_id).unwrap().unwrap();
        if job.effective_status() == demo2apk::domain::JobStatus::Completed {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/api/build/{task_id}"))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(app.store.get(&task_id).unwrap().is_none());
}

/// Scenario (f): a failed build collapses to `status: "failed"` with the
/// pipeline's error message, never "completed".
#[tokio::test]
async fn scenario_f_status_collapses_to_failed() {
    let app = build_test_app(100).await;

    let task = demo2apk::domain::Task {
        task_id: demo2apk::identifiers::generate_task_id(),
        kind: demo2apk::domain::BuildKind::Html,
        app_name: "FailApp".to_string(),
        app_id: demo2apk::identifiers::derive_app_id("FailApp"),
        upload_path: std::path::PathBuf::from("/tmp/index.html"),
        icon_path: None,
        created_at: chrono::Utc::now(),
        output_dir: std::path::PathBuf::from("/tmp"),
    };
    let task_id = task.task_id.clone();
    app.store.enqueue(task).unwrap();
    app.store.mark_active(&task_id).unwrap();
    app.store
        .complete(
            &task_id,
            demo2apk::domain::JobResult {
                success: false,
                apk_path: None,
                error: Some("gradle exited 1".to_string()),
                duration_ms: 42,
            },
        )
        .unwrap();

    let request = Request::builder()
        .uri(format!("/api/build/{task_id}/status"))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let status = body_json(response).await;
    assert_eq!(status["status"], "failed");
    assert_eq!(status["error"], "gradle exited 1");
    assert!(status.get("downloadUrl").is_none());
}

#[tokio::test]
async fn health_and_service_metadata_endpoints_respond() {
    let app = build_test_app(100).await;

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let request = Request::builder().uri("/api").body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let metadata = body_json(response).await;
    assert_eq!(metadata["buildKinds"], serde_json::json!(["html", "zip"]));
}
