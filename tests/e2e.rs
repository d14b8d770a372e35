//! End-to-end test for the zip build kind and concurrent-submission artifact
//! naming (SPEC_FULL.md §8, scenario b), driven through the full HTTP router
//! with `MOCK_BUILD=true`.

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

struct TestApp {
    router: Router,
    builds_dir: std::path::PathBuf,
    _temp: TempDir,
}

async fn build_test_app() -> TestApp {
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
    config.rate_limit.max = 100;
    config.worker.concurrency = 4;

    let (broker, receivers) = TaskBroker::new(store.clone(), config.worker.concurrency, 16);
    let broker = Arc::new(broker);

    let _pool = WorkerPool::spawn(
        store.clone(),
        Arc::new(Metrics::new()),
        config.build.mock_build,
        receivers,
        builds_dir.clone(),
        config.retention.file_retention_hours,
    );

    let state = AppState::new(config, store, storage, broker, Arc::new(Metrics::new()));
    TestApp {
        router: api::router(state),
        builds_dir,
        _temp: temp,
    }
}

fn multipart_zip_body(boundary: &str, app_name: &str) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"file\"; filename=\"project.zip\"\r\n",
    );
    body.extend_from_slice(b"Content-Type: application/zip\r\n\r\n");
    // Mock build mode never reads upload contents, so an empty placeholder
    // stands in for a real front-end project archive.
    body.extend_from_slice(b"PK\x05\x06\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0");
    body.extend_from_slice(b"\r\n");

    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"appName\"\r\n\r\n");
    body.extend_from_slice(app_name.as_bytes());
    body.extend_from_slice(b"\r\n");

    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

fn submit_request(boundary: &str, body: Vec<u8>) -> Request<Body> {
    let peer: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let mut request = Request::builder()
        .method("POST")
        .uri("/api/build/zip")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();
    request.extensions_mut().insert(ConnectInfo(peer));
    request
}

async fn submit_and_wait_for_completion(app: &TestApp, app_name: &str) -> String {
    let boundary = "demo2apk-e2e-boundary";
    let body = multipart_zip_body(boundary, app_name);
    let response = app
        .router
        .clone()
        .oneshot(submit_request(boundary, body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let accepted: Value = serde_json::from_slice(&bytes).unwrap();
    let task_id = accepted["taskId"].as_str().unwrap().to_string();

    for _ in 0..200 {
        let request = Request::builder()
            .uri(format!("/api/build/{task_id}/status"))
            .body(Body::empty())
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let status: Value = serde_json::from_slice(&bytes).unwrap();
        if status["status"] == "completed" {
            return task_id;
        }
        assert_ne!(status["status"], "failed", "build unexpectedly failed");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("task {task_id} never reached completed status");
}

/// Scenario (b): two concurrent zip builds sharing an appName produce two
/// distinct, non-colliding artifacts.
#[tokio::test]
async fn scenario_b_concurrent_same_app_name_zip_builds_do_not_collide() {
    let app = build_test_app().await;

    let (first_id, second_id) = tokio::join!(
        submit_and_wait_for_completion(&app, "Dup"),
        submit_and_wait_for_completion(&app, "Dup"),
    );
    assert_ne!(first_id, second_id);

    let first_artifact = app.builds_dir.join(format!("Dup--{first_id}.apk"));
    let second_artifact = app.builds_dir.join(format!("Dup--{second_id}.apk"));
    assert!(first_artifact.exists());
    assert!(second_artifact.exists());
    assert_ne!(first_artifact, second_artifact);
}
