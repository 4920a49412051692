//! Router tests driven through `tower::ServiceExt::oneshot`

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use pontosplit_api::{router, AppState};
use pontosplit_core::document::fixtures::pdf_with_pages;
use pontosplit_core::{JobState, SplitterConfig};
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tower::ServiceExt;

const BOUNDARY: &str = "pontosplit-test-boundary";

fn app(data_dir: &Path) -> (Router, AppState) {
    let config = SplitterConfig::default()
        .with_data_dir(data_dir)
        .with_cleanup_delay(Duration::from_secs(600));
    let state = AppState::new(config);
    (router(state.clone()), state)
}

fn multipart_body(files: &[(&str, Vec<u8>)], metric_only: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{}\"\r\nContent-Type: application/pdf\r\n\r\n",
                BOUNDARY, name
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    if let Some(value) = metric_only {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"metric_only\"\r\n\r\n{}\r\n",
                BOUNDARY, value
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn process_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/process")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn wait_until_terminal(state: &AppState, job_id: &str) -> JobState {
    for _ in 0..500 {
        if let Some(job) = state.runner.store().get(job_id) {
            if job.state().is_terminal() {
                return job.state();
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job {} did not finish", job_id);
}

#[tokio::test]
async fn test_health() {
    let data = tempfile::tempdir().unwrap();
    let (app, _) = app(data.path());
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn test_cancel_unknown_job() {
    let data = tempfile::tempdir().unwrap();
    let (app, _) = app(data.path());
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/cancel/doesnotexist")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await, serde_json::json!({"status": "unknown"}));
}

#[tokio::test]
async fn test_events_for_unknown_job_is_404() {
    let data = tempfile::tempdir().unwrap();
    let (app, _) = app(data.path());
    let response = app
        .oneshot(Request::builder().uri("/ws/doesnotexist").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["status"], 404);
}

#[tokio::test]
async fn test_process_without_files_is_rejected() {
    let data = tempfile::tempdir().unwrap();
    let (app, state) = app(data.path());
    let response = app
        .oneshot(process_request(multipart_body(&[], Some("false"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(state.runner.store().is_empty());
}

#[tokio::test]
async fn test_process_split_and_download() {
    let data = tempfile::tempdir().unwrap();
    let (app, state) = app(data.path());
    let pdf = pdf_with_pages(&["EMPREGADO: 1 ANA LIMA CARGO: AUXILIAR", "sem nome"]);

    let response = app
        .clone()
        .oneshot(process_request(multipart_body(
            &[("ponto 100.pdf", pdf)],
            Some("false"),
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let receipt = body_json(response).await;
    let job_id = receipt["job_id"].as_str().unwrap().to_string();
    assert_eq!(job_id.len(), 12);
    assert_eq!(receipt["total_pages"], 2);
    assert_eq!(
        receipt["files"],
        serde_json::json!([{"file": "ponto 100", "pages": 2, "id": "ponto_100"}])
    );
    assert!(data
        .path()
        .join(&job_id)
        .join("in/ponto 100.pdf")
        .exists());

    assert_eq!(wait_until_terminal(&state, &job_id).await, JobState::Finished);

    let download = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/data/{}/out/100.zip", job_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(download.status(), StatusCode::OK);

    // Still registered until cleanup, so cancel is accepted
    let cancel = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/cancel/{}", job_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(cancel.status(), StatusCode::OK);
    assert_eq!(body_json(cancel).await, serde_json::json!({"status": "cancelled"}));
}

#[tokio::test]
async fn test_metric_only_run_writes_no_output() {
    let data = tempfile::tempdir().unwrap();
    let (app, state) = app(data.path());
    let response = app
        .oneshot(process_request(multipart_body(
            &[("a 200.pdf", pdf_with_pages(&["x", "y", "z"]))],
            Some("true"),
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let job_id = body_json(response).await["job_id"]
        .as_str()
        .unwrap()
        .to_string();

    assert_eq!(wait_until_terminal(&state, &job_id).await, JobState::Finished);
    assert!(!data.path().join(&job_id).join("out").exists());
}

#[tokio::test]
async fn test_unreadable_upload_is_left_out_of_metadata() {
    let data = tempfile::tempdir().unwrap();
    let (app, state) = app(data.path());
    let response = app
        .oneshot(process_request(multipart_body(
            &[("broken.pdf", b"not a pdf".to_vec())],
            None,
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let receipt = body_json(response).await;
    assert_eq!(receipt["total_pages"], 0);
    assert_eq!(receipt["files"], serde_json::json!([]));

    let job_id = receipt["job_id"].as_str().unwrap();
    assert_eq!(wait_until_terminal(&state, job_id).await, JobState::Failed);
}
