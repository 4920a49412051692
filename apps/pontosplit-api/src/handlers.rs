//! HTTP handlers for the splitting API

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        Multipart, Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures::{SinkExt, StreamExt};
use pontosplit_core::{
    sanitize_filename, splitter::write_unique, Job, JobId, JobOptions, SubmitReceipt,
};
use std::path::{Path as FsPath, PathBuf};

use crate::error::ApiError;
use crate::models::*;
use crate::state::AppState;

const DEFAULT_EXTENSION: &str = "pdf";

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}

/// Write uploads into `dir` under sanitized names. Duplicate names get a
/// numeric suffix instead of overwriting.
pub fn store_uploads(dir: &FsPath, uploads: &[Upload]) -> pontosplit_core::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;

    uploads
        .iter()
        .map(|upload| {
            let base = FsPath::new(&upload.filename)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| DEFAULT_UPLOAD_NAME.to_string());
            let clean = sanitize_filename(&base);
            let clean_path = FsPath::new(&clean);
            let stem = clean_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| clean.clone());
            let ext = clean_path
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
            write_unique(dir, &stem, &ext, &upload.data)
        })
        .collect()
}

/// Accept uploaded PDFs and start a job
pub async fn process(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<SubmitReceipt>, ApiError> {
    let mut uploads = Vec::new();
    let mut metrics_only = false;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ApiError::InvalidRequest(format!("Failed to read multipart field: {}", e))
    })? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            METRIC_ONLY_FIELD => {
                let value = field.text().await.map_err(|e| {
                    ApiError::InvalidRequest(format!("Failed to read {}: {}", METRIC_ONLY_FIELD, e))
                })?;
                metrics_only = parse_flag(&value);
            }
            FILES_FIELD => {
                let filename = field
                    .file_name()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| DEFAULT_UPLOAD_NAME.to_string());
                let data = field.bytes().await.map_err(|e| {
                    ApiError::InvalidRequest(format!("Failed to read {}: {}", filename, e))
                })?;
                tracing::debug!("Received {} ({} bytes)", filename, data.len());
                uploads.push(Upload {
                    filename,
                    data: data.to_vec(),
                });
            }
            other => tracing::debug!("Ignoring multipart field {:?}", other),
        }
    }

    if uploads.is_empty() {
        return Err(ApiError::InvalidRequest("No files provided".to_string()));
    }

    let job_id = JobId::generate();
    let input_dir = Job::input_dir(&state.runner.job_dir(&job_id));
    let inputs = tokio::task::spawn_blocking(move || store_uploads(&input_dir, &uploads))
        .await
        .map_err(|e| anyhow::anyhow!("Upload storage task failed: {}", e))??;

    let options = JobOptions {
        compress: state.config().compress,
        metrics_only,
    };
    let receipt = state.runner.submit(job_id, inputs, options).await?;
    Ok(Json(receipt))
}

/// Request cooperative cancellation of a job
pub async fn cancel(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> (StatusCode, Json<CancelResponse>) {
    match state.runner.store().cancel(&job_id) {
        Ok(()) => (
            StatusCode::OK,
            Json(CancelResponse {
                status: CancelStatus::Cancelled,
            }),
        ),
        Err(_) => (
            StatusCode::NOT_FOUND,
            Json(CancelResponse {
                status: CancelStatus::Unknown,
            }),
        ),
    }
}

/// Upgrade to a WebSocket carrying the job's progress events
pub async fn events(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    if !state.runner.broadcaster().is_registered(&job_id) {
        return Err(ApiError::JobNotFound(job_id));
    }
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };
    Ok(ws.on_upgrade(move |socket| stream_events(socket, state, job_id)))
}

async fn stream_events(socket: WebSocket, state: AppState, job_id: String) {
    let broadcaster = state.runner.broadcaster();
    let Some(mut observer) = broadcaster.attach(&job_id) else {
        tracing::debug!("Job {} went away before the stream opened", job_id);
        return;
    };
    tracing::info!("Observer {} attached to job {}", observer.id, job_id);

    let (mut sender, mut receiver) = socket.split();
    loop {
        tokio::select! {
            event = observer.events.recv() => {
                // `None` once the job is cleaned up
                let Some(event) = event else { break };
                let text = match event.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!("Could not encode {} event: {}", event.kind(), e);
                        continue;
                    }
                };
                if sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    broadcaster.detach(&job_id, observer.id);
    let _ = sender.close().await;
    tracing::info!("Observer {} left job {}", observer.id, job_id);
}
