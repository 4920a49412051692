//! Timesheet splitting service
//!
//! Endpoints:
//! - `POST /api/process`: upload PDFs and start a job
//! - `POST /api/cancel/:job_id`: cooperative cancellation
//! - `GET /ws/:job_id`: progress events as JSON text frames
//! - `GET /data/...`: archive downloads

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub mod error;
pub mod handlers;
pub mod models;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

/// Upper bound for one multipart request
pub const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    // CORS configuration for web clients
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let downloads = ServeDir::new(&state.config().data_dir);
    let download_prefix = state.config().download_prefix.clone();

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/process", post(handlers::process))
        .route("/api/cancel/:job_id", post(handlers::cancel))
        .route("/ws/:job_id", get(handlers::events))
        .nest_service(&download_prefix, downloads)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
