//! Request and response models for the splitting API

use serde::{Deserialize, Serialize};

/// Multipart field carrying the PDFs
pub const FILES_FIELD: &str = "files";
/// Multipart field selecting a metrics-only run
pub const METRIC_ONLY_FIELD: &str = "metric_only";
/// Stored name for an upload that arrived without one
pub const DEFAULT_UPLOAD_NAME: &str = "unknown.pdf";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelStatus {
    Cancelled,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub status: CancelStatus,
}

/// One uploaded file, before it is written to the job's input directory
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Form flags are the strings `"true"` / `"false"`; anything else is false
pub fn parse_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}
