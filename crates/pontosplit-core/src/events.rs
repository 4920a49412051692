//! Progress events pushed to job observers
//!
//! Serialized as `{"event": <kind>, "data": {...}}`.

use serde::{Deserialize, Serialize};

use crate::stats::JobStatistics;

/// Per-document metadata announced before processing starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMeta {
    /// Display name (input filename without extension)
    pub file: String,
    pub pages: u32,
    /// Filesystem/DOM-safe identifier derived from the display name
    pub id: String,
}

/// Terminal payload shared by `finished` and `cancelled`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutcome {
    /// Download references for generated archives
    pub urls: Vec<String>,
    pub summary: JobStatistics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ProgressEvent {
    Hello {
        total_pages: u32,
    },
    Init {
        files: Vec<FileMeta>,
    },
    FileStart {
        file: String,
        pages: u32,
    },
    PageDone {
        file: String,
        /// 1-based
        page: u32,
        #[serde(rename = "newName")]
        new_name: String,
    },
    Finished(JobOutcome),
    Cancelled(JobOutcome),
    Metric {
        pages: u32,
        /// Elapsed seconds
        time: f64,
        /// Peak resident memory in MiB
        ram: f64,
    },
    Error {
        message: String,
    },
}

impl ProgressEvent {
    /// Wire name of the event kind
    pub fn kind(&self) -> &'static str {
        match self {
            ProgressEvent::Hello { .. } => "hello",
            ProgressEvent::Init { .. } => "init",
            ProgressEvent::FileStart { .. } => "file_start",
            ProgressEvent::PageDone { .. } => "page_done",
            ProgressEvent::Finished(_) => "finished",
            ProgressEvent::Cancelled(_) => "cancelled",
            ProgressEvent::Metric { .. } => "metric",
            ProgressEvent::Error { .. } => "error",
        }
    }

    /// Whether this event ends the job's event sequence
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Finished(_)
                | ProgressEvent::Cancelled(_)
                | ProgressEvent::Metric { .. }
                | ProgressEvent::Error { .. }
        )
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Receiver of progress events emitted by the page splitter.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn emit(&self, event: ProgressEvent) {
        self(event)
    }
}
