//! Timesheet PDF splitting
//!
//! Splits multi-page timesheet PDFs into one file per page, named after the
//! employee found in the page text, and packages the results into a zip.
//!
//! - `normalize` / `extract` / `sanitize`: text to candidate name to filename
//! - `splitter`: one document, page by page
//! - `orchestrator`: background jobs with cancellation and archive packaging
//! - `broadcast`: progress fan-out with a first-observer replay buffer

pub mod archive;
pub mod broadcast;
pub mod config;
pub mod document;
pub mod error;
pub mod events;
pub mod extract;
pub mod job;
pub mod memory;
pub mod normalize;
pub mod orchestrator;
pub mod sanitize;
pub mod splitter;
pub mod stats;

pub use archive::{make_zip, ArchiveNaming};
pub use broadcast::{JobEmitter, Observer, ProgressBroadcaster};
pub use config::SplitterConfig;
pub use document::{DocumentLoader, LopdfLoader, SourceDocument};
pub use error::{PontoSplitError, Result};
pub use events::{FileMeta, JobOutcome, ProgressEvent, ProgressSink};
pub use extract::extract_name;
pub use job::{Job, JobId, JobOptions, JobState, JobStore};
pub use normalize::normalize_text;
pub use orchestrator::{JobRunner, SubmitReceipt};
pub use sanitize::{sanitize_filename, sanitize_name_tokens};
pub use splitter::Splitter;
pub use stats::{FileStats, JobStatistics};
