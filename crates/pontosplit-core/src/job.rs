//! Job records and the job store

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{PontoSplitError, Result};
use crate::events::FileMeta;
use crate::stats::{FileStats, JobStatistics};

const JOB_ID_LEN: usize = 12;
const INPUT_DIR: &str = "in";
const OUTPUT_DIR: &str = "out";
const PROCESSING_DIR: &str = "processed";

/// Opaque job identifier (12 lowercase hex characters)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn generate() -> Self {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(JOB_ID_LEN);
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Borrow<str> for JobId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job lifecycle; terminal states are final
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Created,
    Running,
    Finished,
    Cancelled,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Finished | JobState::Cancelled | JobState::Failed
        )
    }

    fn can_advance_to(self, next: JobState) -> bool {
        match self {
            JobState::Created => matches!(next, JobState::Running | JobState::Failed),
            JobState::Running => next.is_terminal(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobOptions {
    /// Attempt optimized serialization of each page
    pub compress: bool,
    /// Dry run: classify pages, write nothing, report a `metric` event
    pub metrics_only: bool,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            compress: true,
            metrics_only: false,
        }
    }
}

/// A submitted unit of work.
///
/// Owned by the worker processing it; everyone else holds an `Arc` and only
/// reads state or raises the cancellation flag.
#[derive(Debug)]
pub struct Job {
    pub id: JobId,
    /// Source documents in submission order
    pub inputs: Vec<PathBuf>,
    /// `<data>/<id>`; everything the job writes lives below it
    pub job_dir: PathBuf,
    pub options: JobOptions,
    pub total_pages: u32,
    pub files: Vec<FileMeta>,
    cancel: AtomicBool,
    state: Mutex<JobState>,
    stats: Mutex<JobStatistics>,
}

impl Job {
    pub fn new(
        id: JobId,
        job_dir: PathBuf,
        inputs: Vec<PathBuf>,
        options: JobOptions,
    ) -> Self {
        Self {
            id,
            inputs,
            job_dir,
            options,
            total_pages: 0,
            files: Vec::new(),
            cancel: AtomicBool::new(false),
            state: Mutex::new(JobState::Created),
            stats: Mutex::new(JobStatistics::default()),
        }
    }

    /// Attach the per-document metadata gathered at submission
    pub fn with_files(mut self, files: Vec<FileMeta>) -> Self {
        self.total_pages = files.iter().map(|f| f.pages).sum();
        self.files = files;
        self
    }

    pub fn input_dir(job_dir: &Path) -> PathBuf {
        job_dir.join(INPUT_DIR)
    }

    pub fn out_dir(&self) -> PathBuf {
        self.job_dir.join(OUTPUT_DIR)
    }

    /// Root under which each document gets its own page folder
    pub fn processing_root(&self) -> PathBuf {
        self.out_dir().join(PROCESSING_DIR)
    }

    /// Input display names (filename without directory)
    pub fn input_filenames(&self) -> Vec<String> {
        self.inputs
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect()
    }

    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> JobState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move to `next`; returns false (and leaves the state alone) when the
    /// transition is not allowed.
    pub fn advance(&self, next: JobState) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.can_advance_to(next) {
            *state = next;
            true
        } else {
            tracing::warn!("Job {}: refusing transition {:?} -> {:?}", self.id, *state, next);
            false
        }
    }

    pub fn record_file(&self, stats: FileStats) {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .absorb(stats);
    }

    /// Snapshot of the statistics accumulated so far
    pub fn statistics(&self) -> JobStatistics {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Concurrent job registry (job id -> job)
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: DashMap<JobId, Arc<Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: Job) -> Arc<Job> {
        let job = Arc::new(job);
        self.jobs.insert(job.id.clone(), Arc::clone(&job));
        job
    }

    pub fn get(&self, id: &str) -> Option<Arc<Job>> {
        self.jobs.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.jobs.contains_key(id)
    }

    /// Raise the cancellation flag. Idempotent.
    pub fn cancel(&self, id: &str) -> Result<()> {
        let job = self
            .get(id)
            .ok_or_else(|| PontoSplitError::UnknownJob(id.to_string()))?;
        job.request_cancel();
        tracing::info!("Cancellation requested for job {}", id);
        Ok(())
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Job>> {
        self.jobs.remove(id).map(|(_, job)| job)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
