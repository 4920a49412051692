//! Job orchestration
//!
//! One background worker per job. The worker walks the inputs in submission
//! order on a blocking thread, feeding each through the [`Splitter`], then
//! packages the results and emits exactly one terminal event. Failures are
//! caught here and surface only as an `error` event.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;

use crate::archive::{make_zip, PARTIAL_ARCHIVE_NAME};
use crate::broadcast::{JobEmitter, ProgressBroadcaster};
use crate::config::SplitterConfig;
use crate::document::DocumentLoader;
use crate::error::{PontoSplitError, Result};
use crate::events::{FileMeta, JobOutcome, ProgressEvent, ProgressSink};
use crate::job::{Job, JobId, JobOptions, JobState, JobStore};
use crate::memory::PeakMemorySampler;
use crate::sanitize::safe_identifier;
use crate::splitter::{display_name, document_dir_name, Splitter};

/// Returned to the submitter as soon as the job is accepted
#[derive(Debug, Clone, Serialize)]
pub struct SubmitReceipt {
    pub job_id: JobId,
    pub total_pages: u32,
    pub files: Vec<FileMeta>,
}

pub struct JobRunner {
    store: Arc<JobStore>,
    broadcaster: Arc<ProgressBroadcaster>,
    loader: Arc<dyn DocumentLoader>,
    config: SplitterConfig,
}

impl JobRunner {
    pub fn new(
        store: Arc<JobStore>,
        broadcaster: Arc<ProgressBroadcaster>,
        loader: Arc<dyn DocumentLoader>,
        config: SplitterConfig,
    ) -> Self {
        Self {
            store,
            broadcaster,
            loader,
            config,
        }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    pub fn broadcaster(&self) -> &Arc<ProgressBroadcaster> {
        &self.broadcaster
    }

    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    /// Directory owned by a job
    pub fn job_dir(&self, id: &JobId) -> PathBuf {
        self.config.data_dir.join(id.as_str())
    }

    /// Open each input once to read its page count. Inputs that fail to
    /// open are left out; the worker reports them when it reaches them.
    pub fn describe_inputs(&self, inputs: &[PathBuf]) -> Vec<FileMeta> {
        inputs
            .iter()
            .filter_map(|path| match self.loader.open(path) {
                Ok(doc) => {
                    let file = display_name(path);
                    Some(FileMeta {
                        id: safe_identifier(&file),
                        pages: doc.page_count(),
                        file,
                    })
                }
                Err(e) => {
                    tracing::warn!("Could not inspect {}: {}", path.display(), e);
                    None
                }
            })
            .collect()
    }

    /// Register a job in the store and broadcaster without starting it
    pub fn prepare(&self, id: JobId, inputs: Vec<PathBuf>, options: JobOptions) -> Arc<Job> {
        let files = self.describe_inputs(&inputs);
        let job = Job::new(id.clone(), self.job_dir(&id), inputs, options).with_files(files);
        self.broadcaster
            .register(&job.id, job.total_pages, job.files.clone());
        self.store.insert(job)
    }

    /// Accept a job and start its background worker.
    ///
    /// Inputs must already be on disk. Returns without waiting for the job.
    pub async fn submit(
        self: &Arc<Self>,
        id: JobId,
        inputs: Vec<PathBuf>,
        options: JobOptions,
    ) -> Result<SubmitReceipt> {
        let runner = Arc::clone(self);
        let job = tokio::task::spawn_blocking(move || runner.prepare(id, inputs, options))
            .await
            .map_err(|e| PontoSplitError::OperationError(format!("Submit failed: {}", e)))?;

        tracing::info!(
            "Accepted job {} ({} files, {} pages, metrics_only={})",
            job.id,
            job.inputs.len(),
            job.total_pages,
            job.options.metrics_only
        );

        let receipt = SubmitReceipt {
            job_id: job.id.clone(),
            total_pages: job.total_pages,
            files: job.files.clone(),
        };
        self.spawn(job);
        Ok(receipt)
    }

    /// Run the job on a blocking thread, then schedule cleanup.
    pub fn spawn(self: &Arc<Self>, job: Arc<Job>) -> JoinHandle<()> {
        let runner = Arc::clone(self);
        tokio::spawn(async move {
            let worker = {
                let runner = Arc::clone(&runner);
                let job = Arc::clone(&job);
                tokio::task::spawn_blocking(move || runner.run(&job))
            };

            if let Err(e) = worker.await {
                tracing::error!("Worker for job {} aborted: {}", job.id, e);
                job.advance(JobState::Failed);
                runner.broadcaster.emit(
                    job.id.as_str(),
                    ProgressEvent::Error {
                        message: format!("Worker aborted: {}", e),
                    },
                );
            }

            runner.cleanup_after_delay(job).await;
        })
    }

    /// Process the job to completion on the current thread.
    ///
    /// Always emits exactly one terminal event.
    pub fn run(&self, job: &Job) {
        let sink = JobEmitter::new(Arc::clone(&self.broadcaster), job.id.clone());
        job.advance(JobState::Running);

        let result = if job.options.metrics_only {
            self.run_metrics(job, &sink)
        } else {
            self.run_normal(job, &sink)
        };

        match result {
            Ok(event) => {
                let state = match &event {
                    ProgressEvent::Cancelled(_) => JobState::Cancelled,
                    _ => JobState::Finished,
                };
                job.advance(state);
                tracing::info!("Job {} ended: {}", job.id, event.kind());
                sink.emit(event);
            }
            Err(e) => {
                tracing::error!("Job {} failed: {}", job.id, e);
                job.advance(JobState::Failed);
                sink.emit(ProgressEvent::Error {
                    message: e.to_string(),
                });
            }
        }
    }

    fn download_url(&self, job: &Job, archive: &str) -> String {
        format!(
            "{}/{}/out/{}",
            self.config.download_prefix.trim_end_matches('/'),
            job.id,
            archive
        )
    }

    fn run_normal(&self, job: &Job, sink: &dyn ProgressSink) -> Result<ProgressEvent> {
        let root = job.processing_root();
        std::fs::create_dir_all(&root)?;

        let is_cancelled = || job.is_cancelled();
        let splitter = Splitter {
            loader: self.loader.as_ref(),
            sink,
            is_cancelled: &is_cancelled,
            compress: job.options.compress,
        };

        for source in &job.inputs {
            if job.is_cancelled() {
                break;
            }
            let doc_dir = root.join(document_dir_name(&display_name(source)));
            let stats = splitter.split(source, Some(&doc_dir))?;
            job.record_file(stats);
        }

        let summary = job.statistics();
        let out_dir = job.out_dir();
        let mut urls = Vec::new();

        if job.is_cancelled() {
            match self.package_partial(&root, &out_dir) {
                Ok(()) => urls.push(self.download_url(job, PARTIAL_ARCHIVE_NAME)),
                Err(e) => tracing::warn!("Job {}: partial archive failed: {}", job.id, e),
            }
            return Ok(ProgressEvent::Cancelled(JobOutcome { urls, summary }));
        }

        if !job.inputs.is_empty() {
            let archive = self.config.naming.archive_name(&job.input_filenames());
            make_zip(&root, &out_dir.join(&archive))?;
            urls.push(self.download_url(job, &archive));
        }

        Ok(ProgressEvent::Finished(JobOutcome { urls, summary }))
    }

    fn package_partial(&self, root: &Path, out_dir: &Path) -> Result<()> {
        let zip_path = out_dir.join(PARTIAL_ARCHIVE_NAME);
        if !zip_path.exists() {
            make_zip(root, &zip_path)?;
        }
        Ok(())
    }

    fn run_metrics(&self, job: &Job, sink: &dyn ProgressSink) -> Result<ProgressEvent> {
        let sampler = PeakMemorySampler::start(self.config.memory_sample_interval);
        let started = Instant::now();

        let is_cancelled = || job.is_cancelled();
        let splitter = Splitter {
            loader: self.loader.as_ref(),
            sink,
            is_cancelled: &is_cancelled,
            compress: job.options.compress,
        };

        let mut pages = 0;
        for source in &job.inputs {
            if job.is_cancelled() {
                break;
            }
            let stats = splitter.split(source, None)?;
            pages += stats.pages;
            job.record_file(stats);
        }

        let time = (started.elapsed().as_secs_f64() * 100.0).round() / 100.0;
        let ram = sampler.finish();
        tracing::info!(
            "Job {} metrics: {} pages in {}s, peak {} MiB",
            job.id,
            pages,
            time,
            ram
        );

        Ok(ProgressEvent::Metric { pages, time, ram })
    }

    /// Best-effort removal of the job's files and registry entries after the
    /// configured grace delay
    pub async fn cleanup_after_delay(&self, job: Arc<Job>) {
        tokio::time::sleep(self.config.cleanup_delay).await;

        match tokio::fs::remove_dir_all(&job.job_dir).await {
            Ok(()) => tracing::debug!("Removed {}", job.job_dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Cleanup of {} failed: {}", job.job_dir.display(), e),
        }
        self.store.remove(job.id.as_str());
        self.broadcaster.remove(job.id.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{GENERIC_ARCHIVE_NAME, NO_ID_ARCHIVE_NAME};
    use crate::broadcast::Observer;
    use crate::document::memory::MemoryLoader;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn runner(loader: MemoryLoader, data_dir: &Path) -> Arc<JobRunner> {
        Arc::new(JobRunner::new(
            Arc::new(JobStore::new()),
            Arc::new(ProgressBroadcaster::new()),
            Arc::new(loader),
            SplitterConfig::default().with_data_dir(data_dir),
        ))
    }

    fn drain(observer: &mut Observer) -> Vec<ProgressEvent> {
        let mut out = Vec::new();
        while let Ok(event) = observer.events.try_recv() {
            out.push(event);
        }
        out
    }

    fn named(name: &str) -> String {
        format!("EMPREGADO: 1 {} CARGO: X", name)
    }

    #[test]
    fn test_normal_run_end_to_end() {
        let data = tempfile::tempdir().unwrap();
        let page1 = named("JOAO DA SILVA");
        let page3 = named("MARIA SOUZA");
        let loader = MemoryLoader::default().with_document(
            "/in/ponto 4321.pdf",
            vec![Some(page1.as_str()), Some("no name"), Some(page3.as_str())],
        );
        let runner = runner(loader, data.path());
        let job = runner.prepare(
            JobId::from("job1"),
            vec![PathBuf::from("/in/ponto 4321.pdf")],
            JobOptions::default(),
        );
        assert_eq!(job.total_pages, 3);

        runner.run(&job);
        assert_eq!(job.state(), JobState::Finished);

        let mut observer = runner.broadcaster().attach("job1").unwrap();
        let events = drain(&mut observer);
        let kinds: Vec<&str> = events.iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec!["hello", "init", "file_start", "page_done", "page_done", "page_done", "finished"]
        );

        let ProgressEvent::Finished(outcome) = events.last().unwrap() else {
            panic!("expected finished");
        };
        assert_eq!(outcome.summary.renamed, 2);
        assert_eq!(outcome.summary.manual, 1);
        assert_eq!(outcome.urls, vec!["/data/job1/out/4321.zip".to_string()]);
        assert!(data.path().join("job1/out/4321.zip").exists());
        assert!(data
            .path()
            .join("job1/out/processed/ponto 4321/MANUAL_ponto 4321_2.pdf")
            .exists());
    }

    #[test]
    fn test_dot_only_document_name_keeps_pages_in_archive() {
        let data = tempfile::tempdir().unwrap();
        let page = named("JOAO DA SILVA");
        let loader =
            MemoryLoader::default().with_document("/in/...pdf", vec![Some(page.as_str())]);
        let runner = runner(loader, data.path());
        let job = runner.prepare(
            JobId::from("dots"),
            vec![PathBuf::from("/in/...pdf")],
            JobOptions::default(),
        );

        runner.run(&job);
        assert_eq!(job.state(), JobState::Finished);

        let out = data.path().join("dots/out");
        assert!(out.join("processed/_/JOAO DA SILVA.pdf").exists());
        assert!(!out.join("JOAO DA SILVA.pdf").exists());

        let archive = out.join(NO_ID_ARCHIVE_NAME);
        let zip = zip::ZipArchive::new(std::fs::File::open(&archive).unwrap()).unwrap();
        let entries: Vec<&str> = zip.file_names().collect();
        assert_eq!(entries, vec!["_/JOAO DA SILVA.pdf"]);
    }

    #[test]
    fn test_archive_falls_back_to_generic_label() {
        let data = tempfile::tempdir().unwrap();
        let loader = MemoryLoader::default()
            .with_document("/in/janeiro.pdf", vec![Some("x")])
            .with_document("/in/fevereiro.pdf", vec![Some("y")]);
        let runner = runner(loader, data.path());
        let job = runner.prepare(
            JobId::from("job2"),
            vec![PathBuf::from("/in/janeiro.pdf"), PathBuf::from("/in/fevereiro.pdf")],
            JobOptions::default(),
        );
        runner.run(&job);

        let mut observer = runner.broadcaster().attach("job2").unwrap();
        let events = drain(&mut observer);
        let ProgressEvent::Finished(outcome) = events.last().unwrap() else {
            panic!("expected finished");
        };
        assert_eq!(outcome.urls, vec![format!("/data/job2/out/{}", NO_ID_ARCHIVE_NAME)]);
        assert_eq!(outcome.summary.files.len(), 2);
    }

    #[test]
    fn test_many_inputs_use_generic_archive() {
        let data = tempfile::tempdir().unwrap();
        let mut loader = MemoryLoader::default();
        let mut inputs = Vec::new();
        for i in 0..6 {
            let path = format!("/in/doc {}00.pdf", i + 1);
            loader = loader.with_document(path.as_str(), vec![Some("x")]);
            inputs.push(PathBuf::from(path));
        }
        let runner = runner(loader, data.path());
        let job = runner.prepare(JobId::from("job3"), inputs, JobOptions::default());
        runner.run(&job);
        assert!(data
            .path()
            .join("job3/out")
            .join(GENERIC_ARCHIVE_NAME)
            .exists());
    }

    #[test]
    fn test_cancelled_before_start_packages_partial() {
        let data = tempfile::tempdir().unwrap();
        let loader = MemoryLoader::default().with_document("/in/a 100.pdf", vec![Some("x")]);
        let runner = runner(loader, data.path());
        let job = runner.prepare(
            JobId::from("job4"),
            vec![PathBuf::from("/in/a 100.pdf")],
            JobOptions::default(),
        );
        runner.store().cancel("job4").unwrap();
        runner.run(&job);

        assert_eq!(job.state(), JobState::Cancelled);
        let mut observer = runner.broadcaster().attach("job4").unwrap();
        let events = drain(&mut observer);
        assert!(!events.iter().any(|e| e.kind() == "page_done"));
        let ProgressEvent::Cancelled(outcome) = events.last().unwrap() else {
            panic!("expected cancelled");
        };
        assert_eq!(outcome.summary.processed(), 0);
        assert_eq!(
            outcome.urls,
            vec![format!("/data/job4/out/{}", PARTIAL_ARCHIVE_NAME)]
        );
    }

    #[test]
    fn test_open_failure_reports_error() {
        let data = tempfile::tempdir().unwrap();
        let runner = runner(MemoryLoader::default(), data.path());
        let job = runner.prepare(
            JobId::from("job5"),
            vec![PathBuf::from("/in/missing.pdf")],
            JobOptions::default(),
        );
        assert!(job.files.is_empty());
        runner.run(&job);

        assert_eq!(job.state(), JobState::Failed);
        let mut observer = runner.broadcaster().attach("job5").unwrap();
        let events = drain(&mut observer);
        assert_eq!(events.len(), 2);
        match &events[1] {
            ProgressEvent::Error { message } => assert!(message.contains("missing.pdf")),
            other => panic!("expected error, got {:?}", other),
        }
        assert!(!data.path().join("job5/out").join(NO_ID_ARCHIVE_NAME).exists());
    }

    #[test]
    fn test_metrics_run_writes_nothing() {
        let data = tempfile::tempdir().unwrap();
        let page = named("JOAO DA SILVA");
        let loader = MemoryLoader::default()
            .with_document("/in/a.pdf", vec![Some(page.as_str()), Some("x")])
            .with_document("/in/b.pdf", vec![Some("y")]);
        let runner = runner(loader, data.path());
        let job = runner.prepare(
            JobId::from("job6"),
            vec![PathBuf::from("/in/a.pdf"), PathBuf::from("/in/b.pdf")],
            JobOptions {
                compress: true,
                metrics_only: true,
            },
        );
        runner.run(&job);

        let mut observer = runner.broadcaster().attach("job6").unwrap();
        let events = drain(&mut observer);
        match events.last().unwrap() {
            ProgressEvent::Metric { pages, time, ram } => {
                assert_eq!(*pages, 3);
                assert!(*time >= 0.0);
                assert!(*ram >= 0.0);
            }
            other => panic!("expected metric, got {:?}", other),
        }
        assert!(!data.path().join("job6").exists());
    }

    #[tokio::test]
    async fn test_submit_streams_events_and_cleans_up() {
        let data = tempfile::tempdir().unwrap();
        let page = named("ANA PAULA LIMA");
        let loader =
            MemoryLoader::default().with_document("/in/p 555.pdf", vec![Some(page.as_str())]);
        let runner = Arc::new(JobRunner::new(
            Arc::new(JobStore::new()),
            Arc::new(ProgressBroadcaster::new()),
            Arc::new(loader),
            SplitterConfig::default()
                .with_data_dir(data.path())
                .with_cleanup_delay(Duration::from_millis(50)),
        ));

        let receipt = runner
            .submit(
                JobId::from("job7"),
                vec![PathBuf::from("/in/p 555.pdf")],
                JobOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(receipt.total_pages, 1);
        assert_eq!(receipt.files[0].id, "p_555");

        let mut observer = runner.broadcaster().attach("job7").unwrap();
        let mut kinds = Vec::new();
        while let Some(event) = observer.events.recv().await {
            kinds.push(event.kind());
        }
        // Stream ends when cleanup removes the job
        assert_eq!(kinds.first(), Some(&"hello"));
        assert_eq!(kinds.last(), Some(&"finished"));
        assert!(!runner.store().contains("job7"));
        assert!(!data.path().join("job7").exists());
    }
}
