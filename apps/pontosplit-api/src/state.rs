//! Application state for the splitting service

use pontosplit_core::{
    DocumentLoader, JobRunner, JobStore, LopdfLoader, ProgressBroadcaster, SplitterConfig,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<JobRunner>,
}

impl AppState {
    /// State backed by lopdf
    pub fn new(config: SplitterConfig) -> Self {
        Self::with_loader(config, Arc::new(LopdfLoader))
    }

    pub fn with_loader(config: SplitterConfig, loader: Arc<dyn DocumentLoader>) -> Self {
        tracing::info!("Job data under {}", config.data_dir.display());
        let runner = JobRunner::new(
            Arc::new(JobStore::new()),
            Arc::new(ProgressBroadcaster::new()),
            loader,
            config,
        );
        Self {
            runner: Arc::new(runner),
        }
    }

    pub fn config(&self) -> &SplitterConfig {
        self.runner.config()
    }
}
