//! Runtime configuration

use std::path::PathBuf;
use std::time::Duration;

use crate::archive::ArchiveNaming;

#[derive(Debug, Clone)]
pub struct SplitterConfig {
    /// Root holding one `<job id>/` directory per job
    pub data_dir: PathBuf,
    /// URL prefix under which `data_dir` is served
    pub download_prefix: String,
    pub naming: ArchiveNaming,
    /// Grace period between a job's terminal event and deletion of its files
    pub cleanup_delay: Duration,
    /// Default for new jobs
    pub compress: bool,
    pub memory_sample_interval: Duration,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            download_prefix: "/data".to_string(),
            naming: ArchiveNaming::default(),
            cleanup_delay: Duration::from_secs(120),
            compress: true,
            memory_sample_interval: Duration::from_millis(50),
        }
    }
}

impl SplitterConfig {
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn with_cleanup_delay(mut self, delay: Duration) -> Self {
        self.cleanup_delay = delay;
        self
    }

    pub fn with_archive_threshold(mut self, threshold: usize) -> Self {
        self.naming.threshold = threshold;
        self
    }
}
