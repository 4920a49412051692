//! Process memory sampling for metrics runs

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Resident memory of process `pid` in bytes, if the platform reports it.
///
/// Only that process's memory is refreshed.
pub fn current_rss_bytes(sys: &mut System, pid: Pid) -> Option<u64> {
    sys.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        ProcessRefreshKind::new().with_memory(),
    );
    sys.process(pid).map(|p| p.memory())
}

/// Bytes to MiB, rounded to one decimal
pub fn bytes_to_mib(bytes: u64) -> f64 {
    (bytes as f64 / 1024.0 / 1024.0 * 10.0).round() / 10.0
}

/// Samples resident memory on a background thread and keeps the peak.
pub struct PeakMemorySampler {
    stop: Arc<AtomicBool>,
    peak: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl PeakMemorySampler {
    pub fn start(interval: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let peak = Arc::new(AtomicU64::new(0));

        let handle = {
            let stop = Arc::clone(&stop);
            let peak = Arc::clone(&peak);
            std::thread::Builder::new()
                .name("memory-sampler".into())
                .spawn(move || {
                    let pid = match sysinfo::get_current_pid() {
                        Ok(pid) => pid,
                        Err(e) => {
                            tracing::warn!("Memory sampling disabled: {}", e);
                            return;
                        }
                    };
                    let mut sys = System::new();
                    loop {
                        if let Some(rss) = current_rss_bytes(&mut sys, pid) {
                            peak.fetch_max(rss, Ordering::Relaxed);
                        }
                        if stop.load(Ordering::Relaxed) {
                            break;
                        }
                        std::thread::sleep(interval);
                    }
                })
        };

        let handle = match handle {
            Ok(h) => Some(h),
            Err(e) => {
                tracing::warn!("Memory sampler unavailable: {}", e);
                None
            }
        };

        Self { stop, peak, handle }
    }

    /// Stop sampling and return the peak in MiB (`0.0` if nothing was read)
    pub fn finish(mut self) -> f64 {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        bytes_to_mib(self.peak.load(Ordering::Relaxed))
    }
}

impl Drop for PeakMemorySampler {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}
