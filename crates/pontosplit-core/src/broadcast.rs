//! Progress fan-out to job observers
//!
//! Workers emit from blocking threads; observers live on the async runtime.
//! Each observer owns an unbounded channel, so emitting never waits on an
//! observer's I/O and the worker cannot deadlock against a slow socket.
//!
//! Events emitted while nobody is watching go to a per-job replay buffer. The
//! first observer to attach receives the buffer once, after which it is
//! retired and every later event is delivered live.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::events::{FileMeta, ProgressEvent, ProgressSink};
use crate::job::JobId;

pub type ObserverId = u64;

/// An attached observer's end of the stream
#[derive(Debug)]
pub struct Observer {
    pub id: ObserverId,
    pub job_id: JobId,
    pub events: mpsc::UnboundedReceiver<ProgressEvent>,
}

#[derive(Debug)]
struct ObserverRegistry {
    total_pages: u32,
    files: Vec<FileMeta>,
    observers: Vec<(ObserverId, mpsc::UnboundedSender<ProgressEvent>)>,
    /// `None` once retired
    buffer: Option<Vec<ProgressEvent>>,
}

#[derive(Debug, Default)]
pub struct ProgressBroadcaster {
    registries: DashMap<JobId, ObserverRegistry>,
    next_observer: AtomicU64,
}

impl ProgressBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the job's registry with an empty replay buffer.
    ///
    /// `total_pages` and `files` are sent to every observer on attach.
    pub fn register(&self, job_id: &JobId, total_pages: u32, files: Vec<FileMeta>) {
        self.registries.insert(
            job_id.clone(),
            ObserverRegistry {
                total_pages,
                files,
                observers: Vec::new(),
                buffer: Some(Vec::new()),
            },
        );
    }

    pub fn is_registered(&self, job_id: &str) -> bool {
        self.registries.contains_key(job_id)
    }

    /// Deliver `event` to every attached observer, or buffer it if none has
    /// attached yet. Observers whose channel is closed are dropped.
    pub fn emit(&self, job_id: &str, event: ProgressEvent) {
        let Some(mut registry) = self.registries.get_mut(job_id) else {
            tracing::debug!("Dropping {} for unregistered job {}", event.kind(), job_id);
            return;
        };

        if registry.observers.is_empty() {
            if let Some(buffer) = registry.buffer.as_mut() {
                buffer.push(event);
                return;
            }
        }

        registry.observers.retain(|(id, tx)| {
            let delivered = tx.send(event.clone()).is_ok();
            if !delivered {
                tracing::debug!("Observer {} of job {} went away", id, job_id);
            }
            delivered
        });
    }

    /// Attach a new observer.
    ///
    /// Its channel is pre-loaded with `hello`, then `init` (when document
    /// metadata is known), then the replay buffer if it has not been retired.
    /// Returns `None` for an unregistered job.
    pub fn attach(&self, job_id: &str) -> Option<Observer> {
        let mut registry = self.registries.get_mut(job_id)?;
        let (tx, rx) = mpsc::unbounded_channel();

        let _ = tx.send(ProgressEvent::Hello {
            total_pages: registry.total_pages,
        });
        if !registry.files.is_empty() {
            let _ = tx.send(ProgressEvent::Init {
                files: registry.files.clone(),
            });
        }
        if let Some(buffer) = registry.buffer.take() {
            tracing::debug!(
                "Replaying {} buffered events to first observer of job {}",
                buffer.len(),
                job_id
            );
            for event in buffer {
                let _ = tx.send(event);
            }
        }

        let id = self.next_observer.fetch_add(1, Ordering::Relaxed);
        registry.observers.push((id, tx));

        Some(Observer {
            id,
            job_id: JobId::from(job_id),
            events: rx,
        })
    }

    pub fn detach(&self, job_id: &str, observer: ObserverId) {
        if let Some(mut registry) = self.registries.get_mut(job_id) {
            registry.observers.retain(|(id, _)| *id != observer);
        }
    }

    pub fn observer_count(&self, job_id: &str) -> usize {
        self.registries
            .get(job_id)
            .map(|r| r.observers.len())
            .unwrap_or(0)
    }

    /// Forget the job. Dropping the senders ends every attached stream.
    pub fn remove(&self, job_id: &str) {
        self.registries.remove(job_id);
    }
}

/// [`ProgressSink`] bound to one job
#[derive(Debug, Clone)]
pub struct JobEmitter {
    broadcaster: Arc<ProgressBroadcaster>,
    job_id: JobId,
}

impl JobEmitter {
    pub fn new(broadcaster: Arc<ProgressBroadcaster>, job_id: JobId) -> Self {
        Self {
            broadcaster,
            job_id,
        }
    }
}

impl ProgressSink for JobEmitter {
    fn emit(&self, event: ProgressEvent) {
        self.broadcaster.emit(self.job_id.as_str(), event);
    }
}
