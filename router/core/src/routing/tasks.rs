//! Background Task Tracking
//!
//! Replica writes and secondary deletes run detached from the call that
//! started them, but never unmanaged: every one is spawned into a shared
//! [`JoinSet`] so its outcome is logged and counted, and [`BackgroundTasks::drain`]
//! can wait for (or abort) whatever is still running at shutdown.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::metrics::Counter;
use crate::document::BackendId;
use crate::error::BackendResult;

/// What a background task is doing
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// Copying freshly written documents to the secondary
    Replication,
    /// Deleting ids from the secondary
    Delete,
}

impl TaskKind {
    /// Stable name for logs
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Replication => "replication",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default)]
struct TaskStats {
    spawned: Counter,
    succeeded: Counter,
    failed: Counter,
    refused: Counter,
    aborted: Counter,
}

/// Point-in-time view of background task activity
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundTaskStats {
    /// Tasks started
    pub spawned: u64,
    /// Tasks whose backend call succeeded
    pub succeeded: u64,
    /// Tasks whose backend call failed or panicked
    pub failed: u64,
    /// Spawns rejected after shutdown began
    pub refused: u64,
    /// Tasks cancelled by a drain timeout
    pub aborted: u64,
    /// Tasks still running
    pub in_flight: u64,
}

/// Result of [`BackgroundTasks::drain`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Tasks that finished during the drain
    pub completed: usize,
    /// Tasks still running at the deadline and aborted
    pub aborted: usize,
}

struct Inner {
    set: JoinSet<()>,
    closed: bool,
}

/// Tracker for detached backend calls
///
/// Dropping the tracker aborts whatever is still running. Call
/// [`drain`](Self::drain) first to let replicas land.
pub struct BackgroundTasks {
    inner: Mutex<Inner>,
    stats: Arc<TaskStats>,
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BackgroundTasks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundTasks")
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl BackgroundTasks {
    /// Create an open tracker with no tasks
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                set: JoinSet::new(),
                closed: false,
            }),
            stats: Arc::new(TaskStats::default()),
        }
    }

    /// Run `future` in the background and log its outcome
    ///
    /// Returns `false` (and drops the future) once [`drain`](Self::drain) has
    /// been called. Must be called from within a Tokio runtime.
    pub fn spawn<F>(&self, kind: TaskKind, backend: BackendId, future: F) -> bool
    where
        F: Future<Output = BackendResult<()>> + Send + 'static,
    {
        let mut inner = self.inner.lock();
        if inner.closed {
            self.stats.refused.inc();
            warn!(kind = %kind, backend = %backend, "Background task refused: shutting down");
            return false;
        }
        reap(&mut inner.set, &self.stats);

        let stats = Arc::clone(&self.stats);
        inner.set.spawn(async move {
            match future.await {
                Ok(()) => {
                    stats.succeeded.inc();
                    debug!(kind = %kind, backend = %backend, "Background task completed");
                }
                Err(e) => {
                    stats.failed.inc();
                    warn!(
                        kind = %kind,
                        backend = %backend,
                        error_kind = e.kind(),
                        error = %e,
                        "Background task failed"
                    );
                }
            }
        });
        self.stats.spawned.inc();
        true
    }

    /// Number of tasks that have not finished yet
    pub fn in_flight(&self) -> usize {
        let mut inner = self.inner.lock();
        reap(&mut inner.set, &self.stats);
        inner.set.len()
    }

    /// Counters plus the current in-flight count
    pub fn stats(&self) -> BackgroundTaskStats {
        let in_flight = self.in_flight() as u64;
        BackgroundTaskStats {
            spawned: self.stats.spawned.get(),
            succeeded: self.stats.succeeded.get(),
            failed: self.stats.failed.get(),
            refused: self.stats.refused.get(),
            aborted: self.stats.aborted.get(),
            in_flight,
        }
    }

    /// Whether [`drain`](Self::drain) has been called
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Stop accepting tasks, wait up to `timeout` for running ones, abort the rest
    pub async fn drain(&self, timeout: Duration) -> DrainReport {
        let mut set = {
            let mut inner = self.inner.lock();
            inner.closed = true;
            std::mem::take(&mut inner.set)
        };

        let pending = set.len();
        if pending == 0 {
            return DrainReport::default();
        }
        info!(pending, timeout_ms = timeout.as_millis() as u64, "Draining background tasks");

        let mut completed = 0;
        let wait_all = async {
            while let Some(result) = set.join_next().await {
                completed += 1;
                if let Err(e) = result {
                    self.stats.failed.inc();
                    warn!(error = %e, "Background task panicked");
                }
            }
        };
        let _ = tokio::time::timeout(timeout, wait_all).await;

        let aborted = set.len();
        if aborted > 0 {
            warn!(aborted, "Background tasks still running at drain deadline; aborting");
            set.shutdown().await;
            for _ in 0..aborted {
                self.stats.aborted.inc();
            }
        }

        DrainReport { completed, aborted }
    }
}

impl Drop for BackgroundTasks {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        reap(&mut inner.set, &self.stats);
        let abandoned = inner.set.len();
        if abandoned > 0 {
            warn!(abandoned, "Background tasks dropped without drain; aborting");
            for _ in 0..abandoned {
                self.stats.aborted.inc();
            }
        }
    }
}

/// Collect finished tasks without waiting
fn reap(set: &mut JoinSet<()>, stats: &TaskStats) {
    while let Some(result) = set.try_join_next() {
        if let Err(e) = result {
            stats.failed.inc();
            warn!(error = %e, "Background task panicked");
        }
    }
}
