//! Bounded task queue for remote store I/O.
//!
//! The remote store throws rate-limit errors when too many files are moved
//! in parallel, so every upload and download is funneled through a
//! [`TaskQueue`]: a fixed number of worker slots handed out in FIFO order,
//! with transient failures retried per the queue's [`RetryConfig`].
//!
//! The queue makes no ordering promises across destination paths. Callers
//! that need same-path ordering must not submit overlapping tasks for that
//! path — the orchestrator serializes merges per destination file for
//! exactly this reason.
//!
//! Queues are plain values owned by their component; there is no
//! process-wide queue state.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::debug;

use crate::retry::{retry_transient, RetryConfig, Transient};

pub struct TaskQueue {
    name: &'static str,
    slots: Arc<Semaphore>,
    pending: AtomicUsize,
    retry: RetryConfig,
}

impl TaskQueue {
    /// Create a queue with a fixed number of concurrent worker slots.
    #[must_use]
    pub fn new(name: &'static str, slots: usize, retry: RetryConfig) -> Self {
        Self {
            name,
            slots: Arc::new(Semaphore::new(slots)),
            pending: AtomicUsize::new(0),
            retry,
        }
    }

    /// Number of tasks submitted but not yet resolved, including the ones
    /// currently holding a worker slot. Observable for backpressure-aware
    /// logging.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Submit a task targeting `destination` and wait for its terminal
    /// result.
    ///
    /// The task waits for a worker slot (FIFO), then runs under the queue's
    /// retry policy: transient failures are retried with backoff up to the
    /// attempt bound, anything else resolves the task immediately. Every
    /// submitted task resolves exactly once; failures propagate to the
    /// caller and are never dropped.
    pub async fn submit<F, Fut, T, E>(&self, destination: &str, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display + Transient,
    {
        let depth = self.pending.fetch_add(1, Ordering::AcqRel) + 1;
        crate::metrics::set_queue_depth(self.name, depth);
        debug!(queue = self.name, destination, depth, "task enqueued");

        let _guard = PendingGuard { queue: self };

        // The semaphore lives as long as the queue and is never closed.
        let _permit = self
            .slots
            .acquire()
            .await
            .expect("task queue semaphore closed");

        let result = retry_transient(destination, &self.retry, operation).await;
        crate::metrics::record_task(self.name, if result.is_ok() { "success" } else { "error" });
        result
    }
}

struct PendingGuard<'a> {
    queue: &'a TaskQueue,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let depth = self.queue.pending.fetch_sub(1, Ordering::AcqRel) - 1;
        crate::metrics::set_queue_depth(self.queue.name, depth);
    }
}
