//! Fixed-size worker pool fed by a bounded FIFO queue.
//!
//! # Responsibilities
//! - Run a fixed number of workers for the lifetime of the pool
//! - Queue submitted tasks in FIFO order, bounded by `queue_capacity`
//! - Apply the configured overload policy when the queue is full
//! - Contain task failures and panics at the task boundary

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::observability::metrics;

/// Error type carried out of a failed task.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A unit of work: one boxed future, consumed exactly once.
pub type Task = Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send + 'static>>;

/// What `submit` does when the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverloadPolicy {
    /// Wait for a free queue slot; backpressure reaches the acceptor.
    #[default]
    Block,
    /// Fail immediately with [`PoolError::QueueFull`].
    Reject,
}

impl fmt::Display for OverloadPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverloadPolicy::Block => f.write_str("block"),
            OverloadPolicy::Reject => f.write_str("reject"),
        }
    }
}

/// Error type for pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker pool needs at least one worker and one queue slot")]
    InvalidSize,
    #[error("task queue is full")]
    QueueFull,
    #[error("task queue is closed")]
    Closed,
}

struct Worker {
    id: usize,
    _handle: JoinHandle<()>,
}

/// Pool of workers consuming tasks from a shared bounded queue.
///
/// Workers are never cancelled. Dropping the pool closes the queue; workers
/// finish the tasks already queued and then exit.
pub struct WorkerPool {
    name: Arc<str>,
    sender: mpsc::Sender<Task>,
    workers: Vec<Worker>,
    capacity: usize,
    overload: OverloadPolicy,
}

impl WorkerPool {
    /// Spawn `workers` workers on the current Tokio runtime.
    pub fn new(
        name: impl Into<String>,
        workers: usize,
        queue_capacity: usize,
        overload: OverloadPolicy,
    ) -> Result<Self, PoolError> {
        if workers == 0 || queue_capacity == 0 {
            return Err(PoolError::InvalidSize);
        }

        let name: Arc<str> = Arc::from(name.into());
        let (sender, receiver) = mpsc::channel::<Task>(queue_capacity);
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..workers)
            .map(|id| Worker {
                id,
                _handle: tokio::spawn(work(id, Arc::clone(&name), Arc::clone(&receiver))),
            })
            .collect::<Vec<_>>();

        tracing::info!(
            pool = %name,
            workers = workers.len(),
            queue_capacity,
            overload = %overload,
            "Worker pool started"
        );

        Ok(Self {
            name,
            sender,
            workers,
            capacity: queue_capacity,
            overload,
        })
    }

    /// Queue a task for execution.
    ///
    /// Under [`OverloadPolicy::Block`] this waits while the queue is full.
    pub async fn submit<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let task: Task = Box::pin(task);
        match self.overload {
            OverloadPolicy::Block => self.sender.send(task).await.map_err(|_| PoolError::Closed)?,
            OverloadPolicy::Reject => self.sender.try_send(task).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => PoolError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => PoolError::Closed,
            })?,
        }

        let queued = self.queued();
        metrics::record_queue_depth(&self.name, queued);
        tracing::trace!(pool = %self.name, queued, "Task queued");
        Ok(())
    }

    /// Number of tasks waiting in the queue.
    pub fn queued(&self) -> usize {
        self.capacity - self.sender.capacity()
    }

    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn overload(&self) -> OverloadPolicy {
        self.overload
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.name)
            .field("workers", &self.workers.iter().map(|w| w.id).collect::<Vec<_>>())
            .field("capacity", &self.capacity)
            .field("overload", &self.overload)
            .finish()
    }
}

async fn work(id: usize, pool: Arc<str>, receiver: Arc<Mutex<mpsc::Receiver<Task>>>) {
    loop {
        // Holding the lock across `recv` hands tasks out strictly in order.
        let task = receiver.lock().await.recv().await;
        let Some(task) = task else {
            tracing::debug!(pool = %pool, worker = id, "Task queue closed, worker exiting");
            return;
        };

        tracing::trace!(pool = %pool, worker = id, "Executing task");
        match AssertUnwindSafe(task).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                metrics::record_task_failure(&pool);
                tracing::warn!(pool = %pool, worker = id, error = %err, "Task failed");
            }
            Err(panic) => {
                metrics::record_task_failure(&pool);
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(pool = %pool, worker = id, reason = %reason, "Task panicked");
            }
        }
    }
}
