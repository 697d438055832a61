//! Per-owner serial execution of mutation jobs
//!
//! Each queue owns one tokio task that drains an unbounded channel of boxed
//! futures and awaits them one at a time. A submitted job runs to completion
//! even if the submitter stops waiting for it.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::errors::{SyncError, SyncResult};

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A single-worker FIFO of async jobs
#[derive(Debug)]
pub struct SerialQueue {
    label: String,
    sender: mpsc::UnboundedSender<Job>,
    pending: Arc<AtomicUsize>,
    worker: JoinHandle<()>,
}

impl SerialQueue {
    /// Spawn the worker task; must be called inside a tokio runtime
    pub fn spawn(label: impl Into<String>) -> Self {
        let label = label.into();
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        let pending = Arc::new(AtomicUsize::new(0));

        let worker_label = label.clone();
        let worker_pending = Arc::clone(&pending);
        let worker = tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                job.await;
                worker_pending.fetch_sub(1, Ordering::SeqCst);
            }
            debug!("Serial queue {} drained and stopped", worker_label);
        });

        Self {
            label,
            sender,
            pending,
            worker,
        }
    }

    /// Enqueue `job` and wait for its output
    ///
    /// # Errors
    ///
    /// `SyncError::QueueClosed` if the worker is gone before the job could
    /// report back.
    pub async fn submit<F, T>(&self, job: F) -> SyncResult<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply, outcome) = oneshot::channel();
        let wrapped: Job = Box::pin(async move {
            // Submitter may have given up; the job still ran
            let _ = reply.send(job.await);
        });

        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.sender.send(wrapped).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(SyncError::QueueClosed);
        }

        outcome.await.map_err(|_| SyncError::QueueClosed)
    }

    /// Jobs submitted and not yet finished
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed() || self.worker.is_finished()
    }
}
