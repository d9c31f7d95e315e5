//! Bounded retry queue with a single serial upload worker
//!
//! Producers hand artifacts over through a bounded channel and wait when it
//! is full. The worker keeps a private FIFO backlog: tasks are pulled from the
//! channel in arrival order, and a failed task is appended behind everything
//! that arrived before its failure. Only the worker touches the backlog, so no
//! locking is needed around it.

use crate::backoff::RetryPolicy;
use crate::quarantine::{Quarantine, QuarantineError};
use crate::task::{DeliveryTask, Disposition};
use crate::uploader::Uploader;
use async_trait::async_trait;
use monitor_core::ArtifactSink;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Default number of tasks buffered before producers wait
pub const DEFAULT_CAPACITY: usize = 100;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Delivery queue is closed, cannot enqueue {0}")]
    Closed(PathBuf),

    #[error(transparent)]
    Quarantine(#[from] QuarantineError),
}

/// Counters describing what the worker has done so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    pub delivered: u64,
    pub retried: u64,
    pub quarantined: u64,
    pub quarantine_failures: u64,
}

#[derive(Default)]
struct Counters {
    delivered: AtomicU64,
    retried: AtomicU64,
    quarantined: AtomicU64,
    quarantine_failures: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> DeliveryStats {
        DeliveryStats {
            delivered: self.delivered.load(Ordering::SeqCst),
            retried: self.retried.load(Ordering::SeqCst),
            quarantined: self.quarantined.load(Ordering::SeqCst),
            quarantine_failures: self.quarantine_failures.load(Ordering::SeqCst),
        }
    }
}

/// Handle to the delivery pipeline
pub struct RetryQueue {
    tx: parking_lot::Mutex<Option<mpsc::Sender<DeliveryTask>>>,
    worker: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl RetryQueue {
    /// Spawn the worker and return the queue handle
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        uploader: Arc<dyn Uploader>,
        policy: RetryPolicy,
        quarantine: Quarantine,
        capacity: usize,
    ) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let counters = Arc::new(Counters::default());

        let worker = Worker {
            rx,
            uploader,
            policy,
            quarantine,
            backlog: VecDeque::with_capacity(capacity),
            capacity,
            counters: Arc::clone(&counters),
        };
        let handle = tokio::spawn(worker.run());

        Self {
            tx: parking_lot::Mutex::new(Some(tx)),
            worker: tokio::sync::Mutex::new(Some(handle)),
            counters,
        }
    }

    /// Append an artifact with a fresh attempt count
    ///
    /// Waits while the queue is full.
    pub async fn enqueue(&self, artifact: PathBuf) -> Result<(), DeliveryError> {
        let tx = self.tx.lock().clone();
        let Some(tx) = tx else {
            return Err(DeliveryError::Closed(artifact));
        };

        debug!("Enqueueing {}", artifact.display());
        tx.send(DeliveryTask::new(artifact))
            .await
            .map_err(|e| DeliveryError::Closed(e.0.artifact))
    }

    /// Stop accepting tasks, drain what is queued and wait for the worker
    ///
    /// Safe to call more than once; later calls return once the worker is gone.
    pub async fn close(&self) {
        drop(self.tx.lock().take());

        let mut worker = self.worker.lock().await;
        if let Some(handle) = worker.take() {
            if let Err(e) = handle.await {
                error!("Delivery worker panicked: {}", e);
            }
            let stats = self.stats();
            info!(
                "Delivery queue closed: {} delivered, {} retries, {} quarantined",
                stats.delivered, stats.retried, stats.quarantined
            );
        }
    }

    pub fn stats(&self) -> DeliveryStats {
        self.counters.snapshot()
    }
}

#[async_trait]
impl ArtifactSink for RetryQueue {
    async fn submit(&self, artifact: PathBuf) -> anyhow::Result<()> {
        Ok(self.enqueue(artifact).await?)
    }
}

struct Worker {
    rx: mpsc::Receiver<DeliveryTask>,
    uploader: Arc<dyn Uploader>,
    policy: RetryPolicy,
    quarantine: Quarantine,
    backlog: VecDeque<DeliveryTask>,
    capacity: usize,
    counters: Arc<Counters>,
}

impl Worker {
    async fn run(mut self) {
        loop {
            self.pull_arrived();

            let task = match self.backlog.pop_front() {
                Some(task) => task,
                None => match self.rx.recv().await {
                    Some(task) => task,
                    // Closed and fully drained
                    None => break,
                },
            };

            self.process(task).await;
        }

        debug!("Delivery worker exiting");
    }

    /// Move already-arrived tasks from the channel into the backlog
    fn pull_arrived(&mut self) {
        while self.backlog.len() < self.capacity {
            match self.rx.try_recv() {
                Ok(task) => self.backlog.push_back(task),
                Err(_) => break,
            }
        }
    }

    async fn process(&mut self, mut task: DeliveryTask) {
        if let Some(not_before) = task.not_before.take() {
            tokio::time::sleep_until(not_before).await;
        }

        let err = match self.uploader.upload(&task.artifact).await {
            Ok(()) => {
                info!("Successfully uploaded: {}", task.artifact.display());
                self.counters.delivered.fetch_add(1, Ordering::SeqCst);
                return;
            }
            Err(e) => e,
        };

        match task.record_failure(self.policy.max_retries) {
            Disposition::Retry => {
                let delay = self.policy.delay_for_retry(task.attempts);
                warn!(
                    "Upload failed, retrying ({}/{}) in {:?}: {}: {:#}",
                    task.attempts,
                    self.policy.max_retries,
                    delay,
                    task.artifact.display(),
                    err
                );
                if !delay.is_zero() {
                    task.not_before = Some(Instant::now() + delay);
                }
                self.counters.retried.fetch_add(1, Ordering::SeqCst);

                // Everything that arrived before this failure goes first
                self.pull_arrived();
                self.backlog.push_back(task);
            }
            Disposition::Quarantine => {
                error!(
                    "Upload failed after {} retries: {}: {:#}",
                    task.attempts,
                    task.artifact.display(),
                    err
                );
                match self.quarantine.admit(&task.artifact).await {
                    Ok(dest) => {
                        warn!("Moved to failed directory: {}", dest.display());
                        self.counters.quarantined.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(e) => {
                        error!("{}; artifact left in place", e);
                        self.counters.quarantine_failures.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }
        }
    }
}
