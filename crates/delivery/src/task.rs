//! Delivery task state

use std::path::PathBuf;
use tokio::time::Instant;

/// One artifact travelling through the retry queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryTask {
    /// Artifact to upload
    pub artifact: PathBuf,
    /// Failed attempts so far
    pub attempts: u32,
    /// Earliest instant the next attempt may start
    pub not_before: Option<Instant>,
}

/// What happens to a task after a failed upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Re-enqueue at the tail
    Retry,
    /// Move the artifact into quarantine
    Quarantine,
}

impl DeliveryTask {
    pub fn new(artifact: PathBuf) -> Self {
        Self {
            artifact,
            attempts: 0,
            not_before: None,
        }
    }

    /// Record a failed upload
    ///
    /// Below the retry bound the attempt count grows by one and the task is
    /// retried; at the bound it is quarantined and the count stays put.
    pub fn record_failure(&mut self, max_retries: u32) -> Disposition {
        if self.attempts < max_retries {
            self.attempts += 1;
            Disposition::Retry
        } else {
            Disposition::Quarantine
        }
    }
}
