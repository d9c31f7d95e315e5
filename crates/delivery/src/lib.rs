//! Artifact delivery for rwmod-monitor
//!
//! This crate provides:
//! - A bounded retry queue with a single serial upload worker
//! - Retry policy with exponential backoff
//! - Quarantine for artifacts that exhaust their retries
//! - The S3 uploader

pub mod backoff;
pub mod quarantine;
pub mod queue;
pub mod task;
pub mod uploader;

// Re-exports
pub use backoff::RetryPolicy;
pub use quarantine::{Quarantine, QuarantineError};
pub use queue::{DeliveryError, DeliveryStats, RetryQueue, DEFAULT_CAPACITY};
pub use task::{DeliveryTask, Disposition};
pub use uploader::{S3Settings, S3Uploader, Uploader};
