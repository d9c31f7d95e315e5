//! Core building blocks for rwmod-monitor
//!
//! This crate provides:
//! - Directory snapshots as compressed artifacts
//! - Layout of the monitored root (artifact names, quarantine)
//! - The pipeline stage traits shared by scheduler and delivery

pub mod archive;
pub mod layout;
pub mod stage;

// Re-export main types for convenience
pub use archive::{ArchiveError, Archiver};
pub use layout::{DEFAULT_ARTIFACT_EXTENSION, QUARANTINE_DIR};
pub use stage::{ArtifactSink, Snapshotter};

/// Common result type used throughout core
pub type Result<T> = anyhow::Result<T>;
