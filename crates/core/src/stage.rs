//! Pipeline stages shared between the scheduler and the delivery queue
//!
//! The debounce scheduler only knows these two traits. The archiver and the
//! retry queue implement them, and tests substitute closures or fakes.

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Produces a snapshot artifact for a tracked directory
///
/// Implementations may block for the duration of a directory walk. Callers
/// run them on a blocking-capable thread.
pub trait Snapshotter: Send + Sync + 'static {
    /// Snapshot `dir` and return the path of the written artifact
    fn snapshot(&self, dir: &Path) -> Result<PathBuf>;
}

impl<F> Snapshotter for F
where
    F: Fn(&Path) -> Result<PathBuf> + Send + Sync + 'static,
{
    fn snapshot(&self, dir: &Path) -> Result<PathBuf> {
        self(dir)
    }
}

/// Accepts finished artifacts for delivery
#[async_trait]
pub trait ArtifactSink: Send + Sync + 'static {
    /// Hand over an artifact; may wait for capacity
    async fn submit(&self, artifact: PathBuf) -> Result<()>;
}
