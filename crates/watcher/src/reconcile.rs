//! Startup reconciliation
//!
//! Discovers the tracked directories of a root and, on request, snapshots
//! each of them once so changes made while the monitor was down are not lost.

use anyhow::{Context, Result};
use monitor_core::{layout, ArtifactSink, Snapshotter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use walkdir::WalkDir;

/// List the non-hidden first-level directories of `root`, sorted by name
pub fn first_level_dirs(root: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();

    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("Failed to list {}", root.display()))?;

        if !entry.file_type().is_dir() {
            continue;
        }

        let hidden = entry
            .file_name()
            .to_str()
            .map_or(false, layout::is_hidden);
        if !hidden {
            dirs.push(entry.into_path());
        }
    }

    Ok(dirs)
}

/// Snapshot every directory in `dirs` and submit the artifacts
///
/// Failures are logged per directory and do not stop the sweep. Returns the
/// number of artifacts submitted.
pub async fn initial_sweep(
    dirs: &[PathBuf],
    snapshotter: Arc<dyn Snapshotter>,
    sink: Arc<dyn ArtifactSink>,
) -> usize {
    let mut submitted = 0;

    for dir in dirs {
        info!("Creating initial backup for: {}", dir.display());

        let snap = Arc::clone(&snapshotter);
        let target = dir.clone();
        let artifact = match tokio::task::spawn_blocking(move || snap.snapshot(&target)).await {
            Ok(Ok(artifact)) => artifact,
            Ok(Err(e)) => {
                warn!("Failed to archive {}: {:#}", dir.display(), e);
                continue;
            }
            Err(e) => {
                warn!("Archive task for {} panicked: {}", dir.display(), e);
                continue;
            }
        };

        info!("Created initial archive: {}", artifact.display());
        match sink.submit(artifact).await {
            Ok(()) => submitted += 1,
            Err(e) => warn!("Failed to enqueue initial archive of {}: {:#}", dir.display(), e),
        }
    }

    submitted
}
