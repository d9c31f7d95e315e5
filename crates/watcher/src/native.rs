//! Native recursive watcher over the first-level directories of a root

use crate::{EventKind, WatchEvent};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Errors raised while setting up watches
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Failed to create watcher: {0}")]
    Create(#[from] notify::Error),

    #[error("Failed to watch {path}: {source}")]
    WatchPath {
        path: PathBuf,
        source: notify::Error,
    },
}

/// Directory watcher feeding translated events into a bounded channel
///
/// Dropping the watcher stops event delivery and closes the channel.
pub struct DirectoryWatcher {
    watcher: RecommendedWatcher,
    watched: Vec<PathBuf>,
}

impl DirectoryWatcher {
    /// Create a watcher whose events arrive on the returned receiver
    pub fn new(buffer: usize) -> Result<(Self, mpsc::Receiver<WatchEvent>), WatchError> {
        let (tx, rx) = mpsc::channel(buffer);

        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => forward(&tx, event),
                Err(e) => warn!("Watcher error: {}", e),
            },
            Config::default(),
        )?;

        Ok((
            Self {
                watcher,
                watched: Vec::new(),
            },
            rx,
        ))
    }

    /// Watch `dir` and everything below it
    pub fn watch(&mut self, dir: &Path) -> Result<(), WatchError> {
        self.watcher
            .watch(dir, RecursiveMode::Recursive)
            .map_err(|source| WatchError::WatchPath {
                path: dir.to_path_buf(),
                source,
            })?;
        if !self.watched.iter().any(|w| w == dir) {
            self.watched.push(dir.to_path_buf());
        }
        info!("Watching: {}", dir.display());
        Ok(())
    }

    /// Watch the entries directly inside `root` so new directories are noticed
    pub fn watch_root(&mut self, root: &Path) -> Result<(), WatchError> {
        self.watcher
            .watch(root, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::WatchPath {
                path: root.to_path_buf(),
                source,
            })?;
        debug!("Watching entries of {}", root.display());
        Ok(())
    }

    /// Watch each directory, logging failures instead of aborting
    ///
    /// Returns the number of directories successfully watched.
    pub fn watch_all(&mut self, dirs: &[PathBuf]) -> usize {
        let mut ok = 0;
        for dir in dirs {
            match self.watch(dir) {
                Ok(()) => ok += 1,
                Err(e) => warn!("Warning: {}", e),
            }
        }
        ok
    }

    pub fn watched(&self) -> &[PathBuf] {
        &self.watched
    }
}

/// Runs on the notify thread; blocks when the dispatcher falls behind
fn forward(tx: &mpsc::Sender<WatchEvent>, event: Event) {
    let Some(kind) = EventKind::from_notify(&event.kind) else {
        return;
    };

    for path in event.paths {
        debug!("event: {:?} {}", kind, path.display());
        if tx.blocking_send(WatchEvent { path, kind }).is_err() {
            // Receiver gone, monitoring is shutting down
            return;
        }
    }
}
