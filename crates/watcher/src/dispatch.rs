//! Event dispatch: routes watcher events into the debounce scheduler

use crate::{DebounceScheduler, DirectoryWatcher, EventKind, EventRouter, WatchEvent};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Which event kinds restart a quiet window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RearmPolicy {
    /// Also restart on deletions and renames
    pub on_remove: bool,
}

/// Consumes watcher events and resets the matching quiet windows
pub struct Dispatcher {
    router: EventRouter,
    scheduler: DebounceScheduler,
    policy: RearmPolicy,
    /// Receives watches for directories that appear after startup
    watcher: Option<Arc<Mutex<DirectoryWatcher>>>,
}

impl Dispatcher {
    pub fn new(router: EventRouter, scheduler: DebounceScheduler, policy: RearmPolicy) -> Self {
        Self {
            router,
            scheduler,
            policy,
            watcher: None,
        }
    }

    /// Start watching first-level directories created while running
    pub fn with_discovery(mut self, watcher: Arc<Mutex<DirectoryWatcher>>) -> Self {
        self.watcher = Some(watcher);
        self
    }

    /// Handle a single event; returns whether a quiet window was reset
    pub fn handle(&self, event: &WatchEvent) -> bool {
        if event.path.parent() == Some(self.router.root()) {
            return self.handle_root_entry(event);
        }

        let rearm = match event.kind {
            EventKind::Modify => {
                debug!("modified: {}", event.path.display());
                true
            }
            EventKind::Create => self.handle_create(&event.path),
            EventKind::Delete => {
                info!("deleted: {}", event.path.display());
                self.policy.on_remove
            }
            EventKind::Rename => {
                info!("renamed: {}", event.path.display());
                self.policy.on_remove
            }
        };

        if !rearm {
            return false;
        }

        match self.router.route(&event.path) {
            Some(key) => {
                self.scheduler.reset(&key);
                true
            }
            None => {
                debug!("Ignoring event outside tracked directories: {}", event.path.display());
                false
            }
        }
    }

    fn handle_create(&self, path: &Path) -> bool {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_dir() => {
                info!("created directory: {}", path.display());
                false
            }
            Ok(_) => {
                debug!("created file: {}", path.display());
                true
            }
            Err(_) => {
                // Gone again before we could look at it
                info!("created: {}", path.display());
                false
            }
        }
    }

    /// Entries directly in the root: artifacts, the quarantine, new directories
    fn handle_root_entry(&self, event: &WatchEvent) -> bool {
        let path = &event.path;
        let appeared = matches!(event.kind, EventKind::Create | EventKind::Rename);
        if !appeared || !path.is_dir() || self.router.route(path).as_deref() != Some(path.as_path()) {
            debug!("Ignoring root entry: {}", path.display());
            return false;
        }

        info!("New directory: {}", path.display());
        if let Some(watcher) = &self.watcher {
            let watcher = Arc::clone(watcher);
            let dir = path.clone();
            // Registration waits on the notify thread, which may be waiting on us
            tokio::task::spawn_blocking(move || {
                if let Err(e) = watcher.lock().watch(&dir) {
                    warn!("Warning: {}", e);
                }
            });
        }

        // Writes that land before the watch is active are still captured
        self.scheduler.reset(path);
        true
    }

    /// Drain events until the watcher side of the channel closes
    pub async fn run(self, mut events: mpsc::Receiver<WatchEvent>) {
        info!("Dispatching events under {}", self.router.root().display());
        while let Some(event) = events.recv().await {
            self.handle(&event);
        }
        debug!("Event channel closed, dispatcher exiting");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use monitor_core::ArtifactSink;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    struct NullSink;

    #[async_trait]
    impl ArtifactSink for NullSink {
        async fn submit(&self, _artifact: PathBuf) -> Result<()> {
            Ok(())
        }
    }

    fn dispatcher(root: &Path, policy: RearmPolicy) -> (Dispatcher, DebounceScheduler) {
        let scheduler = DebounceScheduler::new(
            Duration::from_secs(60),
            Arc::new(|dir: &Path| -> Result<PathBuf> { Ok(dir.to_path_buf()) }),
            Arc::new(NullSink),
        );
        let dispatcher = Dispatcher::new(EventRouter::new(root), scheduler.clone(), policy);
        (dispatcher, scheduler)
    }

    fn event(path: PathBuf, kind: EventKind) -> WatchEvent {
        WatchEvent { path, kind }
    }

    #[tokio::test]
    async fn test_write_and_file_create_rearm() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("mods/sub")).unwrap();
        fs::write(root.join("mods/sub/new.txt"), b"x").unwrap();

        let (d, scheduler) = dispatcher(root, RearmPolicy::default());

        assert!(d.handle(&event(root.join("mods/plugin.dll"), EventKind::Modify)));
        assert!(d.handle(&event(root.join("mods/sub/new.txt"), EventKind::Create)));
        assert!(scheduler.is_pending(&root.join("mods")));
        assert_eq!(scheduler.pending_count(), 1);

        scheduler.stop_all().await;
    }

    #[tokio::test]
    async fn test_directory_create_does_not_rearm() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("mods/newdir")).unwrap();

        let (d, scheduler) = dispatcher(root, RearmPolicy::default());
        assert!(!d.handle(&event(root.join("mods/newdir"), EventKind::Create)));
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_remove_and_rename_follow_policy() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        let (d, scheduler) = dispatcher(root, RearmPolicy::default());
        assert!(!d.handle(&event(root.join("mods/old.txt"), EventKind::Delete)));
        assert!(!d.handle(&event(root.join("saves/a.sav"), EventKind::Rename)));
        assert_eq!(scheduler.pending_count(), 0);

        let (d, scheduler) = dispatcher(root, RearmPolicy { on_remove: true });
        assert!(d.handle(&event(root.join("mods/old.txt"), EventKind::Delete)));
        assert!(d.handle(&event(root.join("saves/a.sav"), EventKind::Rename)));
        assert_eq!(scheduler.pending_count(), 2);
        scheduler.stop_all().await;
    }

    #[tokio::test]
    async fn test_events_outside_root_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("monitor");
        fs::create_dir(&root).unwrap();

        let (d, scheduler) = dispatcher(&root, RearmPolicy::default());
        assert!(!d.handle(&event(temp_dir.path().join("elsewhere/x"), EventKind::Modify)));
        assert!(!d.handle(&event(root.clone(), EventKind::Modify)));
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_new_first_level_directory_arms_timer() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("newmod")).unwrap();
        fs::create_dir(root.join(".failed_uploads")).unwrap();
        fs::write(root.join("mods-1718000000.rwmod"), b"artifact").unwrap();

        let (d, scheduler) = dispatcher(root, RearmPolicy::default());
        assert!(d.handle(&event(root.join("newmod"), EventKind::Create)));
        assert!(scheduler.is_pending(&root.join("newmod")));

        // Artifacts and hidden directories in the root are never tracked
        assert!(!d.handle(&event(root.join("mods-1718000000.rwmod"), EventKind::Create)));
        assert!(!d.handle(&event(root.join("mods-1718000000.rwmod"), EventKind::Modify)));
        assert!(!d.handle(&event(root.join(".failed_uploads"), EventKind::Create)));
        assert!(!d.handle(&event(root.join("newmod"), EventKind::Delete)));
        assert_eq!(scheduler.pending_count(), 1);

        scheduler.stop_all().await;
    }

    #[tokio::test]
    async fn test_run_exits_when_channel_closes() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let (d, scheduler) = dispatcher(root, RearmPolicy::default());

        let (tx, rx) = mpsc::channel(4);
        tx.send(event(root.join("mods/a.txt"), EventKind::Modify)).await.unwrap();
        drop(tx);

        tokio::time::timeout(Duration::from_secs(2), d.run(rx)).await.unwrap();
        assert!(scheduler.is_pending(&root.join("mods")));
        scheduler.stop_all().await;
    }
}
