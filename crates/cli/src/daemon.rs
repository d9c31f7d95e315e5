//! Monitor lifecycle
//!
//! Wires the watcher, debounce scheduler and retry queue together for one
//! monitored root and tears them down in order.

use crate::system_config::SystemConfig;
use anyhow::{Context, Result};
use delivery::{DeliveryStats, Quarantine, RetryPolicy, RetryQueue, S3Uploader, Uploader};
use monitor_core::{ArtifactSink, Archiver, Snapshotter};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use watcher::{reconcile, DebounceScheduler, DirectoryWatcher, Dispatcher, EventRouter, RearmPolicy};

/// Buffered watch events between the notify thread and the dispatcher
const EVENT_BUFFER: usize = 1024;

/// Runtime knobs for a [`Monitor`]
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    pub monitor_dir: PathBuf,
    pub quiet_window: Duration,
    pub retry_policy: RetryPolicy,
    pub queue_capacity: usize,
    pub archive_extension: String,
    pub initial_backup: bool,
    pub rearm: RearmPolicy,
}

impl From<&SystemConfig> for MonitorOptions {
    fn from(config: &SystemConfig) -> Self {
        Self {
            monitor_dir: config.monitor_dir.clone(),
            quiet_window: config.quiet_window(),
            retry_policy: config.retry_policy(),
            queue_capacity: config.queue_capacity,
            archive_extension: config.archive_extension.clone(),
            initial_backup: config.initial_backup,
            rearm: RearmPolicy {
                on_remove: config.rearm_on_remove,
            },
        }
    }
}

/// A running monitor
pub struct Monitor {
    root: PathBuf,
    watcher: Option<Arc<Mutex<DirectoryWatcher>>>,
    dispatcher: Option<JoinHandle<()>>,
    scheduler: DebounceScheduler,
    queue: Arc<RetryQueue>,
}

impl Monitor {
    /// Start monitoring `opts.monitor_dir`, delivering through `uploader`
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start(opts: MonitorOptions, uploader: Arc<dyn Uploader>) -> Result<Self> {
        let root = opts.monitor_dir.clone();

        let quarantine = Quarantine::open(&root)?;
        let queue = Arc::new(RetryQueue::start(
            uploader,
            opts.retry_policy.clone(),
            quarantine,
            opts.queue_capacity,
        ));

        let snapshotter: Arc<dyn Snapshotter> =
            Arc::new(Archiver::new(&root, opts.archive_extension.clone()));
        let sink: Arc<dyn ArtifactSink> = queue.clone();
        let scheduler =
            DebounceScheduler::new(opts.quiet_window, Arc::clone(&snapshotter), Arc::clone(&sink));

        let dirs = reconcile::first_level_dirs(&root)
            .with_context(|| format!("Failed to list {}", root.display()))?;
        info!("Found {} directories under {}", dirs.len(), root.display());

        let (mut watcher, events) = DirectoryWatcher::new(EVENT_BUFFER)?;
        let watching = watcher.watch_all(&dirs);
        if watching < dirs.len() {
            warn!("Watching {} of {} directories", watching, dirs.len());
        }
        let discovery = match watcher.watch_root(&root) {
            Ok(()) => true,
            Err(e) => {
                warn!("New directories will not be noticed: {}", e);
                false
            }
        };
        let watcher = Arc::new(Mutex::new(watcher));

        let mut dispatcher = Dispatcher::new(EventRouter::new(&root), scheduler.clone(), opts.rearm);
        if discovery {
            dispatcher = dispatcher.with_discovery(Arc::clone(&watcher));
        }
        let dispatcher = tokio::spawn(dispatcher.run(events));

        if opts.initial_backup {
            let submitted = reconcile::initial_sweep(&dirs, snapshotter, sink).await;
            info!("Initial backup submitted {} artifacts", submitted);
        }

        info!(
            "Monitoring {} (quiet window {}s)",
            root.display(),
            opts.quiet_window.as_secs()
        );

        Ok(Self {
            root,
            watcher: Some(watcher),
            dispatcher: Some(dispatcher),
            scheduler,
            queue,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scheduler(&self) -> &DebounceScheduler {
        &self.scheduler
    }

    pub fn stats(&self) -> DeliveryStats {
        self.queue.stats()
    }

    /// Stop watching, cancel pending timers and drain the delivery queue
    ///
    /// Calling this again is a no-op.
    pub async fn shutdown(&mut self) {
        let Some(dispatcher) = self.dispatcher.take() else {
            return;
        };

        info!("Shutting down monitor for {}", self.root.display());
        dispatcher.abort();
        let _ = dispatcher.await;
        drop(self.watcher.take());

        self.scheduler.stop_all().await;
        self.queue.close().await;
    }
}

/// Run the monitor for `config` until a termination signal arrives
pub async fn run(config: SystemConfig) -> Result<()> {
    let signal = crate::shutdown::install()?;

    let uploader = S3Uploader::new(&config.s3_settings())
        .await
        .context("Failed to create S3 client")?;
    info!("Uploading to bucket {}", uploader.bucket());

    let mut monitor = Monitor::start(MonitorOptions::from(&config), Arc::new(uploader)).await?;

    signal.await;
    monitor.shutdown().await;

    info!("Monitor stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct CountingUploader {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Uploader for CountingUploader {
        async fn upload(&self, _artifact: &Path) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn options(root: &Path, initial_backup: bool) -> MonitorOptions {
        MonitorOptions {
            monitor_dir: root.to_path_buf(),
            quiet_window: Duration::from_secs(3600),
            retry_policy: RetryPolicy::immediate(3),
            queue_capacity: 8,
            archive_extension: "rwmod".to_string(),
            initial_backup,
            rearm: RearmPolicy::default(),
        }
    }

    #[test]
    fn test_options_from_config() {
        let config = SystemConfig {
            monitor_dir: PathBuf::from("/srv/monitor"),
            delay_minutes: 2,
            rearm_on_remove: true,
            ..SystemConfig::default()
        };
        let opts = MonitorOptions::from(&config);
        assert_eq!(opts.quiet_window, Duration::from_secs(120));
        assert!(opts.rearm.on_remove);
        assert_eq!(opts.retry_policy.max_retries, 3);
        assert_eq!(opts.archive_extension, "rwmod");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_initial_backup_uploads_each_directory() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("mods")).unwrap();
        fs::write(root.join("mods/a.txt"), b"a").unwrap();
        fs::create_dir(root.join("saves")).unwrap();
        fs::create_dir(root.join(".hidden")).unwrap();

        let uploader = Arc::new(CountingUploader {
            calls: AtomicUsize::new(0),
        });
        let mut monitor = Monitor::start(options(root, true), uploader.clone()).await.unwrap();
        assert!(root.join(".failed_uploads").is_dir());

        monitor.shutdown().await;
        assert_eq!(uploader.calls.load(Ordering::SeqCst), 2);
        assert_eq!(monitor.stats().delivered, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("mods")).unwrap();

        let uploader = Arc::new(CountingUploader {
            calls: AtomicUsize::new(0),
        });
        let mut monitor = Monitor::start(options(temp_dir.path(), false), uploader.clone())
            .await
            .unwrap();
        monitor.scheduler().reset(&temp_dir.path().join("mods"));
        assert_eq!(monitor.scheduler().pending_count(), 1);

        monitor.shutdown().await;
        monitor.shutdown().await;

        assert_eq!(monitor.scheduler().pending_count(), 0);
        assert_eq!(uploader.calls.load(Ordering::SeqCst), 0);
    }
}
