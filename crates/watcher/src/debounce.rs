//! Per-directory debouncing
//!
//! Each tracked directory owns at most one quiet-window timer. Every change
//! event resets it; when it finally expires the directory is snapshotted and
//! the artifact is handed to the delivery sink.
//!
//! Timers are tokio tasks. A timer that wins the race against a reset (its
//! generation is still current once the sleep completes) removes itself from
//! the map before archiving, so a later reset arms a fresh timer instead of
//! cancelling an archive that is already running.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use monitor_core::{ArtifactSink, Snapshotter};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Per-directory quiet-window scheduler
///
/// Cheap to clone; clones share the same timer map.
#[derive(Clone)]
pub struct DebounceScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    quiet_window: Duration,
    snapshotter: Arc<dyn Snapshotter>,
    sink: Arc<dyn ArtifactSink>,
    /// Pending timers keyed by tracked directory
    timers: Mutex<HashMap<PathBuf, PendingTimer>>,
    /// Monotonic counter distinguishing successive timers for one key
    generation: AtomicU64,
    stopped: AtomicBool,
    /// Number of fire sequences currently archiving or submitting
    in_flight: watch::Sender<usize>,
}

struct PendingTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

impl DebounceScheduler {
    /// Create a scheduler. Must be called from within a tokio runtime.
    pub fn new(
        quiet_window: Duration,
        snapshotter: Arc<dyn Snapshotter>,
        sink: Arc<dyn ArtifactSink>,
    ) -> Self {
        let (in_flight, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                quiet_window,
                snapshotter,
                sink,
                timers: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
                stopped: AtomicBool::new(false),
                in_flight,
            }),
        }
    }

    pub fn quiet_window(&self) -> Duration {
        self.inner.quiet_window
    }

    /// Restart the quiet window for `key`
    ///
    /// Any pending timer for `key` is cancelled first. Ignored after
    /// [`stop_all`](Self::stop_all).
    pub fn reset(&self, key: &Path) {
        let mut timers = self.inner.timers.lock();

        if self.inner.stopped.load(Ordering::SeqCst) {
            debug!("Scheduler stopped, ignoring change in {}", key.display());
            return;
        }

        if let Some(previous) = timers.remove(key) {
            previous.handle.abort();
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst);
        let inner = Arc::clone(&self.inner);
        let owned_key = key.to_path_buf();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(inner.quiet_window).await;
            Inner::expire(inner, owned_key, generation).await;
        });

        timers.insert(key.to_path_buf(), PendingTimer { generation, handle });
        debug!("Reset timer for directory: {}", key.display());
    }

    /// Whether a quiet window is currently running for `key`
    pub fn is_pending(&self, key: &Path) -> bool {
        self.inner.timers.lock().contains_key(key)
    }

    /// Number of directories with a running quiet window
    pub fn pending_count(&self) -> usize {
        self.inner.timers.lock().len()
    }

    /// Cancel every pending timer and wait for in-flight fires to finish
    ///
    /// Safe to call more than once.
    pub async fn stop_all(&self) {
        let cancelled = {
            let mut timers = self.inner.timers.lock();
            self.inner.stopped.store(true, Ordering::SeqCst);
            let cancelled = timers.len();
            for (_, timer) in timers.drain() {
                timer.handle.abort();
            }
            cancelled
        };

        if cancelled > 0 {
            info!("Cancelled {} pending quiet window(s)", cancelled);
        }

        let mut in_flight = self.inner.in_flight.subscribe();
        if in_flight.wait_for(|n| *n == 0).await.is_err() {
            warn!("In-flight tracker closed while stopping scheduler");
        }
    }
}

impl Inner {
    /// Timer fire: snapshot the directory and hand the artifact to the sink
    async fn expire(inner: Arc<Inner>, key: PathBuf, generation: u64) {
        {
            let mut timers = inner.timers.lock();
            match timers.get(&key) {
                Some(timer) if timer.generation == generation => {
                    timers.remove(&key);
                }
                // Superseded or cancelled
                _ => return,
            }
            inner.in_flight.send_modify(|n| *n += 1);
        }

        info!("Archiving directory: {}", key.display());

        let snapshotter = Arc::clone(&inner.snapshotter);
        let dir = key.clone();
        let outcome = tokio::task::spawn_blocking(move || snapshotter.snapshot(&dir)).await;

        match outcome {
            Ok(Ok(artifact)) => {
                info!("Created archive: {}", artifact.display());
                if let Err(e) = inner.sink.submit(artifact).await {
                    error!("Failed to enqueue archive of {}: {:#}", key.display(), e);
                }
            }
            Ok(Err(e)) => {
                warn!("Failed to archive {}: {:#}", key.display(), e);
            }
            Err(e) => {
                error!("Archive task for {} panicked: {}", key.display(), e);
            }
        }

        inner.in_flight.send_modify(|n| *n -= 1);
    }
}
