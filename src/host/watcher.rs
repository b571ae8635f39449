use crate::host::mtime::MtimeTracker;
use crate::models::WatcherStatus;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Duration;

#[derive(Default)]
struct WatchStats {
    change_count: AtomicU64,
    last_change_at: std::sync::Mutex<Option<DateTime<Utc>>>,
}

struct ActiveWatch {
    path: PathBuf,
    stats: Arc<WatchStats>,
    handle: JoinHandle<()>,
}

/// Background mtime watcher for the active project; at most one at a time.
#[derive(Clone)]
pub struct WatcherRegistry {
    active: Arc<Mutex<Option<ActiveWatch>>>,
    interval: Duration,
}

impl Default for WatcherRegistry {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl WatcherRegistry {
    pub fn new(interval: Duration) -> Self {
        Self {
            active: Arc::new(Mutex::new(None)),
            interval,
        }
    }

    pub async fn start(&self, path: PathBuf) {
        let mut active = self.active.lock().await;
        if let Some(existing) = active.take() {
            existing.handle.abort();
        }

        let stats = Arc::new(WatchStats::default());
        let handle = tokio::spawn({
            let stats = stats.clone();
            let path = path.clone();
            let period = self.interval;
            async move {
                let tracker = MtimeTracker::new();
                tracker.check_changed(&path);
                let mut interval = tokio::time::interval(period);
                interval.tick().await;
                loop {
                    interval.tick().await;
                    if tracker.check_changed(&path) {
                        stats.change_count.fetch_add(1, Ordering::Relaxed);
                        if let Ok(mut last) = stats.last_change_at.lock() {
                            *last = Some(Utc::now());
                        }
                        tracing::debug!(path = %path.display(), "tracker data changed");
                    }
                }
            }
        });

        tracing::info!(path = %path.display(), "started watching project");
        *active = Some(ActiveWatch { path, stats, handle });
    }

    pub async fn stop(&self) {
        let mut active = self.active.lock().await;
        if let Some(existing) = active.take() {
            existing.handle.abort();
            tracing::info!(path = %existing.path.display(), "stopped watching project");
        }
    }

    pub async fn status(&self) -> WatcherStatus {
        let active = self.active.lock().await;
        match active.as_ref() {
            Some(watch) => WatcherStatus {
                watching: !watch.handle.is_finished(),
                path: Some(watch.path.to_string_lossy().to_string()),
                change_count: watch.stats.change_count.load(Ordering::Relaxed),
                last_change_at: watch.stats.last_change_at.lock().ok().and_then(|last| *last),
            },
            None => WatcherStatus::default(),
        }
    }
}
