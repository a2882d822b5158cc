//! Registry directory watcher for snapshot invalidation.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

/// Marks a registry snapshot stale whenever the directory changes.
pub struct RegistryWatcher {
    dir: PathBuf,
    stale: Arc<AtomicBool>,
}

impl RegistryWatcher {
    /// Create a watcher that sets `stale` on every directory change.
    pub fn new(dir: &Path, stale: Arc<AtomicBool>) -> Self {
        Self {
            dir: dir.to_path_buf(),
            stale,
        }
    }

    /// Start watching the directory in a background thread.
    ///
    /// The returned handle must be kept alive for events to keep flowing.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let stale = self.stale.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !event.kind.is_access() {
                        tracing::debug!(paths = ?event.paths, kind = ?event.kind, "Registry change detected");
                        stale.store(true, Ordering::Release);
                    }
                }
                Err(e) => {
                    tracing::error!("Registry watch error: {:?}", e);
                    stale.store(true, Ordering::Release);
                }
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.dir, "Registry watcher started");
        Ok(watcher)
    }
}
