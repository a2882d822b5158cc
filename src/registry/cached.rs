//! Snapshot-serving registry invalidated by filesystem events.
//!
//! Reads are answered from an immutable snapshot swapped in with `ArcSwap`.
//! The watcher only flips a flag; the next read rebuilds the snapshot from
//! the directory. If the watcher cannot be started every read rebuilds, which
//! degrades to the fresh behaviour of [`DirectoryRegistry`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use notify::RecommendedWatcher;

use super::watcher::RegistryWatcher;
use super::{DirectoryRegistry, DomainSource, RegistryError};

#[derive(Debug, Default)]
struct Snapshot {
    domains: BTreeSet<String>,
    ports: BTreeMap<String, u16>,
}

/// Registry accessor that serves cached snapshots.
pub struct CachedRegistry {
    inner: DirectoryRegistry,
    snapshot: ArcSwapOption<Snapshot>,
    stale: Arc<AtomicBool>,
    watching: bool,
    _watcher: Mutex<Option<RecommendedWatcher>>,
}

impl CachedRegistry {
    /// Wrap `inner` and start watching its directory.
    ///
    /// The directory is created if missing so that it can be watched.
    pub fn start(inner: DirectoryRegistry) -> Self {
        let stale = Arc::new(AtomicBool::new(true));

        if let Err(e) = std::fs::create_dir_all(inner.location()) {
            tracing::warn!(path = %inner.location().display(), error = %e, "Cannot create registry directory");
        }

        let watcher = match RegistryWatcher::new(inner.location(), stale.clone()).run() {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::warn!(error = %e, "Registry watcher unavailable, every read will hit the filesystem");
                None
            }
        };

        Self {
            inner,
            snapshot: ArcSwapOption::empty(),
            stale,
            watching: watcher.is_some(),
            _watcher: Mutex::new(watcher),
        }
    }

    /// Force the next read to rebuild the snapshot.
    pub fn invalidate(&self) {
        self.stale.store(true, Ordering::Release);
    }

    async fn current(&self) -> Result<Arc<Snapshot>, RegistryError> {
        let must_reload = !self.watching || self.stale.swap(false, Ordering::AcqRel);
        if !must_reload {
            if let Some(snapshot) = self.snapshot.load_full() {
                return Ok(snapshot);
            }
        }

        match self.reload().await {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                self.stale.store(true, Ordering::Release);
                Err(e)
            }
        }
    }

    async fn reload(&self) -> Result<Arc<Snapshot>, RegistryError> {
        let domains = self.inner.list_domains().await?;
        let mut ports = BTreeMap::new();
        for domain in &domains {
            if let Some(port) = self.inner.get_port(domain).await {
                ports.insert(domain.clone(), port);
            }
        }

        tracing::debug!(domains = domains.len(), "Registry snapshot rebuilt");
        let snapshot = Arc::new(Snapshot { domains, ports });
        self.snapshot.store(Some(snapshot.clone()));
        Ok(snapshot)
    }
}

#[async_trait]
impl DomainSource for CachedRegistry {
    async fn list_domains(&self) -> Result<BTreeSet<String>, RegistryError> {
        Ok(self.current().await?.domains.clone())
    }

    async fn get_port(&self, domain: &str) -> Option<u16> {
        match self.current().await {
            Ok(snapshot) => snapshot.ports.get(domain).copied(),
            Err(e) => {
                tracing::debug!(error = %e, "Registry snapshot unavailable");
                None
            }
        }
    }

    fn location(&self) -> &Path {
        self.inner.location()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn serves_snapshot_until_invalidated() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.localhost"), "3000").unwrap();

        let registry = CachedRegistry::start(DirectoryRegistry::new(tmp.path()));
        assert_eq!(registry.get_port("a.localhost").await, Some(3000));

        std::fs::write(tmp.path().join("b.localhost"), "3001").unwrap();
        registry.invalidate();
        assert_eq!(registry.get_port("b.localhost").await, Some(3001));
        assert_eq!(registry.list_domains().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn picks_up_changes_from_watcher() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = CachedRegistry::start(DirectoryRegistry::new(tmp.path()));
        assert!(registry.list_domains().await.unwrap().is_empty());

        std::fs::write(tmp.path().join("svc.localhost"), "4000").unwrap();

        let mut seen = false;
        for _ in 0..50 {
            if registry.get_port("svc.localhost").await == Some(4000) {
                seen = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(seen, "watcher should invalidate the snapshot");
    }

    #[tokio::test]
    async fn creates_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("vhosts");

        let registry = CachedRegistry::start(DirectoryRegistry::new(&dir));
        assert!(dir.is_dir());
        assert!(registry.list_domains().await.unwrap().is_empty());
    }
}
