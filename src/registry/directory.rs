//! Directory-backed registry with no caching.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::{validate_domain, DomainSource, RegistryError};

/// Reads the registry directory afresh on every call.
#[derive(Debug, Clone)]
pub struct DirectoryRegistry {
    dir: PathBuf,
}

impl DirectoryRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Register `domain` on `port`, replacing any previous port.
    pub async fn register(&self, domain: &str, port: u16) -> Result<(), RegistryError> {
        validate_domain(domain)?;

        fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| RegistryError::Write {
                path: self.dir.clone(),
                source,
            })?;

        let path = self.dir.join(domain);
        fs::write(&path, port.to_string())
            .await
            .map_err(|source| RegistryError::Write { path, source })?;

        tracing::info!(domain, port, "Domain registered");
        Ok(())
    }

    /// Remove the registration for `domain`.
    ///
    /// Only the final component of `domain` is used, so a path cannot reach
    /// outside the registry directory.
    pub async fn unregister(&self, domain: &str) -> Result<(), RegistryError> {
        let name = Path::new(domain)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| RegistryError::InvalidDomain(domain.to_string()))?;
        validate_domain(name)?;

        let path = self.dir.join(name);
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(domain = name, "Domain unregistered");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(RegistryError::NotRegistered(name.to_string()))
            }
            Err(source) => Err(RegistryError::Write { path, source }),
        }
    }
}

#[async_trait]
impl DomainSource for DirectoryRegistry {
    async fn list_domains(&self) -> Result<BTreeSet<String>, RegistryError> {
        let unreadable = |source| RegistryError::Unreadable {
            path: self.dir.clone(),
            source,
        };

        let mut reader = match fs::read_dir(&self.dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(unreadable(e)),
        };

        let mut domains = BTreeSet::new();
        while let Some(entry) = reader.next_entry().await.map_err(unreadable)? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                tracing::debug!(name = ?name, "Skipping non UTF-8 registry entry");
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            domains.insert(name.to_string());
        }

        Ok(domains)
    }

    async fn get_port(&self, domain: &str) -> Option<u16> {
        validate_domain(domain).ok()?;

        let path = self.dir.join(domain);
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    tracing::debug!(path = %path.display(), error = %e, "Registry entry unreadable");
                }
                return None;
            }
        };

        match contents.trim().parse::<u16>() {
            Ok(port) => Some(port),
            Err(_) => {
                tracing::debug!(domain, contents = %contents.trim(), "Registry entry has no valid port");
                None
            }
        }
    }

    fn location(&self) -> &Path {
        &self.dir
    }
}
