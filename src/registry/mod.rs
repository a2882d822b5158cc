//! Domain registry subsystem.
//!
//! # Data Flow
//! ```text
//! <registry dir>/
//!     api.svc.localhost   (contents: "4001")
//!     svc.localhost       (contents: "4000")
//!     .pid                (hidden, ignored)
//!
//!     → directory.rs (fresh read on every call)
//!     → cached.rs    (snapshot, invalidated by watcher.rs events)
//!     → DomainSource trait consumed by the DNS and HTTP responders
//! ```
//!
//! # Design Decisions
//! - The filesystem is the only store; writes come from the CLI
//! - A missing directory means "nothing registered yet", not an error
//! - Malformed port files read as absent entries
//! - Readers never lock: each read is a snapshot of the directory

pub mod cached;
pub mod directory;
pub mod watcher;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::{RegistryConfig, RegistryMode};

pub use cached::CachedRegistry;
pub use directory::DirectoryRegistry;

/// A registered domain and the local port it is served on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryEntry {
    pub domain: String,
    pub port: u16,
}

/// Errors surfaced by registry reads and writes.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The directory exists but cannot be listed.
    #[error("registry directory {path} is unreadable: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The name cannot be used as a registry file name.
    #[error("invalid domain name {0:?}")]
    InvalidDomain(String),

    /// Removal of a domain that has no registry file.
    #[error("domain {0} is not registered")]
    NotRegistered(String),

    /// Creating, writing or removing a registry file failed.
    #[error("failed to update registry entry {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Read access to the domain → port mapping.
#[async_trait]
pub trait DomainSource: Send + Sync {
    /// All registered domain names, hidden entries excluded.
    async fn list_domains(&self) -> Result<BTreeSet<String>, RegistryError>;

    /// Port registered for `domain`, or `None` if missing or malformed.
    async fn get_port(&self, domain: &str) -> Option<u16>;

    /// Directory backing this source.
    fn location(&self) -> &Path;

    /// Every domain that currently resolves to a valid port.
    async fn entries(&self) -> Result<Vec<RegistryEntry>, RegistryError> {
        let mut entries = Vec::new();
        for domain in self.list_domains().await? {
            if let Some(port) = self.get_port(&domain).await {
                entries.push(RegistryEntry { domain, port });
            }
        }
        Ok(entries)
    }
}

/// Check that `domain` is usable as a single file name inside the registry.
pub fn validate_domain(domain: &str) -> Result<(), RegistryError> {
    let valid = !domain.is_empty()
        && !domain.starts_with('.')
        && !domain.contains(|c: char| matches!(c, '/' | '\\' | '\0'));
    if valid {
        Ok(())
    } else {
        Err(RegistryError::InvalidDomain(domain.to_string()))
    }
}

/// Build the registry accessor selected by `config.mode`.
pub fn build_source(config: &RegistryConfig) -> Arc<dyn DomainSource> {
    let directory = DirectoryRegistry::new(&config.dir);
    match config.mode {
        RegistryMode::Fresh => Arc::new(directory),
        RegistryMode::Cached => Arc::new(CachedRegistry::start(directory)),
    }
}
