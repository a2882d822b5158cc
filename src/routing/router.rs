//! Host → backend lookup.
//!
//! # Responsibilities
//! - Gate hosts on the configured root domain suffix
//! - Match the host against the current registry snapshot
//! - Return the matched domain with its port, or an explicit no-match
//!
//! # Design Decisions
//! - Stateless: every lookup takes a fresh snapshot from the `DomainSource`
//! - Registry failures read as no-match so callers fall back to the directory page

use std::sync::Arc;

use crate::registry::DomainSource;
use crate::routing::matcher::{match_host, strip_port};

/// Where a request for a registered domain should be proxied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub domain: String,
    pub port: u16,
}

/// Resolves Host header values to proxy targets.
#[derive(Clone)]
pub struct Router {
    source: Arc<dyn DomainSource>,
    root_suffix: String,
}

impl Router {
    /// `root_suffix` is `"." + root_domain`; the bare root domain never matches.
    pub fn new(source: Arc<dyn DomainSource>, root_suffix: impl Into<String>) -> Self {
        Self {
            source,
            root_suffix: root_suffix.into(),
        }
    }

    pub fn source(&self) -> &Arc<dyn DomainSource> {
        &self.source
    }

    /// Resolve a raw Host header value to a target.
    pub async fn resolve(&self, host_header: &str) -> Option<Target> {
        let host = strip_port(host_header);
        if !host.ends_with(&self.root_suffix) {
            return None;
        }

        let domains = match self.source.list_domains().await {
            Ok(domains) => domains,
            Err(e) => {
                tracing::warn!(error = %e, host, "Registry unavailable during host lookup");
                return None;
            }
        };

        let domain = match_host(host, domains.iter().map(String::as_str))?;
        let port = self.source.get_port(domain).await?;

        Some(Target {
            domain: domain.to_string(),
            port,
        })
    }
}
