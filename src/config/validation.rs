//! Configuration validation.
//!
//! Semantic checks run after serde has accepted the file. All problems are
//! collected so a broken config reports everything at once.

use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;

/// A single semantic problem with a loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("root_domain must be non-empty and must not start or end with '.' (got {0:?})")]
    InvalidRootDomain(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Validate a configuration, returning every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let addresses = [
        ("http.bind_address", &config.http.bind_address),
        ("dns.bind_address", &config.dns.bind_address),
        ("observability.metrics_address", &config.observability.metrics_address),
        ("admin.bind_address", &config.admin.bind_address),
    ];
    for (field, value) in addresses {
        if value.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidAddress {
                field,
                value: value.clone(),
            });
        }
    }

    let root = &config.root_domain;
    if root.is_empty() || root.starts_with('.') || root.ends_with('.') {
        errors.push(ValidationError::InvalidRootDomain(root.clone()));
    }

    if config.dns.upstream_timeout_ms == 0 {
        errors.push(ValidationError::Zero("dns.upstream_timeout_ms"));
    }
    if config.dns.upstream_port == 0 {
        errors.push(ValidationError::Zero("dns.upstream_port"));
    }
    if config.http.upstream_timeout_secs == Some(0) {
        errors.push(ValidationError::Zero("http.upstream_timeout_secs"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
