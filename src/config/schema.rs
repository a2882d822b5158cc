//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable overriding [`RegistryConfig::dir`].
pub const CONFIG_DIR_ENV: &str = "PROXY_CONFIG_DIR";

/// Environment variable overriding [`ProxyConfig::root_domain`].
pub const ROOT_DOMAIN_ENV: &str = "PROXY_ROOT_DOMAIN";

/// Root configuration for the virtual-host proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Domain suffix every proxyable Host header must carry (e.g. "localhost").
    pub root_domain: String,

    /// Domain registry settings.
    pub registry: RegistryConfig,

    /// HTTP listener settings.
    pub http: HttpConfig,

    /// DNS listener and upstream settings.
    pub dns: DnsConfig,

    /// Shutdown behaviour.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            root_domain: "localhost".to_string(),
            registry: RegistryConfig::default(),
            http: HttpConfig::default(),
            dns: DnsConfig::default(),
            shutdown: ShutdownConfig::default(),
            observability: ObservabilityConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}

impl ProxyConfig {
    /// Apply `PROXY_CONFIG_DIR` and `PROXY_ROOT_DOMAIN` if they are set.
    pub fn apply_env_overrides(&mut self) {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
            if !dir.is_empty() {
                self.registry.dir = PathBuf::from(dir);
            }
        }
        if let Ok(domain) = std::env::var(ROOT_DOMAIN_ENV) {
            if !domain.is_empty() {
                self.root_domain = domain;
            }
        }
    }

    /// The suffix a Host header must end with to be proxyable (`"." + root_domain`).
    pub fn root_suffix(&self) -> String {
        format!(".{}", self.root_domain)
    }
}

/// How registry reads relate to the directory state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryMode {
    /// Re-read the directory on every lookup.
    #[default]
    Fresh,
    /// Serve a snapshot, invalidated by filesystem events.
    Cached,
}

/// Domain registry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Directory holding one file per registered domain.
    pub dir: PathBuf,

    /// Read mode.
    pub mode: RegistryMode,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            dir: default_registry_dir(),
            mode: RegistryMode::Fresh,
        }
    }
}

fn default_registry_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".virtual-host-proxy")
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address (e.g., "0.0.0.0:80").
    pub bind_address: String,

    /// Seconds to wait for a backend's response head; unset waits indefinitely.
    ///
    /// Expiry is reported like any other backend failure (500 page). Response
    /// bodies keep streaming once headers arrive.
    pub upstream_timeout_secs: Option<u64>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:80".to_string(),
            upstream_timeout_secs: None,
        }
    }
}

/// DNS responder configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DnsConfig {
    /// UDP bind address (e.g., "0.0.0.0:53").
    pub bind_address: String,

    /// System resolver configuration consulted for the upstream address.
    pub resolv_conf: PathBuf,

    /// Port the upstream resolver listens on.
    pub upstream_port: u16,

    /// Deadline for each forwarded question in milliseconds.
    pub upstream_timeout_ms: u64,

    /// TTL of synthesized answers in seconds.
    pub ttl: u32,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:53".to_string(),
            resolv_conf: PathBuf::from("/etc/resolv.conf"),
            upstream_port: 53,
            upstream_timeout_ms: 1000,
            ttl: 1800,
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Maximum time to wait for in-flight work after the listeners stop.
    pub drain_timeout_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: "CHANGE_ME".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
