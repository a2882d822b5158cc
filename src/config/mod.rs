//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, env overrides)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → cloned into each subsystem at startup
//! ```
//!
//! # Design Decisions
//! - All fields have defaults so the proxy runs without a config file
//! - `PROXY_CONFIG_DIR` / `PROXY_ROOT_DOMAIN` override file values
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::AdminConfig;
pub use schema::DnsConfig;
pub use schema::HttpConfig;
pub use schema::ObservabilityConfig;
pub use schema::ProxyConfig;
pub use schema::RegistryConfig;
pub use schema::RegistryMode;
