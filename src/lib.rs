//! Local development virtual-host proxy.
//!
//! Maps `<name>.<root domain>` to services on `127.0.0.1:<port>` using a
//! directory of port files, answering both DNS and HTTP for those names.

pub mod admin;
pub mod config;
pub mod dns;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod registry;
pub mod routing;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::{Shutdown, Supervisor};
