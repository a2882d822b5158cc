//! HTTP virtual-host subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → routing::Router (Host header → registered domain + port)
//!     → proxy.rs (forward to 127.0.0.1:<port>, classify failures)
//!         → request.rs (URI rewrite, hop-by-hop headers)
//!     → response.rs (directory and error pages)
//!     → Send to client
//! ```

pub mod proxy;
pub mod request;
pub mod response;
pub mod server;

pub use proxy::ProxyError;
pub use request::X_REQUEST_ID;
pub use server::HttpServer;
