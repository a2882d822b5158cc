//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! DNS responder, HTTP handler:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (text or JSON lines)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through HTTP log events
//! - Metrics are cheap and safe to record before the exporter exists

pub mod logging;
pub mod metrics;
