//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Host header
//!     → matcher.rs (strip port, longest suffix match)
//!     → router.rs (root suffix gate, registry lookup)
//!     → Return: Target { domain, port } or no-match
//! ```
//!
//! # Design Decisions
//! - Nothing is compiled at startup: the registry is consulted per request
//! - Deterministic: same registry state always yields the same target
//! - Most specific domain wins

pub mod matcher;
pub mod router;

pub use router::{Router, Target};
