//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (supervisor.rs):
//!     Config → Bind DNS socket, HTTP listener, admin/metrics → Spawn servers
//!
//! Shutdown (shutdown.rs, inflight.rs):
//!     Signal received → Stop accepting → Drain in-flight work → Release sockets
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Listeners bind before any server task starts
//! - Shutdown has a timeout: remaining work is aborted after the deadline

pub mod inflight;
pub mod shutdown;
pub mod signals;
pub mod supervisor;

pub use inflight::{InFlightGuard, InFlightTracker, TaskId};
pub use shutdown::Shutdown;
pub use supervisor::{LifecycleError, Running, Supervisor};
