//! DNS responder subsystem.
//!
//! # Data Flow
//! ```text
//! UDP datagram / length-prefixed TCP message
//!     → server.rs (receive and accept loops, one task per datagram or connection)
//!     → responder.rs (owned/foreign split, split-horizon answers)
//!         → interfaces.rs (which local address serves the requester)
//!         → upstream.rs (resolv.conf lookup, forwarding with deadline)
//!     → reply with the query's transaction ID (TC set if it overflows a UDP payload)
//! ```
//!
//! # Design Decisions
//! - Only A records are ever synthesized; other types always go upstream
//! - No caching and no recursion of our own
//! - Failures degrade to fewer answers, never to an error response

pub mod interfaces;
pub mod responder;
pub mod server;
pub mod upstream;

use std::time::Duration;

use crate::registry::RegistryError;

pub use interfaces::{InterfaceSource, NetworkInterface, StaticInterfaces, SystemInterfaces};
pub use responder::{Responder, Transport};
pub use server::DnsServer;

/// Errors raised while answering a DNS message.
#[derive(Debug, thiserror::Error)]
pub enum DnsError {
    /// Socket or resolver-config I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Wire-format encode/decode failure.
    #[error("DNS protocol error: {0}")]
    Proto(#[from] hickory_proto::error::ProtoError),

    /// Upstream did not answer in time.
    #[error("upstream did not answer within {0:?}")]
    Timeout(Duration),

    /// The registry could not be read.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
