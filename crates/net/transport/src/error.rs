//! Transport error types.

use std::io;

use mooring_primitives::Multiaddr;

/// Errors surfaced by [`Transport`](crate::Transport) implementations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The transport cannot service this address shape at all.
    #[error("transport cannot service {0}")]
    Unsupported(Multiaddr),
    /// The cancellation signal fired while the operation was in flight.
    #[error("operation cancelled")]
    Cancelled,
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: Multiaddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to listen on {addr}: {source}")]
    Listen {
        addr: Multiaddr,
        #[source]
        source: io::Error,
    },
    /// Nothing is listening at the dialed in-process address.
    #[error("no listener at {0}")]
    ListenerNotFound(Multiaddr),
}

impl TransportError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
