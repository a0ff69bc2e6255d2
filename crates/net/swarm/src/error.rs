//! Swarm error types.

use std::fmt;

use mooring_net_transport::TransportError;
use mooring_primitives::{Multiaddr, PeerId};

use crate::connection::HandshakeError;
use crate::resolver::ResolveError;

/// Why one dial attempt against one concrete address failed.
#[derive(Debug, thiserror::Error)]
pub enum DialError {
    #[error("no registered transport")]
    MissingTransport,
    #[error("no known address")]
    NoKnownAddress,
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("handshake failed: {0}")]
    Handshake(#[from] HandshakeError),
}

/// One failed attempt within a dial sequence.
#[derive(Debug)]
pub struct DialAttempt {
    pub address: Multiaddr,
    pub error: DialError,
}

impl fmt::Display for DialAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.address, self.error)
    }
}

/// Errors surfaced by the swarm's public surface.
///
/// Validation errors abort the call immediately; per-address dial failures
/// are recovered locally and only surface as an [`Unreachable`] aggregate
/// once every attempt is exhausted.
///
/// [`Unreachable`]: SwarmError::Unreachable
#[derive(Debug, thiserror::Error)]
pub enum SwarmError {
    #[error("address {0} has no /p2p identity segment")]
    MissingIdentity(Multiaddr),
    #[error("refusing to register the local peer {0}")]
    SelfRegistration(PeerId),
    #[error("address {0} is not allowed by policy")]
    PolicyDenied(Multiaddr),
    #[error("no registered transport for {0}")]
    MissingTransport(Multiaddr),
    #[error("already listening on {0}")]
    AlreadyListening(Multiaddr),
    #[error("swarm is not started")]
    NotStarted,
    #[error("failed to listen on {addr}: {source}")]
    Listen {
        addr: Multiaddr,
        #[source]
        source: TransportError,
    },
    #[error("failed to resolve {addr}: {source}")]
    Resolve {
        addr: Multiaddr,
        #[source]
        source: ResolveError,
    },
    #[error("peer {peer} unreachable after {} dial attempt(s)", attempts.len())]
    Unreachable {
        peer: PeerId,
        attempts: Vec<DialAttempt>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_reports_attempt_count() {
        let peer: PeerId = "QmYyQSo1c1Ym7orWxLYvCrM2EmxFTANf8wXmmE7DWjhx5N".parse().unwrap();
        let error = SwarmError::Unreachable {
            peer,
            attempts: vec![
                DialAttempt {
                    address: "/ip4/1.2.3.4/tcp/1".parse().unwrap(),
                    error: DialError::MissingTransport,
                },
                DialAttempt {
                    address: "/ip4/1.2.3.4/tcp/2".parse().unwrap(),
                    error: DialError::NoKnownAddress,
                },
            ],
        };
        assert!(error.to_string().contains("2 dial attempt(s)"));
    }

    #[test]
    fn dial_attempt_displays_address_and_cause() {
        let attempt = DialAttempt {
            address: "/ip4/1.2.3.4/tcp/1".parse().unwrap(),
            error: DialError::MissingTransport,
        };
        assert_eq!(
            attempt.to_string(),
            "/ip4/1.2.3.4/tcp/1: no registered transport"
        );
    }
}
