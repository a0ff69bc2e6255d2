//! A live stream to a remote endpoint.

use std::fmt;

use async_trait::async_trait;
use mooring_net_transport::BoxedStream;
use mooring_primitives::{Multiaddr, PeerId};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Errors from the connection handshake.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("handshake cancelled")]
    Cancelled,
    #[error("stream closed during handshake")]
    ConnectionClosed,
    #[error("{0}")]
    Failed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Endpoint metadata for a [`Connection`].
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub local_peer: PeerId,
    /// Known for outbound connections; inbound identities are established by
    /// higher layers after the responder handshake.
    pub remote_peer: Option<PeerId>,
    /// Set for inbound connections (the listener address the stream arrived
    /// on); unknown for outbound dials.
    pub local_address: Option<Multiaddr>,
    pub remote_address: Multiaddr,
}

/// Post-dial / post-accept stream negotiation.
///
/// This is an extension point: the swarm core treats both directions as
/// opaque futures that either leave the stream usable or fail it. Security
/// and multiplexing upgrades plug in here.
#[async_trait]
pub trait Handshake: Send + Sync {
    /// Runs the initiator side after an outbound dial.
    async fn outbound(
        &self,
        stream: &mut BoxedStream,
        info: &ConnectionInfo,
    ) -> Result<(), HandshakeError>;

    /// Runs the responder side after an inbound accept.
    async fn inbound(
        &self,
        stream: &mut BoxedStream,
        info: &ConnectionInfo,
    ) -> Result<(), HandshakeError>;
}

/// The default handshake: accepts every stream as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHandshake;

#[async_trait]
impl Handshake for NoopHandshake {
    async fn outbound(
        &self,
        _stream: &mut BoxedStream,
        _info: &ConnectionInfo,
    ) -> Result<(), HandshakeError> {
        Ok(())
    }

    async fn inbound(
        &self,
        _stream: &mut BoxedStream,
        _info: &ConnectionInfo,
    ) -> Result<(), HandshakeError> {
        Ok(())
    }
}

/// An owned duplex stream plus its endpoint metadata.
///
/// Created at dial success or inbound accept; disposed on disconnect, swarm
/// stop, or handshake failure.
pub struct Connection {
    info: ConnectionInfo,
    stream: Option<BoxedStream>,
}

impl Connection {
    /// A connection produced by a successful outbound dial.
    pub fn outbound(
        local_peer: PeerId,
        remote_peer: PeerId,
        remote_address: Multiaddr,
        stream: BoxedStream,
    ) -> Self {
        Self {
            info: ConnectionInfo {
                local_peer,
                remote_peer: Some(remote_peer),
                local_address: None,
                remote_address,
            },
            stream: Some(stream),
        }
    }

    /// A connection produced by an inbound accept.
    pub fn inbound(
        local_peer: PeerId,
        local_address: Multiaddr,
        remote_address: Multiaddr,
        stream: BoxedStream,
    ) -> Self {
        Self {
            info: ConnectionInfo {
                local_peer,
                remote_peer: None,
                local_address: Some(local_address),
                remote_address,
            },
            stream: Some(stream),
        }
    }

    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    pub fn local_peer(&self) -> &PeerId {
        &self.info.local_peer
    }

    pub fn remote_peer(&self) -> Option<&PeerId> {
        self.info.remote_peer.as_ref()
    }

    pub fn remote_address(&self) -> &Multiaddr {
        &self.info.remote_address
    }

    pub fn local_address(&self) -> Option<&Multiaddr> {
        self.info.local_address.as_ref()
    }

    /// Mutable access to the stream for higher-layer I/O.
    pub fn stream_mut(&mut self) -> Option<&mut BoxedStream> {
        self.stream.as_mut()
    }

    /// Runs the initiator handshake, observing `cancel`.
    pub async fn initiate(
        &mut self,
        handshake: &dyn Handshake,
        cancel: &CancellationToken,
    ) -> Result<(), HandshakeError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or(HandshakeError::ConnectionClosed)?;
        tokio::select! {
            _ = cancel.cancelled() => Err(HandshakeError::Cancelled),
            result = handshake.outbound(stream, &self.info) => result,
        }
    }

    /// Runs the responder handshake.
    pub async fn respond(&mut self, handshake: &dyn Handshake) -> Result<(), HandshakeError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or(HandshakeError::ConnectionClosed)?;
        handshake.inbound(stream, &self.info).await
    }

    /// Closes the underlying stream. Idempotent; dropping the stream closes
    /// the transport endpoint without further I/O.
    pub fn dispose(&mut self) {
        if self.stream.take().is_some() {
            trace!(remote = %self.info.remote_address, "connection disposed");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.stream.is_none()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("info", &self.info)
            .field("disposed", &self.stream.is_none())
            .finish()
    }
}
