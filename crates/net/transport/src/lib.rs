//! Transport abstraction for the mooring p2p node.
//!
//! A [`Transport`] turns one protocol segment of a [`Multiaddr`] into duplex
//! byte streams: `connect` dials out, `listen` runs a detached accept loop.
//! Transports are collected in an explicit [`TransportRegistry`] injected at
//! node construction; there is no process-wide registry.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use mooring_primitives::Multiaddr;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;

mod error;
mod memory;
mod registry;
mod tcp;

pub use error::TransportError;
pub use memory::{MemoryHub, MemoryTransport};
pub use registry::TransportRegistry;
pub use tcp::TcpTransport;

/// A duplex byte stream, as produced by a transport.
pub trait DuplexStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> DuplexStream for T {}

/// Owned, type-erased duplex stream.
pub type BoxedStream = Box<dyn DuplexStream>;

/// An inbound stream delivered by a listening transport.
pub struct Accepted {
    pub stream: BoxedStream,
    /// The local address the stream arrived on.
    pub local: Multiaddr,
    /// The remote endpoint's address as observed by the transport.
    pub remote: Multiaddr,
}

impl fmt::Debug for Accepted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accepted")
            .field("local", &self.local)
            .field("remote", &self.remote)
            .finish_non_exhaustive()
    }
}

/// Callback receiving inbound streams from a listener's accept loop.
///
/// Implementations must not be retained by the transport once the listen
/// cancellation signal has fired.
pub type AcceptSink = Arc<dyn Fn(Accepted) + Send + Sync>;

/// A mechanism translating one protocol segment into duplex byte streams.
#[async_trait]
pub trait Transport: Send + Sync {
    /// The protocol segment name this transport registers under (`"tcp"`, …).
    fn protocol(&self) -> &'static str;

    /// Dials `addr`, resolving to a duplex stream.
    ///
    /// Fails with [`TransportError::Unsupported`] when `addr` has no segment
    /// this transport can service, [`TransportError::Cancelled`] when the
    /// token fires mid-dial, and a connect error otherwise.
    async fn connect(
        &self,
        addr: &Multiaddr,
        cancel: &CancellationToken,
    ) -> Result<BoxedStream, TransportError>;

    /// Binds `addr` and returns the effective bound address (port 0
    /// resolved), then keeps delivering inbound streams to `on_accept` from
    /// a detached task until `cancel` fires.
    async fn listen(
        &self,
        addr: &Multiaddr,
        on_accept: AcceptSink,
        cancel: CancellationToken,
    ) -> Result<Multiaddr, TransportError>;
}
