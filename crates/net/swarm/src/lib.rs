//! Peer table, policy, connection lifecycle and dial coordination for the
//! mooring p2p node.
//!
//! The [`Swarm`] owns the set of known and connected peers, multiplexes
//! per-peer streams over the transports registered in an injected
//! [`TransportRegistry`], enforces the allow/deny [`AddressPolicy`], and
//! drives dial, handshake, listen, accept and disconnect lifecycles.
//!
//! ```no_run
//! use std::sync::Arc;
//! use mooring_net_swarm::{Swarm, SwarmConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let local_id = "QmYyQSo1c1Ym7orWxLYvCrM2EmxFTANf8wXmmE7DWjhx5N".parse()?;
//! let swarm = Swarm::new(SwarmConfig::new(local_id));
//! swarm.start();
//!
//! let advertised = swarm.start_listening(&"/ip4/0.0.0.0/tcp/0".parse()?).await?;
//! println!("dial me at {advertised}");
//!
//! let remote = "/ip4/104.131.131.82/tcp/4001/p2p/QmaCpDMGvV2BGHeYERUEnRQAwe3N8SzbUtfsmvsqQLuvuJ".parse()?;
//! let peer = swarm.connect(&remote, &CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod connection;
mod error;
mod events;
mod peer;
mod policy;
mod resolver;
mod swarm;

pub use connection::{Connection, ConnectionInfo, Handshake, HandshakeError, NoopHandshake};
pub use error::{DialAttempt, DialError, SwarmError};
pub use events::SwarmEvent;
pub use peer::PeerInfo;
pub use policy::{AddressPolicy, PolicyList};
pub use resolver::{AddressResolver, IdentityResolver, ResolveError};
pub use swarm::{InboundHandler, Swarm, SwarmConfig};

pub use mooring_net_transport::{
    Accepted, AcceptSink, BoxedStream, MemoryHub, MemoryTransport, TcpTransport, Transport,
    TransportError, TransportRegistry,
};
pub use mooring_primitives::{Multiaddr, MultiaddrError, PeerId, Protocol, Segment};
