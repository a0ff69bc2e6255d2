//! Address and identity primitives for the mooring p2p node.
//!
//! - [`Multiaddr`] - layered `/proto/value/…` network addresses
//! - [`PeerId`] - opaque base58 peer identity

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod multiaddr;
mod peer_id;

pub use multiaddr::{Multiaddr, MultiaddrError, Protocol, Segment};
pub use peer_id::{PeerId, PeerIdError};
