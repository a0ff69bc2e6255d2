//! Peer snapshots.

use std::collections::BTreeSet;

use mooring_primitives::{Multiaddr, PeerId};
use serde::{Deserialize, Serialize};

/// A point-in-time view of a known peer.
///
/// The swarm's peer table is the source of truth; `PeerInfo` values handed to
/// callers are snapshots and may go stale. All mutation happens inside the
/// swarm, which atomically replaces table entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    id: PeerId,
    addresses: BTreeSet<Multiaddr>,
    connected_address: Option<Multiaddr>,
}

impl PeerInfo {
    pub fn new(id: PeerId) -> Self {
        Self {
            id,
            addresses: BTreeSet::new(),
            connected_address: None,
        }
    }

    pub fn id(&self) -> &PeerId {
        &self.id
    }

    /// The known addresses, in canonical order.
    pub fn addresses(&self) -> impl Iterator<Item = &Multiaddr> {
        self.addresses.iter()
    }

    pub fn address_count(&self) -> usize {
        self.addresses.len()
    }

    /// The address a live stream was established over, if any.
    pub fn connected_address(&self) -> Option<&Multiaddr> {
        self.connected_address.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.connected_address.is_some()
    }

    /// Adds an address to the known set. Returns `false` when it was already
    /// present. Every address must carry this peer's identity segment.
    pub(crate) fn insert_address(&mut self, address: Multiaddr) -> bool {
        debug_assert!(
            address.peer_id().is_some_and(|id| id == self.id),
            "address {address} does not carry the identity of {id}",
            id = self.id,
        );
        self.addresses.insert(address)
    }

    pub(crate) fn set_connected(&mut self, address: Option<Multiaddr>) {
        debug_assert!(
            address
                .as_ref()
                .map_or(true, |addr| self.addresses.contains(addr)),
            "connected address must be a known address",
        );
        self.connected_address = address;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer_id(s: &str) -> PeerId {
        s.parse().unwrap()
    }

    #[test]
    fn address_insertion_is_idempotent() {
        let mut peer = PeerInfo::new(peer_id("QmYyQSo1c1Ym7orWxLYvCrM2EmxFTANf8wXmmE7DWjhx5N"));
        let addr: Multiaddr =
            "/ip4/1.2.3.4/tcp/4001/p2p/QmYyQSo1c1Ym7orWxLYvCrM2EmxFTANf8wXmmE7DWjhx5N"
                .parse()
                .unwrap();
        assert!(peer.insert_address(addr.clone()));
        assert!(!peer.insert_address(addr));
        assert_eq!(peer.address_count(), 1);
    }

    #[test]
    fn connection_state_tracks_address() {
        let mut peer = PeerInfo::new(peer_id("QmYyQSo1c1Ym7orWxLYvCrM2EmxFTANf8wXmmE7DWjhx5N"));
        let addr: Multiaddr =
            "/ip4/1.2.3.4/tcp/4001/p2p/QmYyQSo1c1Ym7orWxLYvCrM2EmxFTANf8wXmmE7DWjhx5N"
                .parse()
                .unwrap();
        peer.insert_address(addr.clone());
        assert!(!peer.is_connected());

        peer.set_connected(Some(addr.clone()));
        assert_eq!(peer.connected_address(), Some(&addr));

        peer.set_connected(None);
        assert!(!peer.is_connected());
        // known addresses survive disconnection
        assert_eq!(peer.address_count(), 1);
    }
}
