//! Swarm lifecycle events and non-blocking broadcast emitter.

use mooring_primitives::{Multiaddr, PeerId};
use tokio::sync::broadcast;

/// Events emitted by the swarm.
#[derive(Debug, Clone)]
pub enum SwarmEvent {
    /// A peer entered the peer table, or a new address was recorded for it.
    PeerRegistered { peer: PeerId, address: Multiaddr },
    /// An outbound dial succeeded and the stream is live.
    PeerConnected { peer: PeerId, address: Multiaddr },
    /// A live stream was removed, by request or during shutdown.
    PeerDisconnected { peer: PeerId },
    ListenerStarted { address: Multiaddr },
    ListenerStopped { address: Multiaddr },
    /// An inbound stream passed the responder handshake.
    InboundAccepted { local: Multiaddr, remote: Multiaddr },
    /// An inbound stream failed the responder handshake and was disposed.
    InboundFailed { local: Multiaddr, remote: Multiaddr },
    /// The swarm shut down; all tables were cleared.
    Stopped,
}

impl SwarmEvent {
    /// The peer this event concerns, when it concerns one.
    pub fn peer(&self) -> Option<&PeerId> {
        match self {
            Self::PeerRegistered { peer, .. }
            | Self::PeerConnected { peer, .. }
            | Self::PeerDisconnected { peer } => Some(peer),
            _ => None,
        }
    }

    pub fn is_connection_event(&self) -> bool {
        matches!(
            self,
            Self::PeerConnected { .. } | Self::PeerDisconnected { .. }
        )
    }
}

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Non-blocking broadcast emitter. Slow subscribers drop events independently.
#[derive(Debug, Clone)]
pub(crate) struct EventEmitter {
    tx: broadcast::Sender<SwarmEvent>,
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl EventEmitter {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub(crate) fn emit(&self, event: SwarmEvent) {
        let _ = self.tx.send(event);
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<SwarmEvent> {
        self.tx.subscribe()
    }

    pub(crate) fn peer_registered(&self, peer: PeerId, address: Multiaddr) {
        self.emit(SwarmEvent::PeerRegistered { peer, address });
    }

    pub(crate) fn peer_connected(&self, peer: PeerId, address: Multiaddr) {
        self.emit(SwarmEvent::PeerConnected { peer, address });
    }

    pub(crate) fn peer_disconnected(&self, peer: PeerId) {
        self.emit(SwarmEvent::PeerDisconnected { peer });
    }

    pub(crate) fn listener_started(&self, address: Multiaddr) {
        self.emit(SwarmEvent::ListenerStarted { address });
    }

    pub(crate) fn listener_stopped(&self, address: Multiaddr) {
        self.emit(SwarmEvent::ListenerStopped { address });
    }

    pub(crate) fn inbound_accepted(&self, local: Multiaddr, remote: Multiaddr) {
        self.emit(SwarmEvent::InboundAccepted { local, remote });
    }

    pub(crate) fn inbound_failed(&self, local: Multiaddr, remote: Multiaddr) {
        self.emit(SwarmEvent::InboundFailed { local, remote });
    }

    pub(crate) fn stopped(&self) {
        self.emit(SwarmEvent::Stopped);
    }
}
