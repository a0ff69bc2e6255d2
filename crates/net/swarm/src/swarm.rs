//! The swarm: peer, stream and listener tables plus dial coordination.

use std::collections::{BTreeSet, HashMap};
use std::mem;
use std::sync::Arc;

use mooring_net_transport::{Accepted, AcceptSink, TransportError, TransportRegistry};
use mooring_primitives::{Multiaddr, PeerId};
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::connection::{Connection, Handshake, HandshakeError, NoopHandshake};
use crate::error::{DialAttempt, DialError, SwarmError};
use crate::events::{EventEmitter, SwarmEvent};
use crate::peer::PeerInfo;
use crate::policy::{AddressPolicy, PolicyList};
use crate::resolver::{AddressResolver, IdentityResolver, ResolveError};

/// Receives inbound connections that passed the responder handshake.
pub type InboundHandler = Arc<dyn Fn(Connection) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Stopped,
    Started,
    Stopping,
}

struct ListenerEntry {
    cancel: CancellationToken,
    /// The effective bound address (port 0 resolved), tracked so stopping a
    /// listener can also retire the observed address it produced.
    advertised: Multiaddr,
}

/// Construction-time wiring for a [`Swarm`].
pub struct SwarmConfig {
    local_id: PeerId,
    addresses: Vec<Multiaddr>,
    registry: TransportRegistry,
    resolver: Arc<dyn AddressResolver>,
    handshake: Arc<dyn Handshake>,
}

impl SwarmConfig {
    /// Defaults: TCP-only registry, passthrough resolver, no-op handshake.
    pub fn new(local_id: PeerId) -> Self {
        Self {
            local_id,
            addresses: Vec::new(),
            registry: TransportRegistry::with_defaults(),
            resolver: Arc::new(IdentityResolver),
            handshake: Arc::new(NoopHandshake),
        }
    }

    /// Adds a configured (externally advertised) address for the local peer.
    pub fn with_address(mut self, address: Multiaddr) -> Self {
        self.addresses.push(address);
        self
    }

    pub fn with_registry(mut self, registry: TransportRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn AddressResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_handshake(mut self, handshake: Arc<dyn Handshake>) -> Self {
        self.handshake = handshake;
        self
    }
}

impl std::fmt::Debug for SwarmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwarmConfig")
            .field("local_id", &self.local_id)
            .field("addresses", &self.addresses)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// The coordinator owning peer, stream, listener and policy state.
///
/// All mutable shared state lives in per-table locks with atomic per-key
/// upserts; no lock is held across an await point. Callers receive
/// [`PeerInfo`] snapshots that may go stale.
pub struct Swarm {
    local_id: PeerId,
    configured_addrs: Vec<Multiaddr>,
    registry: TransportRegistry,
    resolver: Arc<dyn AddressResolver>,
    handshake: Arc<dyn Handshake>,

    phase: RwLock<Phase>,
    peers: RwLock<HashMap<PeerId, PeerInfo>>,
    connections: Mutex<HashMap<PeerId, Connection>>,
    listeners: Mutex<HashMap<Multiaddr, ListenerEntry>>,
    listen_addrs: RwLock<BTreeSet<Multiaddr>>,
    policy: RwLock<AddressPolicy>,
    inbound: RwLock<Option<InboundHandler>>,
    events: EventEmitter,
}

impl Swarm {
    pub fn new(config: SwarmConfig) -> Arc<Self> {
        Arc::new(Self {
            local_id: config.local_id,
            configured_addrs: config.addresses,
            registry: config.registry,
            resolver: config.resolver,
            handshake: config.handshake,
            phase: RwLock::new(Phase::Stopped),
            peers: RwLock::new(HashMap::new()),
            connections: Mutex::new(HashMap::new()),
            listeners: Mutex::new(HashMap::new()),
            listen_addrs: RwLock::new(BTreeSet::new()),
            policy: RwLock::new(AddressPolicy::new()),
            inbound: RwLock::new(None),
            events: EventEmitter::default(),
        })
    }

    /// Transitions Stopped → Started. Idempotent.
    pub fn start(&self) {
        let mut phase = self.phase.write();
        match *phase {
            Phase::Stopped => {
                *phase = Phase::Started;
                info!(local = %self.local_id, "swarm started");
            }
            Phase::Started | Phase::Stopping => {
                debug!("start ignored; swarm already running");
            }
        }
    }

    /// Shuts the swarm down: cancels every listener, disposes every live
    /// stream, clears all tables and resets the policy lists. Idempotent;
    /// per-item failures are swallowed so shutdown always completes.
    pub fn stop(&self) {
        let mut phase = self.phase.write();
        if *phase == Phase::Stopped {
            return;
        }
        *phase = Phase::Stopping;
        info!("stopping swarm");

        let listeners = mem::take(&mut *self.listeners.lock());
        for (addr, entry) in listeners {
            entry.cancel.cancel();
            trace!(addr = %addr, "listener cancelled");
            self.events.listener_stopped(entry.advertised);
        }

        let connections = mem::take(&mut *self.connections.lock());
        for (peer, mut connection) in connections {
            connection.dispose();
            self.events.peer_disconnected(peer);
        }

        self.peers.write().clear();
        self.listen_addrs.write().clear();
        *self.policy.write() = AddressPolicy::new();

        *phase = Phase::Stopped;
        self.events.stopped();
        info!("swarm stopped");
    }

    fn ensure_started(&self) -> Result<(), SwarmError> {
        match *self.phase.read() {
            Phase::Started => Ok(()),
            Phase::Stopped | Phase::Stopping => Err(SwarmError::NotStarted),
        }
    }

    /// Validates `addr` and upserts its peer into the peer table.
    ///
    /// The address must terminate in `/p2p/<id>`, must not name the local
    /// peer, and must pass the allow/deny policy. The upsert is atomic with
    /// respect to concurrent registrations and connects for the same peer.
    pub async fn register_peer(
        &self,
        addr: &Multiaddr,
        _cancel: &CancellationToken,
    ) -> Result<PeerInfo, SwarmError> {
        let phase = self.phase.read();
        if *phase != Phase::Started {
            return Err(SwarmError::NotStarted);
        }
        let peer_id = addr
            .peer_id()
            .ok_or_else(|| SwarmError::MissingIdentity(addr.clone()))?;
        if peer_id == self.local_id {
            return Err(SwarmError::SelfRegistration(peer_id));
        }
        if !self.policy.read().allowed(addr) {
            return Err(SwarmError::PolicyDenied(addr.clone()));
        }

        let (snapshot, added) = {
            let mut peers = self.peers.write();
            let peer = peers
                .entry(peer_id.clone())
                .or_insert_with(|| PeerInfo::new(peer_id.clone()));
            let added = peer.insert_address(addr.clone());
            (peer.clone(), added)
        };
        drop(phase);

        if added {
            debug!(peer = %peer_id, addr = %addr, "peer registered");
            self.events.peer_registered(peer_id, addr.clone());
        }
        Ok(snapshot)
    }

    /// Registers the peer behind `addr` and dials it.
    ///
    /// Resolution expands the address into concrete candidates; candidates
    /// are attempted in order, and within each the first segment with a
    /// registered transport is used. Per-attempt failures accumulate and
    /// only surface as [`SwarmError::Unreachable`] once everything failed.
    ///
    /// Returns `None` iff the token fired mid-dial: the peer stays
    /// registered, no stream is stored and `connected_address` stays unset.
    pub async fn connect(
        &self,
        addr: &Multiaddr,
        cancel: &CancellationToken,
    ) -> Result<Option<PeerInfo>, SwarmError> {
        let peer = self.register_peer(addr, cancel).await?;
        if peer.is_connected() {
            trace!(peer = %peer.id(), "already connected");
            return Ok(Some(peer));
        }
        let peer_id = peer.id().clone();

        let resolved = tokio::select! {
            _ = cancel.cancelled() => return Ok(None),
            resolved = self.resolver.resolve(addr, cancel) => match resolved {
                Ok(resolved) => resolved,
                Err(ResolveError::Cancelled) => return Ok(None),
                Err(source) => {
                    return Err(SwarmError::Resolve {
                        addr: addr.clone(),
                        source,
                    })
                }
            },
        };

        let mut attempts = Vec::new();
        if resolved.is_empty() {
            attempts.push(DialAttempt {
                address: addr.clone(),
                error: DialError::NoKnownAddress,
            });
        }

        for candidate in &resolved {
            if cancel.is_cancelled() {
                return Ok(None);
            }
            let Some((transport, protocol)) = self.registry.select(candidate) else {
                attempts.push(DialAttempt {
                    address: candidate.clone(),
                    error: DialError::MissingTransport,
                });
                continue;
            };

            trace!(peer = %peer_id, addr = %candidate, transport = protocol, "dialing");
            let stream = match transport.connect(candidate, cancel).await {
                Ok(stream) => stream,
                Err(TransportError::Cancelled) => return Ok(None),
                Err(error) => {
                    debug!(peer = %peer_id, addr = %candidate, %error, "dial attempt failed");
                    attempts.push(DialAttempt {
                        address: candidate.clone(),
                        error: error.into(),
                    });
                    continue;
                }
            };

            let mut connection = Connection::outbound(
                self.local_id.clone(),
                peer_id.clone(),
                candidate.clone(),
                stream,
            );
            match connection.initiate(self.handshake.as_ref(), cancel).await {
                Ok(()) => {}
                Err(HandshakeError::Cancelled) => {
                    connection.dispose();
                    return Ok(None);
                }
                Err(error) => {
                    connection.dispose();
                    debug!(peer = %peer_id, addr = %candidate, %error, "initiator handshake failed");
                    attempts.push(DialAttempt {
                        address: candidate.clone(),
                        error: error.into(),
                    });
                    continue;
                }
            }

            let Some(snapshot) = self.commit_connection(connection) else {
                // the swarm stopped while the dial was in flight
                return Ok(None);
            };
            info!(peer = %peer_id, addr = %candidate, "peer connected");
            self.events.peer_connected(peer_id.clone(), candidate.clone());
            return Ok(Some(snapshot));
        }

        Err(SwarmError::Unreachable {
            peer: peer_id,
            attempts,
        })
    }

    /// Publishes a dialed connection into the tables. Last writer wins: a
    /// stream stored by a racing dial is disposed in favour of this one.
    /// Returns `None` when the swarm is no longer started.
    fn commit_connection(&self, mut connection: Connection) -> Option<PeerInfo> {
        let phase = self.phase.read();
        if *phase != Phase::Started {
            connection.dispose();
            return None;
        }
        let peer_id = connection.remote_peer().cloned()?;
        let address = connection.remote_address().clone();

        if let Some(mut orphan) = self.connections.lock().insert(peer_id.clone(), connection) {
            debug!(peer = %peer_id, "disposing stream orphaned by a racing dial");
            orphan.dispose();
        }

        let mut peers = self.peers.write();
        let peer = peers
            .entry(peer_id.clone())
            .or_insert_with(|| PeerInfo::new(peer_id.clone()));
        peer.insert_address(address.clone());
        peer.set_connected(Some(address));
        Some(peer.clone())
    }

    /// Tears down the live stream to the peer named by `addr`, if any.
    ///
    /// Idempotent and infallible: unknown peers, identity-less addresses and
    /// already-disconnected peers are silent no-ops. The peer's known
    /// addresses survive.
    pub async fn disconnect(&self, addr: &Multiaddr, _cancel: &CancellationToken) {
        let Some(peer_id) = addr.peer_id() else {
            trace!(addr = %addr, "disconnect without identity segment; nothing to do");
            return;
        };
        let connection = self.connections.lock().remove(&peer_id);
        let had_stream = connection.is_some();
        if let Some(mut connection) = connection {
            connection.dispose();
        }
        if let Some(peer) = self.peers.write().get_mut(&peer_id) {
            peer.set_connected(None);
        }
        if had_stream {
            debug!(peer = %peer_id, "peer disconnected");
            self.events.peer_disconnected(peer_id);
        }
    }

    /// Starts a listener on `addr` and returns the dial-me address: the
    /// effective bound address (port 0 resolved) extended with
    /// `/p2p/<local id>`.
    pub async fn start_listening(self: &Arc<Self>, addr: &Multiaddr) -> Result<Multiaddr, SwarmError> {
        self.ensure_started()?;
        let Some((transport, _)) = self.registry.select(addr) else {
            return Err(SwarmError::MissingTransport(addr.clone()));
        };

        let cancel = CancellationToken::new();
        {
            let phase = self.phase.read();
            if *phase != Phase::Started {
                return Err(SwarmError::NotStarted);
            }
            let mut listeners = self.listeners.lock();
            if listeners.contains_key(addr) {
                return Err(SwarmError::AlreadyListening(addr.clone()));
            }
            listeners.insert(
                addr.clone(),
                ListenerEntry {
                    cancel: cancel.clone(),
                    advertised: addr.clone(),
                },
            );
            self.listen_addrs.write().insert(addr.clone());
        }

        let sink = self.accept_sink();
        let effective = match transport.listen(addr, sink, cancel.clone()).await {
            Ok(effective) => effective,
            Err(source) => {
                self.listeners.lock().remove(addr);
                self.listen_addrs.write().remove(addr);
                return Err(SwarmError::Listen {
                    addr: addr.clone(),
                    source,
                });
            }
        };

        let raced = {
            let phase = self.phase.read();
            let mut listeners = self.listeners.lock();
            match listeners.get_mut(addr).filter(|_| *phase == Phase::Started) {
                Some(entry) => {
                    entry.advertised = effective.clone();
                    let mut observed = self.listen_addrs.write();
                    observed.remove(addr);
                    observed.insert(effective.clone());
                    false
                }
                // stop() or stop_listening() won the race against the bind;
                // shut the freshly started accept loop down
                None => {
                    cancel.cancel();
                    true
                }
            }
        };
        if !raced {
            info!(addr = %effective, "listening");
            self.events.listener_started(effective.clone());
        }

        Ok(effective.with_peer_id(&self.local_id))
    }

    /// Stops the listener started for `addr`. Never fails; unknown addresses
    /// are a silent no-op.
    pub fn stop_listening(&self, addr: &Multiaddr) {
        let Some(entry) = self.listeners.lock().remove(addr) else {
            return;
        };
        entry.cancel.cancel();
        {
            let mut observed = self.listen_addrs.write();
            observed.remove(addr);
            observed.remove(&entry.advertised);
        }
        debug!(addr = %addr, "stopped listening");
        self.events.listener_stopped(entry.advertised);
    }

    fn accept_sink(self: &Arc<Self>) -> AcceptSink {
        let swarm = Arc::downgrade(self);
        Arc::new(move |accepted| {
            let Some(swarm) = swarm.upgrade() else { return };
            tokio::spawn(async move { swarm.accept(accepted).await });
        })
    }

    /// Handles one inbound stream: runs the responder handshake and hands
    /// the connection to the inbound handler.
    ///
    /// Failures are disposed and logged, never propagated. The remote peer
    /// is not registered and policy is not re-evaluated here; both are the
    /// receiving layer's decision once it has established an identity.
    async fn accept(self: Arc<Self>, accepted: Accepted) {
        let Accepted {
            stream,
            local,
            remote,
        } = accepted;
        trace!(local = %local, remote = %remote, "inbound stream");

        let mut connection =
            Connection::inbound(self.local_id.clone(), local.clone(), remote.clone(), stream);
        if self.ensure_started().is_err() {
            // delivered while shutting down; nothing above us wants it
            connection.dispose();
            return;
        }
        if let Err(error) = connection.respond(self.handshake.as_ref()).await {
            warn!(remote = %remote, %error, "responder handshake failed");
            connection.dispose();
            self.events.inbound_failed(local, remote);
            return;
        }

        self.events.inbound_accepted(local, remote.clone());
        let handler = self.inbound.read().clone();
        match handler {
            Some(handler) => handler(connection),
            None => {
                debug!(remote = %remote, "no inbound handler; disposing accepted connection");
                connection.dispose();
            }
        }
    }

    /// Installs the callback receiving accepted inbound connections.
    pub fn set_inbound_handler(&self, handler: InboundHandler) {
        *self.inbound.write() = Some(handler);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SwarmEvent> {
        self.events.subscribe()
    }

    /// The local peer as a snapshot: configured addresses plus the
    /// currently observed listen addresses, each carrying the local
    /// identity suffix so they are directly dialable.
    pub fn local_peer(&self) -> PeerInfo {
        let mut info = PeerInfo::new(self.local_id.clone());
        for addr in &self.configured_addrs {
            info.insert_address(addr.with_peer_id(&self.local_id));
        }
        for addr in self.listen_addrs.read().iter() {
            info.insert_address(addr.with_peer_id(&self.local_id));
        }
        info
    }

    pub fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    /// Snapshot of every known peer.
    pub fn known_peers(&self) -> Vec<PeerInfo> {
        self.peers.read().values().cloned().collect()
    }

    /// Every address known across all peers.
    pub fn known_peer_addresses(&self) -> Vec<Multiaddr> {
        self.peers
            .read()
            .values()
            .flat_map(|peer| peer.addresses().cloned().collect::<Vec<_>>())
            .collect()
    }

    /// Snapshot of the peers with a live stream.
    pub fn connected_peers(&self) -> Vec<PeerInfo> {
        self.peers
            .read()
            .values()
            .filter(|peer| peer.is_connected())
            .cloned()
            .collect()
    }

    /// The currently observed listen addresses.
    pub fn listen_addresses(&self) -> Vec<Multiaddr> {
        self.listen_addrs.read().iter().cloned().collect()
    }

    pub fn is_allowed(&self, addr: &Multiaddr) -> bool {
        self.policy.read().allowed(addr)
    }

    pub fn is_not_allowed(&self, addr: &Multiaddr) -> bool {
        !self.is_allowed(addr)
    }

    pub fn allow_list(&self) -> PolicyList {
        self.policy.read().allow().clone()
    }

    pub fn deny_list(&self) -> PolicyList {
        self.policy.read().deny().clone()
    }

    pub fn add_allowed(&self, pattern: Multiaddr) -> bool {
        self.policy.write().allow_mut().insert(pattern)
    }

    pub fn remove_allowed(&self, pattern: &Multiaddr) -> bool {
        self.policy.write().allow_mut().remove(pattern)
    }

    pub fn add_denied(&self, pattern: Multiaddr) -> bool {
        self.policy.write().deny_mut().insert(pattern)
    }

    pub fn remove_denied(&self, pattern: &Multiaddr) -> bool {
        self.policy.write().deny_mut().remove(pattern)
    }
}

impl std::fmt::Debug for Swarm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Swarm")
            .field("local_id", &self.local_id)
            .field("phase", &*self.phase.read())
            .field("peers", &self.peers.read().len())
            .field("connections", &self.connections.lock().len())
            .field("listeners", &self.listeners.lock().len())
            .finish()
    }
}
