//! Registration, policy and shutdown behaviour.

use std::sync::Arc;

use mooring_net_swarm::{
    MemoryHub, MemoryTransport, Multiaddr, PeerId, Swarm, SwarmConfig, SwarmError,
    TransportRegistry,
};
use tokio_util::sync::CancellationToken;

const LOCAL_ID: &str = "QmYyQSo1c1Ym7orWxLYvCrM2EmxFTANf8wXmmE7DWjhx5N";
const REMOTE_ID: &str = "QmSoLer265NRgSp2LA3dPaeykiS1J6DifTC88f5uVQKNAd";

fn addr(s: &str) -> Multiaddr {
    s.parse().unwrap()
}

fn peer_id(s: &str) -> PeerId {
    s.parse().unwrap()
}

fn started_swarm() -> Arc<Swarm> {
    let mut registry = TransportRegistry::with_defaults();
    registry.register(Arc::new(MemoryTransport::new(MemoryHub::new())));
    let swarm = Swarm::new(SwarmConfig::new(peer_id(LOCAL_ID)).with_registry(registry));
    swarm.start();
    swarm
}

#[tokio::test]
async fn register_requires_identity_segment() {
    let swarm = started_swarm();
    let result = swarm
        .register_peer(&addr("/ip4/127.0.0.1/tcp/4001"), &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(SwarmError::MissingIdentity(_))));
}

#[tokio::test]
async fn register_rejects_the_local_peer() {
    let swarm = started_swarm();
    let result = swarm
        .register_peer(
            &addr(&format!("/ip4/1.2.3.4/tcp/4001/p2p/{LOCAL_ID}")),
            &CancellationToken::new(),
        )
        .await;
    assert!(matches!(result, Err(SwarmError::SelfRegistration(_))));
}

#[tokio::test]
async fn register_honours_the_deny_list() {
    let swarm = started_swarm();
    let denied = addr(&format!("/ip4/10.0.0.1/tcp/4001/p2p/{REMOTE_ID}"));
    swarm.add_denied(denied.clone());

    let result = swarm.register_peer(&denied, &CancellationToken::new()).await;
    assert!(matches!(result, Err(SwarmError::PolicyDenied(_))));
    assert!(swarm.is_not_allowed(&denied));
    assert!(swarm.known_peers().is_empty());
}

#[tokio::test]
async fn register_honours_the_allow_list() {
    let swarm = started_swarm();
    swarm.add_allowed(addr("/ip4/192.168.0.0"));

    let inside = addr(&format!("/ip4/192.168.0.0/tcp/4001/p2p/{REMOTE_ID}"));
    let outside = addr(&format!("/ip4/8.8.8.8/tcp/4001/p2p/{REMOTE_ID}"));
    assert!(swarm.register_peer(&inside, &CancellationToken::new()).await.is_ok());
    assert!(matches!(
        swarm.register_peer(&outside, &CancellationToken::new()).await,
        Err(SwarmError::PolicyDenied(_))
    ));
}

#[tokio::test]
async fn registration_is_idempotent() {
    let swarm = started_swarm();
    let address = addr(&format!("/ip4/1.2.3.4/tcp/4001/p2p/{REMOTE_ID}"));

    let first = swarm.register_peer(&address, &CancellationToken::new()).await.unwrap();
    let second = swarm.register_peer(&address, &CancellationToken::new()).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(swarm.known_peers().len(), 1);
    assert_eq!(swarm.known_peer_addresses().len(), 1);
}

#[tokio::test]
async fn two_addresses_merge_into_one_peer() {
    let swarm = started_swarm();
    let a = addr(&format!("/ip4/1.2.3.4/tcp/4001/p2p/{REMOTE_ID}"));
    let b = addr(&format!("/ip6/::1/tcp/4001/p2p/{REMOTE_ID}"));

    swarm.register_peer(&a, &CancellationToken::new()).await.unwrap();
    swarm.register_peer(&b, &CancellationToken::new()).await.unwrap();

    let peers = swarm.known_peers();
    assert_eq!(peers.len(), 1);
    let addresses: Vec<_> = peers[0].addresses().cloned().collect();
    assert!(addresses.contains(&a));
    assert!(addresses.contains(&b));
    assert_eq!(addresses.len(), 2);
}

#[tokio::test]
async fn mutating_operations_require_start() {
    let swarm = Swarm::new(SwarmConfig::new(peer_id(LOCAL_ID)));
    let address = addr(&format!("/ip4/1.2.3.4/tcp/4001/p2p/{REMOTE_ID}"));

    let result = swarm.register_peer(&address, &CancellationToken::new()).await;
    assert!(matches!(result, Err(SwarmError::NotStarted)));
    let result = swarm.connect(&address, &CancellationToken::new()).await;
    assert!(matches!(result, Err(SwarmError::NotStarted)));
    let result = swarm.start_listening(&addr("/ip4/127.0.0.1/tcp/0")).await;
    assert!(matches!(result, Err(SwarmError::NotStarted)));

    // disconnect never fails, started or not
    swarm.disconnect(&address, &CancellationToken::new()).await;
}

#[tokio::test]
async fn disconnect_is_idempotent_and_silent() {
    let swarm = started_swarm();
    let address = addr(&format!("/ip4/1.2.3.4/tcp/4001/p2p/{REMOTE_ID}"));

    // unknown peer, no identity, registered-but-not-connected: all silent
    swarm.disconnect(&addr("/ip4/1.2.3.4/tcp/4001"), &CancellationToken::new()).await;
    swarm.disconnect(&address, &CancellationToken::new()).await;
    swarm.register_peer(&address, &CancellationToken::new()).await.unwrap();
    swarm.disconnect(&address, &CancellationToken::new()).await;
    swarm.disconnect(&address, &CancellationToken::new()).await;

    // the peer and its addresses survive
    assert_eq!(swarm.known_peers().len(), 1);
}

#[tokio::test]
async fn stop_clears_all_tables_and_policy() {
    let swarm = started_swarm();
    let address = addr(&format!("/ip4/1.2.3.4/tcp/4001/p2p/{REMOTE_ID}"));
    swarm.register_peer(&address, &CancellationToken::new()).await.unwrap();
    swarm.add_denied(addr("/ip4/10.0.0.1"));
    swarm.start_listening(&addr("/ip4/127.0.0.1/tcp/0")).await.unwrap();

    swarm.stop();

    assert!(swarm.known_peers().is_empty());
    assert!(swarm.known_peer_addresses().is_empty());
    assert!(swarm.listen_addresses().is_empty());
    assert!(swarm.deny_list().is_empty());
    assert!(swarm.allow_list().is_empty());

    // stop is idempotent, and start re-enters a clean state
    swarm.stop();
    swarm.start();
    assert!(swarm.known_peers().is_empty());
    swarm.register_peer(&address, &CancellationToken::new()).await.unwrap();
    assert_eq!(swarm.known_peers().len(), 1);
}

#[tokio::test]
async fn local_peer_reflects_configured_addresses() {
    let configured = addr("/ip4/203.0.113.5/tcp/4001");
    let swarm = Swarm::new(
        SwarmConfig::new(peer_id(LOCAL_ID)).with_address(configured.clone()),
    );
    swarm.start();

    let local = swarm.local_peer();
    assert_eq!(local.id(), &peer_id(LOCAL_ID));
    let dialable = configured.with_peer_id(&peer_id(LOCAL_ID));
    assert!(local.addresses().any(|a| a == &dialable));
    assert!(!local.is_connected());
}
