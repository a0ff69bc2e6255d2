//! Explicit protocol-name → transport mapping.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use mooring_primitives::Multiaddr;

use crate::{TcpTransport, Transport};

/// Maps protocol segment names to transports.
///
/// Built once at node construction and injected into the swarm; addresses
/// select a transport by scanning their segments in order and taking the
/// first registered name.
#[derive(Clone, Default)]
pub struct TransportRegistry {
    transports: HashMap<&'static str, Arc<dyn Transport>>,
}

impl TransportRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in TCP transport.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(TcpTransport::new()));
        registry
    }

    /// Registers `transport` under its protocol name, replacing any previous
    /// transport for that name.
    pub fn register(&mut self, transport: Arc<dyn Transport>) -> &mut Self {
        self.transports.insert(transport.protocol(), transport);
        self
    }

    pub fn lookup(&self, protocol: &str) -> Option<Arc<dyn Transport>> {
        self.transports.get(protocol).map(Arc::clone)
    }

    /// Selects the transport for `addr`: the first segment, in address
    /// order, whose protocol name is registered wins. `None` when no segment
    /// matches.
    pub fn select(&self, addr: &Multiaddr) -> Option<(Arc<dyn Transport>, &'static str)> {
        addr.iter().find_map(|segment| {
            self.transports
                .get_key_value(segment.protocol().as_str())
                .map(|(name, transport)| (Arc::clone(transport), *name))
        })
    }

    /// The registered protocol names, in no particular order.
    pub fn protocols(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.transports.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.transports.is_empty()
    }
}

impl fmt::Debug for TransportRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportRegistry")
            .field("protocols", &self.transports.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryHub, MemoryTransport};

    fn addr(s: &str) -> Multiaddr {
        s.parse().unwrap()
    }

    #[test]
    fn defaults_carry_tcp() {
        let registry = TransportRegistry::with_defaults();
        assert!(registry.lookup("tcp").is_some());
        assert!(registry.lookup("udp").is_none());
    }

    #[test]
    fn select_scans_segments_in_order() {
        let registry = TransportRegistry::with_defaults();

        let (_, name) = registry.select(&addr("/ip4/1.2.3.4/tcp/4001")).unwrap();
        assert_eq!(name, "tcp");

        // dns4 is unregistered; the scan keeps going until tcp
        let (_, name) = registry
            .select(&addr("/dns4/node.example.com/tcp/443/wss"))
            .unwrap();
        assert_eq!(name, "tcp");

        assert!(registry.select(&addr("/ip4/1.2.3.4/udp/4001")).is_none());
    }

    #[test]
    fn earlier_segment_wins() {
        let mut registry = TransportRegistry::with_defaults();
        registry.register(Arc::new(MemoryTransport::new(MemoryHub::new())));

        let (_, name) = registry.select(&addr("/memory/7/tcp/1")).unwrap();
        assert_eq!(name, "memory");
        let (_, name) = registry.select(&addr("/ip4/0.0.0.0/tcp/1/memory/7")).unwrap();
        assert_eq!(name, "tcp");
    }
}
