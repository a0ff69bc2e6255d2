//! In-process memory transport.
//!
//! Useful for tests and single-process embeddings: listeners register on a
//! shared [`MemoryHub`] under `/memory/<channel>` addresses and dials are
//! routed to them over in-memory duplex pipes. The hub is an explicit value
//! handed to every [`MemoryTransport`] that should share a namespace; there
//! is no process-wide router.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use mooring_primitives::{Multiaddr, Protocol, Segment};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{Accepted, AcceptSink, BoxedStream, Transport, TransportError};

const PIPE_CAPACITY: usize = 64 * 1024;

struct MemoryListener {
    local: Multiaddr,
    sink: AcceptSink,
    cancel: CancellationToken,
}

/// Shared routing table for [`MemoryTransport`] endpoints.
#[derive(Clone, Default)]
pub struct MemoryHub {
    inner: Arc<HubInner>,
}

#[derive(Default)]
struct HubInner {
    listeners: Mutex<HashMap<u64, MemoryListener>>,
    next_channel: AtomicU64,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_channel(&self) -> u64 {
        // channel 0 is the wildcard, never allocated
        self.inner.next_channel.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn register(&self, channel: u64, listener: MemoryListener) -> Result<(), TransportError> {
        let mut listeners = self.inner.listeners.lock();
        if let Some(existing) = listeners.get(&channel) {
            if !existing.cancel.is_cancelled() {
                return Err(TransportError::Listen {
                    addr: listener.local,
                    source: io::Error::from(io::ErrorKind::AddrInUse),
                });
            }
        }
        listeners.insert(channel, listener);
        Ok(())
    }

    /// Retires a listener slot, but only while it still holds a cancelled
    /// listener: the channel may have been re-registered in the meantime.
    fn remove_if_cancelled(&self, channel: u64) {
        let mut listeners = self.inner.listeners.lock();
        if listeners.get(&channel).is_some_and(|l| l.cancel.is_cancelled()) {
            listeners.remove(&channel);
        }
    }

    /// Delivers a dial to the listener on `channel`, returning the dialer's
    /// end of the pipe.
    fn route(&self, channel: u64, remote: Multiaddr) -> Option<BoxedStream> {
        let listeners = self.inner.listeners.lock();
        let listener = listeners.get(&channel).filter(|l| !l.cancel.is_cancelled())?;
        let (dialer_end, listener_end) = tokio::io::duplex(PIPE_CAPACITY);
        (listener.sink)(Accepted {
            stream: Box::new(listener_end),
            local: listener.local.clone(),
            remote,
        });
        Some(Box::new(dialer_end))
    }
}

impl std::fmt::Debug for MemoryHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryHub")
            .field("listeners", &self.inner.listeners.lock().len())
            .finish()
    }
}

/// Transport for `/memory/<channel>` addresses routed through a [`MemoryHub`].
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    hub: MemoryHub,
}

impl MemoryTransport {
    pub fn new(hub: MemoryHub) -> Self {
        Self { hub }
    }

    pub fn hub(&self) -> &MemoryHub {
        &self.hub
    }
}

fn channel_of(addr: &Multiaddr) -> Option<u64> {
    addr.iter()
        .find(|s| s.protocol() == Protocol::Memory)
        .and_then(|s| s.value()?.parse().ok())
}

fn memory_addr(channel: u64) -> Multiaddr {
    Multiaddr::from(Segment::memory(channel))
}

#[async_trait]
impl Transport for MemoryTransport {
    fn protocol(&self) -> &'static str {
        "memory"
    }

    async fn connect(
        &self,
        addr: &Multiaddr,
        cancel: &CancellationToken,
    ) -> Result<BoxedStream, TransportError> {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        let channel = channel_of(addr).ok_or_else(|| TransportError::Unsupported(addr.clone()))?;
        let remote = memory_addr(self.hub.allocate_channel());
        trace!(addr = %addr, dialer = %remote, "memory dial");
        self.hub
            .route(channel, remote)
            .ok_or_else(|| TransportError::ListenerNotFound(addr.clone()))
    }

    async fn listen(
        &self,
        addr: &Multiaddr,
        on_accept: AcceptSink,
        cancel: CancellationToken,
    ) -> Result<Multiaddr, TransportError> {
        let requested = channel_of(addr).ok_or_else(|| TransportError::Unsupported(addr.clone()))?;
        let channel = if requested == 0 {
            self.hub.allocate_channel()
        } else {
            requested
        };
        let effective = memory_addr(channel);
        self.hub.register(
            channel,
            MemoryListener {
                local: effective.clone(),
                sink: on_accept,
                cancel: cancel.clone(),
            },
        )?;
        debug!(addr = %effective, "memory listener registered");

        // drop the sink as soon as the listener is cancelled
        let hub = self.hub.clone();
        tokio::spawn(async move {
            cancel.cancelled().await;
            hub.remove_if_cancelled(channel);
            debug!(channel, "memory listener removed");
        });

        Ok(effective)
    }
}
