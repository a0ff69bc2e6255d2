//! TCP transport over tokio.

use std::net::{IpAddr, SocketAddr};

use async_trait::async_trait;
use mooring_primitives::{Multiaddr, Protocol};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::{Accepted, AcceptSink, BoxedStream, Transport, TransportError};

/// Dials and listens on `/ip4/<a>/tcp/<p>` and `/ip6/<a>/tcp/<p>` addresses.
///
/// Trailing segments (`/ws`, `/p2p/<id>`, …) are tolerated and ignored; only
/// the ip + tcp pair is consulted.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport;

impl TcpTransport {
    pub fn new() -> Self {
        Self
    }
}

/// Extracts the `(ip, port)` pair from an address: an `ip4`/`ip6` segment
/// immediately followed by a `tcp` segment.
fn socket_addr(addr: &Multiaddr) -> Option<SocketAddr> {
    let segments = addr.segments();
    segments.windows(2).find_map(|pair| {
        let ip: IpAddr = match pair[0].protocol() {
            Protocol::Ip4 | Protocol::Ip6 => pair[0].value()?.parse().ok()?,
            _ => return None,
        };
        if pair[1].protocol() != Protocol::Tcp {
            return None;
        }
        let port: u16 = pair[1].value()?.parse().ok()?;
        Some(SocketAddr::new(ip, port))
    })
}

#[async_trait]
impl Transport for TcpTransport {
    fn protocol(&self) -> &'static str {
        "tcp"
    }

    async fn connect(
        &self,
        addr: &Multiaddr,
        cancel: &CancellationToken,
    ) -> Result<BoxedStream, TransportError> {
        let target = socket_addr(addr).ok_or_else(|| TransportError::Unsupported(addr.clone()))?;
        trace!(addr = %addr, %target, "dialing");
        tokio::select! {
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            connected = TcpStream::connect(target) => match connected {
                Ok(stream) => {
                    debug!(addr = %addr, "tcp dial succeeded");
                    Ok(Box::new(stream) as BoxedStream)
                }
                Err(source) => Err(TransportError::Connect {
                    addr: addr.clone(),
                    source,
                }),
            },
        }
    }

    async fn listen(
        &self,
        addr: &Multiaddr,
        on_accept: AcceptSink,
        cancel: CancellationToken,
    ) -> Result<Multiaddr, TransportError> {
        let bind = socket_addr(addr).ok_or_else(|| TransportError::Unsupported(addr.clone()))?;
        let listener = TcpListener::bind(bind)
            .await
            .map_err(|source| TransportError::Listen {
                addr: addr.clone(),
                source,
            })?;
        let bound = listener
            .local_addr()
            .map_err(|source| TransportError::Listen {
                addr: addr.clone(),
                source,
            })?;
        let effective = Multiaddr::from_tcp(bound);
        debug!(addr = %effective, "tcp listener bound");

        let local = effective.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, remote)) => {
                            trace!(local = %local, remote = %remote, "inbound tcp stream");
                            on_accept(Accepted {
                                stream: Box::new(stream),
                                local: local.clone(),
                                remote: Multiaddr::from_tcp(remote),
                            });
                        }
                        Err(error) => {
                            warn!(local = %local, %error, "tcp accept failed");
                        }
                    },
                }
            }
            debug!(local = %local, "tcp listener stopped");
        });

        Ok(effective)
    }
}
