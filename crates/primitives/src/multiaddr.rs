//! Self-describing layered network addresses.
//!
//! A [`Multiaddr`] is an ordered, non-empty sequence of protocol segments in
//! the textual form `/proto/value/proto/value/…`, e.g.
//! `/ip4/104.131.131.82/tcp/4001/p2p/QmaCpDMGvV2BGHeYERUEnRQAwe3N8SzbUtfsmvsqQLuvuJ`.
//! A trailing `/p2p/<peer-id>` segment names the peer reachable at the
//! address; the legacy `/ipfs/<peer-id>` spelling is accepted and
//! canonicalized to `/p2p`.
//!
//! Values are canonicalized during parsing (`/ip6/0:0:0:0:0:0:0:1` and
//! `/ip6/::1` are the same address), so equality and hashing over the parsed
//! form coincide with equality of canonical text.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::{PeerId, PeerIdError};

/// Errors from parsing a [`Multiaddr`] from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MultiaddrError {
    #[error("address is empty")]
    Empty,
    #[error("address must start with '/'")]
    MissingLeadingSlash,
    #[error("empty protocol name")]
    EmptyProtocol,
    #[error("unknown protocol {0:?}")]
    UnknownProtocol(String),
    #[error("protocol {0} requires a value")]
    MissingValue(&'static str),
    #[error("invalid {protocol} value {value:?}")]
    InvalidValue {
        protocol: &'static str,
        value: String,
    },
    #[error("invalid peer id: {0}")]
    InvalidPeerId(#[from] PeerIdError),
}

/// Protocols understood by the address parser.
///
/// Transports register under one of these names; the identity marker is
/// [`Protocol::P2p`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Protocol {
    Ip4,
    Ip6,
    Tcp,
    Udp,
    Dns,
    Dns4,
    Dns6,
    Ws,
    Wss,
    Memory,
    P2p,
}

impl Protocol {
    /// Looks up a protocol by its textual name. `ipfs` is the legacy alias
    /// for `p2p` and maps to [`Protocol::P2p`].
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "ip4" => Self::Ip4,
            "ip6" => Self::Ip6,
            "tcp" => Self::Tcp,
            "udp" => Self::Udp,
            "dns" => Self::Dns,
            "dns4" => Self::Dns4,
            "dns6" => Self::Dns6,
            "ws" => Self::Ws,
            "wss" => Self::Wss,
            "memory" => Self::Memory,
            "p2p" | "ipfs" => Self::P2p,
            _ => return None,
        })
    }

    /// The canonical textual name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ip4 => "ip4",
            Self::Ip6 => "ip6",
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Dns => "dns",
            Self::Dns4 => "dns4",
            Self::Dns6 => "dns6",
            Self::Ws => "ws",
            Self::Wss => "wss",
            Self::Memory => "memory",
            Self::P2p => "p2p",
        }
    }

    /// Whether the protocol carries a value component.
    pub fn takes_value(&self) -> bool {
        !matches!(self, Self::Ws | Self::Wss)
    }

    /// Whether this protocol can resolve to different concrete addresses.
    pub fn is_dns(&self) -> bool {
        matches!(self, Self::Dns | Self::Dns4 | Self::Dns6)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `(protocol, value)` component of a [`Multiaddr`].
///
/// Values are stored in canonical text form; construct through the typed
/// helpers or by parsing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Segment {
    protocol: Protocol,
    value: Option<String>,
}

impl Segment {
    pub fn ip4(addr: Ipv4Addr) -> Self {
        Self {
            protocol: Protocol::Ip4,
            value: Some(addr.to_string()),
        }
    }

    pub fn ip6(addr: Ipv6Addr) -> Self {
        Self {
            protocol: Protocol::Ip6,
            value: Some(addr.to_string()),
        }
    }

    pub fn tcp(port: u16) -> Self {
        Self {
            protocol: Protocol::Tcp,
            value: Some(port.to_string()),
        }
    }

    pub fn udp(port: u16) -> Self {
        Self {
            protocol: Protocol::Udp,
            value: Some(port.to_string()),
        }
    }

    pub fn dns4(host: impl Into<String>) -> Self {
        Self {
            protocol: Protocol::Dns4,
            value: Some(host.into()),
        }
    }

    pub fn ws() -> Self {
        Self {
            protocol: Protocol::Ws,
            value: None,
        }
    }

    pub fn memory(channel: u64) -> Self {
        Self {
            protocol: Protocol::Memory,
            value: Some(channel.to_string()),
        }
    }

    pub fn p2p(id: &PeerId) -> Self {
        Self {
            protocol: Protocol::P2p,
            value: Some(id.as_str().to_owned()),
        }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Parses and canonicalizes a `(name, value)` pair.
    fn parse(name: &str, value: Option<&str>) -> Result<Self, MultiaddrError> {
        let protocol =
            Protocol::from_name(name).ok_or_else(|| MultiaddrError::UnknownProtocol(name.to_owned()))?;
        if !protocol.takes_value() {
            return Ok(Self {
                protocol,
                value: None,
            });
        }
        let raw = value.ok_or(MultiaddrError::MissingValue(protocol.as_str()))?;
        let invalid = || MultiaddrError::InvalidValue {
            protocol: protocol.as_str(),
            value: raw.to_owned(),
        };
        let canonical = match protocol {
            Protocol::Ip4 => raw.parse::<Ipv4Addr>().map_err(|_| invalid())?.to_string(),
            Protocol::Ip6 => raw.parse::<Ipv6Addr>().map_err(|_| invalid())?.to_string(),
            Protocol::Tcp | Protocol::Udp => raw.parse::<u16>().map_err(|_| invalid())?.to_string(),
            Protocol::Memory => raw.parse::<u64>().map_err(|_| invalid())?.to_string(),
            Protocol::Dns | Protocol::Dns4 | Protocol::Dns6 => {
                if raw.is_empty() {
                    return Err(invalid());
                }
                raw.to_owned()
            }
            Protocol::P2p => PeerId::new(raw)?.as_str().to_owned(),
            Protocol::Ws | Protocol::Wss => unreachable!("handled by takes_value"),
        };
        Ok(Self {
            protocol,
            value: Some(canonical),
        })
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.protocol)?;
        if let Some(value) = &self.value {
            write!(f, "/{value}")?;
        }
        Ok(())
    }
}

/// A parsed, canonical multiaddress.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Multiaddr {
    segments: Vec<Segment>,
}

impl Multiaddr {
    /// Builds an address from segments. At least one segment is required.
    pub fn new(segments: Vec<Segment>) -> Result<Self, MultiaddrError> {
        if segments.is_empty() {
            return Err(MultiaddrError::Empty);
        }
        Ok(Self { segments })
    }

    /// `/ip4/<ip>/tcp/<port>` or `/ip6/<ip>/tcp/<port>` for a socket address.
    pub fn from_tcp(addr: SocketAddr) -> Self {
        let ip = match addr.ip() {
            std::net::IpAddr::V4(ip) => Segment::ip4(ip),
            std::net::IpAddr::V6(ip) => Segment::ip6(ip),
        };
        Self {
            segments: vec![ip, Segment::tcp(addr.port())],
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    /// The peer identity, present iff the final segment is `/p2p/<id>`.
    pub fn peer_id(&self) -> Option<PeerId> {
        let last = self.segments.last()?;
        if last.protocol != Protocol::P2p {
            return None;
        }
        // Values of p2p segments are validated at construction.
        last.value.as_deref().and_then(|v| PeerId::new(v).ok())
    }

    /// Returns the address extended with `/p2p/<id>`. No-op when the same
    /// identity is already terminal.
    pub fn with_peer_id(&self, id: &PeerId) -> Self {
        if self.peer_id().as_ref() == Some(id) {
            return self.clone();
        }
        let mut segments = self.segments.clone();
        segments.push(Segment::p2p(id));
        Self { segments }
    }

    /// The dialable portion: the address with a trailing identity segment
    /// removed. An address consisting only of the identity is returned as-is.
    pub fn without_peer_id(&self) -> Self {
        if self.segments.len() > 1 && self.peer_id().is_some() {
            Self {
                segments: self.segments[..self.segments.len() - 1].to_vec(),
            }
        } else {
            self.clone()
        }
    }

    /// Whether any segment may require external resolution.
    pub fn needs_resolution(&self) -> bool {
        self.segments.iter().any(|s| s.protocol.is_dns())
    }
}

impl From<Segment> for Multiaddr {
    fn from(segment: Segment) -> Self {
        Self {
            segments: vec![segment],
        }
    }
}

impl FromStr for Multiaddr {
    type Err = MultiaddrError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input.is_empty() {
            return Err(MultiaddrError::Empty);
        }
        let mut parts = input.split('/');
        if parts.next() != Some("") {
            return Err(MultiaddrError::MissingLeadingSlash);
        }
        let mut segments = Vec::new();
        while let Some(name) = parts.next() {
            if name.is_empty() {
                return Err(MultiaddrError::EmptyProtocol);
            }
            let protocol = Protocol::from_name(name)
                .ok_or_else(|| MultiaddrError::UnknownProtocol(name.to_owned()))?;
            let value = if protocol.takes_value() {
                Some(
                    parts
                        .next()
                        .ok_or(MultiaddrError::MissingValue(protocol.as_str()))?,
                )
            } else {
                None
            };
            segments.push(Segment::parse(name, value)?);
        }
        Self::new(segments)
    }
}

impl fmt::Display for Multiaddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            segment.fmt(f)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Multiaddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Multiaddr({self})")
    }
}

impl Serialize for Multiaddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Multiaddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Multiaddr {
        s.parse().unwrap()
    }

    #[test]
    fn parses_layered_address() {
        let a = addr("/ip4/104.131.131.82/tcp/4001");
        assert_eq!(a.segments().len(), 2);
        assert_eq!(a.segments()[0].protocol(), Protocol::Ip4);
        assert_eq!(a.segments()[0].value(), Some("104.131.131.82"));
        assert_eq!(a.segments()[1].protocol(), Protocol::Tcp);
        assert_eq!(a.to_string(), "/ip4/104.131.131.82/tcp/4001");
    }

    #[test]
    fn parses_valueless_protocols() {
        let a = addr("/dns4/node.example.com/tcp/443/wss");
        assert_eq!(a.segments().len(), 3);
        assert_eq!(a.segments()[2].protocol(), Protocol::Wss);
        assert_eq!(a.segments()[2].value(), None);
    }

    #[test]
    fn legacy_ipfs_canonicalizes_to_p2p() {
        let legacy = addr("/ip4/1.2.3.4/tcp/4001/ipfs/QmYyQSo1c1Ym7orWxLYvCrM2EmxFTANf8wXmmE7DWjhx5N");
        let modern = addr("/ip4/1.2.3.4/tcp/4001/p2p/QmYyQSo1c1Ym7orWxLYvCrM2EmxFTANf8wXmmE7DWjhx5N");
        assert_eq!(legacy, modern);
        assert!(legacy.to_string().contains("/p2p/"));
    }

    #[test]
    fn ip6_values_are_canonicalized() {
        assert_eq!(addr("/ip6/0:0:0:0:0:0:0:1/tcp/80"), addr("/ip6/::1/tcp/80"));
    }

    #[test]
    fn peer_id_requires_terminal_identity_segment() {
        let with_id = addr("/ip4/1.2.3.4/tcp/4001/p2p/QmYyQSo1c1Ym7orWxLYvCrM2EmxFTANf8wXmmE7DWjhx5N");
        assert_eq!(
            with_id.peer_id().unwrap().as_str(),
            "QmYyQSo1c1Ym7orWxLYvCrM2EmxFTANf8wXmmE7DWjhx5N"
        );
        assert_eq!(addr("/ip4/1.2.3.4/tcp/4001").peer_id(), None);
        // identity not in final position does not identify the address
        let mid = addr("/p2p/QmYyQSo1c1Ym7orWxLYvCrM2EmxFTANf8wXmmE7DWjhx5N/tcp/80");
        assert_eq!(mid.peer_id(), None);
    }

    #[test]
    fn with_peer_id_is_idempotent() {
        let id: PeerId = "QmYyQSo1c1Ym7orWxLYvCrM2EmxFTANf8wXmmE7DWjhx5N".parse().unwrap();
        let base = addr("/ip4/1.2.3.4/tcp/4001");
        let once = base.with_peer_id(&id);
        let twice = once.with_peer_id(&id);
        assert_eq!(once, twice);
        assert_eq!(once.peer_id(), Some(id));
    }

    #[test]
    fn without_peer_id_strips_only_trailing_identity() {
        let full = addr("/ip4/1.2.3.4/tcp/4001/p2p/QmYyQSo1c1Ym7orWxLYvCrM2EmxFTANf8wXmmE7DWjhx5N");
        assert_eq!(full.without_peer_id(), addr("/ip4/1.2.3.4/tcp/4001"));
        let bare = addr("/p2p/QmYyQSo1c1Ym7orWxLYvCrM2EmxFTANf8wXmmE7DWjhx5N");
        assert_eq!(bare.without_peer_id(), bare);
    }

    #[test]
    fn rejects_malformed_text() {
        assert_eq!("".parse::<Multiaddr>(), Err(MultiaddrError::Empty));
        assert_eq!(
            "ip4/1.2.3.4".parse::<Multiaddr>(),
            Err(MultiaddrError::MissingLeadingSlash)
        );
        assert!(matches!(
            "/nosuchproto/1".parse::<Multiaddr>(),
            Err(MultiaddrError::UnknownProtocol(_))
        ));
        assert_eq!(
            "/ip4".parse::<Multiaddr>(),
            Err(MultiaddrError::MissingValue("ip4"))
        );
        assert!(matches!(
            "/ip4/999.0.0.1/tcp/80".parse::<Multiaddr>(),
            Err(MultiaddrError::InvalidValue { protocol: "ip4", .. })
        ));
        assert!(matches!(
            "/ip4/1.2.3.4/tcp/70000".parse::<Multiaddr>(),
            Err(MultiaddrError::InvalidValue { protocol: "tcp", .. })
        ));
        assert!(matches!(
            "/p2p/l0l".parse::<Multiaddr>(),
            Err(MultiaddrError::InvalidPeerId(_))
        ));
    }

    #[test]
    fn from_tcp_round_trips() {
        let v4: SocketAddr = "127.0.0.1:4001".parse().unwrap();
        assert_eq!(Multiaddr::from_tcp(v4), addr("/ip4/127.0.0.1/tcp/4001"));
        let v6: SocketAddr = "[::1]:4001".parse().unwrap();
        assert_eq!(Multiaddr::from_tcp(v6), addr("/ip6/::1/tcp/4001"));
    }

    #[test]
    fn needs_resolution_only_with_dns_segments() {
        assert!(addr("/dns4/node.example.com/tcp/4001").needs_resolution());
        assert!(!addr("/ip4/1.2.3.4/tcp/4001").needs_resolution());
    }

    #[test]
    fn serde_round_trips_as_string() {
        let a = addr("/ip4/1.2.3.4/tcp/4001/p2p/QmYyQSo1c1Ym7orWxLYvCrM2EmxFTANf8wXmmE7DWjhx5N");
        let json = serde_json::to_string(&a).unwrap();
        let back: Multiaddr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }
}
