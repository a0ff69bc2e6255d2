//! Opaque peer identity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Base58btc alphabet used by textual peer-IDs (no `0`, `O`, `I`, `l`).
const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Errors from [`PeerId`] construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeerIdError {
    #[error("peer id is empty")]
    Empty,
    #[error("invalid base58 character {0:?} in peer id")]
    InvalidCharacter(char),
}

/// A peer's stable identity: the base58 text form of the hash of its public key.
///
/// The identity is opaque at this layer. Two ids are equal iff their textual
/// forms match; no multihash decoding is performed.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PeerId(String);

impl PeerId {
    /// Validates and wraps a base58 peer-id string.
    pub fn new(text: impl Into<String>) -> Result<Self, PeerIdError> {
        let text = text.into();
        if text.is_empty() {
            return Err(PeerIdError::Empty);
        }
        if let Some(bad) = text.chars().find(|c| !BASE58_ALPHABET.contains(*c)) {
            return Err(PeerIdError::InvalidCharacter(bad));
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PeerId {
    type Err = PeerIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for PeerId {
    type Error = PeerIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PeerId> for String {
    fn from(id: PeerId) -> Self {
        id.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.0)
    }
}
