//! Address resolution seam.

use async_trait::async_trait;
use mooring_primitives::Multiaddr;
use tokio_util::sync::CancellationToken;

/// Errors from [`AddressResolver::resolve`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("resolution cancelled")]
    Cancelled,
    #[error("{0}")]
    Failed(String),
}

/// Expands an address into the concrete addresses it stands for.
///
/// DNS resolution is an external collaborator; the swarm only requires the
/// contract: a resolver must return its input unchanged when nothing needs
/// expansion, must never change a trailing identity segment, and must not
/// block indefinitely.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    async fn resolve(
        &self,
        addr: &Multiaddr,
        cancel: &CancellationToken,
    ) -> Result<Vec<Multiaddr>, ResolveError>;
}

/// The default resolver: returns every address unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityResolver;

#[async_trait]
impl AddressResolver for IdentityResolver {
    async fn resolve(
        &self,
        addr: &Multiaddr,
        _cancel: &CancellationToken,
    ) -> Result<Vec<Multiaddr>, ResolveError> {
        Ok(vec![addr.clone()])
    }
}
