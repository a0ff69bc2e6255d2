//! Address admission policy.
//!
//! Two independent pattern lists gate which addresses the swarm will
//! register or dial: a deny-list that is always subtractive, and an
//! allow-list that restricts admission to its members once non-empty.
//! Evaluation is pure and does no I/O.

use std::collections::BTreeSet;

use mooring_primitives::Multiaddr;

/// A set of multiaddr patterns.
///
/// A pattern matches a candidate when its segments are a prefix of (or equal
/// to) the candidate's segments. Comparison happens on canonical parsed form,
/// so a legacy `/ipfs/<id>` pattern matches a `/p2p/<id>` candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyList {
    patterns: BTreeSet<Multiaddr>,
}

impl PolicyList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the pattern was already present.
    pub fn insert(&mut self, pattern: Multiaddr) -> bool {
        self.patterns.insert(pattern)
    }

    /// Returns `true` when the pattern was present.
    pub fn remove(&mut self, pattern: &Multiaddr) -> bool {
        self.patterns.remove(pattern)
    }

    pub fn clear(&mut self) {
        self.patterns.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Multiaddr> {
        self.patterns.iter()
    }

    /// Whether any pattern is a prefix of `candidate`.
    pub fn matches(&self, candidate: &Multiaddr) -> bool {
        self.patterns.iter().any(|p| is_prefix(p, candidate))
    }
}

fn is_prefix(pattern: &Multiaddr, candidate: &Multiaddr) -> bool {
    let pattern = pattern.segments();
    let candidate = candidate.segments();
    pattern.len() <= candidate.len() && pattern.iter().zip(candidate).all(|(p, c)| p == c)
}

/// The combined allow/deny evaluator.
#[derive(Debug, Clone, Default)]
pub struct AddressPolicy {
    allow: PolicyList,
    deny: PolicyList,
}

impl AddressPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// `allowed(addr) = deny-has-no-match ∧ (allow empty ∨ allow-has-match)`.
    pub fn allowed(&self, candidate: &Multiaddr) -> bool {
        if self.deny.matches(candidate) {
            return false;
        }
        self.allow.is_empty() || self.allow.matches(candidate)
    }

    pub fn allow(&self) -> &PolicyList {
        &self.allow
    }

    pub fn allow_mut(&mut self) -> &mut PolicyList {
        &mut self.allow
    }

    pub fn deny(&self) -> &PolicyList {
        &self.deny
    }

    pub fn deny_mut(&mut self) -> &mut PolicyList {
        &mut self.deny
    }
}
