//! Peer model: classified peer sets with forwarding-set/alternatives
//! semantics, and the set algebra over them (§4.C).

use std::collections::HashSet;
use std::hash::Hash;

/// Closed enumeration of peer/destination classes. Determines which routing
/// table a peer lives in and shapes the policy applied to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeType {
    Core,
    Relay,
    Edge,
}

impl NodeType {
    pub const ALL: [NodeType; 3] = [NodeType::Core, NodeType::Relay, NodeType::Edge];
}

/// A non-empty, ordered list of alternative node ids: "send to the set" means
/// deliver to exactly one of them, preferring earlier entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardingSet<N>(Vec<N>);

impl<N> ForwardingSet<N> {
    /// Returns `None` for an empty input — a forwarding set is never empty.
    pub fn new(alternatives: Vec<N>) -> Option<Self> {
        if alternatives.is_empty() {
            None
        } else {
            Some(Self(alternatives))
        }
    }

    pub fn single(n: N) -> Self {
        Self(vec![n])
    }

    pub fn alternatives(&self) -> &[N] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        // Invariant-preserving constructors never produce an empty set; kept
        // for the filter step in `remove_origin`, which can make one empty.
        self.0.is_empty()
    }
}

impl<N: Clone + PartialEq> ForwardingSet<N> {
    /// Drops `n` from the alternatives, if present.
    fn without(&self, n: &N) -> ForwardingSet<N> {
        ForwardingSet(self.0.iter().filter(|a| *a != n).cloned().collect())
    }
}

/// Peer knowledge for one node, split by `NodeType`. Forms a commutative
/// monoid under pointwise concatenation (the ordering within each
/// destination-type list is otherwise unspecified by the spec).
#[derive(Debug, Clone)]
pub struct Peers<N> {
    core: Vec<ForwardingSet<N>>,
    relay: Vec<ForwardingSet<N>>,
    edge: Vec<ForwardingSet<N>>,
}

impl<N> Default for Peers<N> {
    fn default() -> Self {
        Self {
            core: Vec::new(),
            relay: Vec::new(),
            edge: Vec::new(),
        }
    }
}

impl<N> Peers<N> {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn peers_of_type(&self, t: NodeType) -> &[ForwardingSet<N>] {
        match t {
            NodeType::Core => &self.core,
            NodeType::Relay => &self.relay,
            NodeType::Edge => &self.edge,
        }
    }

    fn list_mut(&mut self, t: NodeType) -> &mut Vec<ForwardingSet<N>> {
        match t {
            NodeType::Core => &mut self.core,
            NodeType::Relay => &mut self.relay,
            NodeType::Edge => &mut self.edge,
        }
    }

    pub fn insert(&mut self, t: NodeType, fwd_set: ForwardingSet<N>) {
        self.list_mut(t).push(fwd_set);
    }

    /// `simplePeers`: a flat list of peers of one type, each its own singleton
    /// forwarding set (no alternatives).
    pub fn simple(t: NodeType, flat: Vec<N>) -> Self
    where
        N: Clone,
    {
        let mut p = Self::empty();
        for n in flat {
            p.list_mut(t).push(ForwardingSet::single(n));
        }
        p
    }
}

impl<N: Clone> Peers<N> {
    /// Monoid combine: pointwise concatenation. Associative, with `empty()`
    /// as identity.
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            core: self.core.iter().chain(&other.core).cloned().collect(),
            relay: self.relay.iter().chain(&other.relay).cloned().collect(),
            edge: self.edge.iter().chain(&other.edge).cloned().collect(),
        }
    }
}

impl<N: Clone + Eq + Hash> Peers<N> {
    /// All distinct peer ids reachable through any forwarding set, of any
    /// type — the set used to detect who vanished from the fold.
    pub fn all_ids(&self) -> HashSet<N> {
        self.core
            .iter()
            .chain(&self.relay)
            .chain(&self.edge)
            .flat_map(|fs| fs.alternatives().iter().cloned())
            .collect()
    }
}

/// Drops `n` from every alternative list for `Origin::Forward(n)` (so a
/// forwarded message is never bounced back to its sender), then drops any
/// forwarding set that became empty as a result. Identity for `Origin::Sender`.
pub fn remove_origin<N: Clone + PartialEq>(
    origin: &crate::message::Origin<N>,
    fwd_sets: &[ForwardingSet<N>],
) -> Vec<ForwardingSet<N>> {
    match origin.forwarded_from() {
        None => fwd_sets.to_vec(),
        Some(n) => fwd_sets
            .iter()
            .map(|fs| fs.without(n))
            .filter(|fs| !fs.is_empty())
            .collect(),
    }
}

/// Intersects a peer set with a caller-supplied restriction (used by
/// `enqueue_to`): keeps only alternatives that are also in `restriction`, and
/// drops any forwarding set left empty.
pub fn restrict_peers<N: Clone + Eq + Hash>(
    restriction: &HashSet<N>,
    fwd_sets: &[ForwardingSet<N>],
) -> Vec<ForwardingSet<N>> {
    fwd_sets
        .iter()
        .filter_map(|fs| {
            ForwardingSet::new(
                fs.alternatives()
                    .iter()
                    .filter(|a| restriction.contains(*a))
                    .cloned()
                    .collect(),
            )
        })
        .collect()
}
