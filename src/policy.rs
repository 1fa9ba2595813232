//! The policy engine (§4.D): three pure, replaceable, inspectable tables
//! rather than closures — "Higher-order policies... a table of (MsgType,
//! Origin) -> Vec<Instruction>" (§9). Defaults are provided per `NodeRole`,
//! the *local* node's own shape, which is a finer distinction than the
//! `NodeType` a peer is classified under (see DESIGN.md, Open Questions).

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::message::{MsgType, OriginKind};
use crate::peers::NodeType;
use crate::precedence::Precedence;

/// The five node shapes the spec's defaults are keyed on. `NodeType::Edge`
/// covers three of them at the policy level, since a peer's routing
/// classification doesn't need to distinguish why it's an edge node, but the
/// *local* node's own behavior does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRole {
    Core,
    Relay,
    EdgeBehindNat,
    EdgeExchange,
    EdgeP2p,
}

impl NodeRole {
    pub fn node_type(self) -> NodeType {
        match self {
            NodeRole::Core => NodeType::Core,
            NodeRole::Relay => NodeType::Relay,
            NodeRole::EdgeBehindNat | NodeRole::EdgeExchange | NodeRole::EdgeP2p => NodeType::Edge,
        }
    }
}

/// One instruction produced by the enqueue policy for a given `(MsgType,
/// OriginKind)` pair.
#[derive(Debug, Clone)]
pub enum EnqueueInstruction {
    /// Pick one alternative from *every* forwarding set of `dest_type`.
    EnqueueAll {
        dest_type: NodeType,
        max_ahead: usize,
        precedence: Precedence,
    },
    /// Pick one alternative from one forwarding set of any of the given
    /// types, trying the preferred (first) type first.
    EnqueueOne {
        dest_types_in_preference_order: Vec<NodeType>,
        max_ahead: usize,
        precedence: Precedence,
    },
}

/// `(MsgType, OriginKind) -> Vec<EnqueueInstruction>`. An absent or empty
/// entry means "this class is not sent from this node" (§4.D).
#[derive(Debug, Clone, Default)]
pub struct EnqueuePolicyTable {
    table: HashMap<(MsgType, OriginKind), Vec<EnqueueInstruction>>,
}

impl EnqueuePolicyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, msg_type: MsgType, origin: OriginKind, instructions: Vec<EnqueueInstruction>) {
        self.table.insert((msg_type, origin), instructions);
    }

    pub fn instructions(&self, msg_type: MsgType, origin: OriginKind) -> &[EnqueueInstruction] {
        self.table.get(&(msg_type, origin)).map_or(&[], |v| v.as_slice())
    }

    /// Defaults matching the worked examples in §8: a Core node announces
    /// headers to every Core peer and every Relay peer at high precedence,
    /// and forwards transactions it originates to one Core (preferring Core,
    /// falling back to Relay) at low precedence; a Relay/Edge node relays
    /// what it receives onward instead of fanning out to everything.
    pub fn defaults(role: NodeRole) -> Self {
        let mut t = Self::new();
        match role {
            NodeRole::Core => {
                t.set(
                    MsgType::AnnounceBlockHeader,
                    OriginKind::Sender,
                    vec![
                        EnqueueInstruction::EnqueueAll {
                            dest_type: NodeType::Core,
                            max_ahead: 4,
                            precedence: Precedence::Highest,
                        },
                        EnqueueInstruction::EnqueueAll {
                            dest_type: NodeType::Relay,
                            max_ahead: 4,
                            precedence: Precedence::High,
                        },
                    ],
                );
                t.set(
                    MsgType::Transaction,
                    OriginKind::Sender,
                    vec![EnqueueInstruction::EnqueueOne {
                        dest_types_in_preference_order: vec![NodeType::Core, NodeType::Relay],
                        max_ahead: 8,
                        precedence: Precedence::Low,
                    }],
                );
                t.set(
                    MsgType::Transaction,
                    OriginKind::Forward,
                    vec![EnqueueInstruction::EnqueueAll {
                        dest_type: NodeType::Core,
                        max_ahead: 8,
                        precedence: Precedence::Low,
                    }],
                );
                t.set(
                    MsgType::RequestBlockHeaders,
                    OriginKind::Sender,
                    vec![EnqueueInstruction::EnqueueOne {
                        dest_types_in_preference_order: vec![NodeType::Core],
                        max_ahead: 2,
                        precedence: Precedence::Medium,
                    }],
                );
                t.set(
                    MsgType::RequestBlocks,
                    OriginKind::Sender,
                    vec![EnqueueInstruction::EnqueueOne {
                        dest_types_in_preference_order: vec![NodeType::Core],
                        max_ahead: 2,
                        precedence: Precedence::Medium,
                    }],
                );
                t.set(
                    MsgType::Mpc,
                    OriginKind::Sender,
                    vec![EnqueueInstruction::EnqueueAll {
                        dest_type: NodeType::Core,
                        max_ahead: 1,
                        precedence: Precedence::Highest,
                    }],
                );
            }
            NodeRole::Relay => {
                t.set(
                    MsgType::AnnounceBlockHeader,
                    OriginKind::Forward,
                    vec![EnqueueInstruction::EnqueueAll {
                        dest_type: NodeType::Edge,
                        max_ahead: 4,
                        precedence: Precedence::High,
                    }],
                );
                t.set(
                    MsgType::Transaction,
                    OriginKind::Forward,
                    vec![EnqueueInstruction::EnqueueAll {
                        dest_type: NodeType::Core,
                        max_ahead: 8,
                        precedence: Precedence::Low,
                    }],
                );
            }
            NodeRole::EdgeBehindNat | NodeRole::EdgeExchange | NodeRole::EdgeP2p => {
                t.set(
                    MsgType::Transaction,
                    OriginKind::Sender,
                    vec![EnqueueInstruction::EnqueueOne {
                        dest_types_in_preference_order: vec![NodeType::Relay, NodeType::Core],
                        max_ahead: 4,
                        precedence: Precedence::Medium,
                    }],
                );
            }
        }
        t
    }
}

/// A rate expressed as sends-per-second.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatePerSec(pub u32);

impl RatePerSec {
    /// Minimum spacing between dispatch starts implied by this rate.
    pub fn min_spacing(self) -> Duration {
        Duration::from_micros(1_000_000 / self.0.max(1) as u64)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DequeueRule {
    pub rate_limit: Option<RatePerSec>,
    pub max_in_flight: usize,
}

/// `NodeType -> DequeueRule`.
#[derive(Debug, Clone)]
pub struct DequeuePolicyTable {
    table: HashMap<NodeType, DequeueRule>,
}

impl DequeuePolicyTable {
    pub fn new() -> Self {
        Self { table: HashMap::new() }
    }

    pub fn set(&mut self, dest_type: NodeType, rule: DequeueRule) {
        self.table.insert(dest_type, rule);
    }

    pub fn rule(&self, dest_type: NodeType) -> DequeueRule {
        self.table.get(&dest_type).copied().unwrap_or(DequeueRule {
            rate_limit: None,
            max_in_flight: 1,
        })
    }

    /// Core peers get generous concurrency and no rate cap; relays are
    /// capped; edges get the tightest budget since they're the most
    /// numerous and least trusted destination class.
    pub fn defaults() -> Self {
        let mut t = Self::new();
        t.set(
            NodeType::Core,
            DequeueRule {
                rate_limit: None,
                max_in_flight: 16,
            },
        );
        t.set(
            NodeType::Relay,
            DequeueRule {
                rate_limit: Some(RatePerSec(2)),
                max_in_flight: 8,
            },
        );
        t.set(
            NodeType::Edge,
            DequeueRule {
                rate_limit: Some(RatePerSec(4)),
                max_in_flight: 4,
            },
        );
        t
    }
}

impl Default for DequeuePolicyTable {
    fn default() -> Self {
        Self::defaults()
    }
}

/// `(NodeType, MsgType) -> reconsider_after`. The spec keys failure policy on
/// `(dest_type, msg_type, error)`; since the error type is a crate-level
/// generic parameter the policy engine cannot pattern-match on its variants,
/// the cooldown here is class-level only (see DESIGN.md, Open Questions).
#[derive(Debug, Clone)]
pub struct FailurePolicyTable {
    table: HashMap<(NodeType, MsgType), Duration>,
    default_cooldown: Duration,
}

impl FailurePolicyTable {
    pub fn new(default_cooldown: Duration) -> Self {
        Self {
            table: HashMap::new(),
            default_cooldown,
        }
    }

    pub fn set(&mut self, dest_type: NodeType, msg_type: MsgType, cooldown: Duration) {
        self.table.insert((dest_type, msg_type), cooldown);
    }

    pub fn reconsider_after(&self, dest_type: NodeType, msg_type: MsgType) -> Duration {
        self.table
            .get(&(dest_type, msg_type))
            .copied()
            .unwrap_or(self.default_cooldown)
    }

    /// 30s default cooldown; Core destinations, being few and trusted, get a
    /// much shorter one so a transient blip doesn't starve a node of most of
    /// its announce fan-out.
    pub fn defaults() -> Self {
        let mut t = Self::new(Duration::from_secs(30));
        t.set(NodeType::Core, MsgType::AnnounceBlockHeader, Duration::from_secs(5));
        t
    }
}

impl Default for FailurePolicyTable {
    fn default() -> Self {
        Self::defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_pair_yields_no_instructions() {
        let t = EnqueuePolicyTable::new();
        assert!(t.instructions(MsgType::Mpc, OriginKind::Sender).is_empty());
    }

    #[test]
    fn rate_per_sec_min_spacing() {
        assert_eq!(RatePerSec(2).min_spacing(), Duration::from_micros(500_000));
    }

    #[test]
    fn dequeue_defaults_cap_edge_tightest() {
        let t = DequeuePolicyTable::defaults();
        assert!(t.rule(NodeType::Edge).max_in_flight <= t.rule(NodeType::Core).max_in_flight);
    }
}
