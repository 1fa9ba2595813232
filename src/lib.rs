//! Outbound message queue for a peer-to-peer gossip node.
//!
//! Sits between application code and a point-to-point transport. Decides,
//! per message, which peers to contact, with what priority, how to throttle
//! concurrent sends, and how to recover from peer failures.
//!
//! See `SPEC_FULL.md` for the full design; `DESIGN.md` for how each module
//! maps back to it.

pub mod buckets;
pub mod clock;
pub mod config;
pub mod enqueue;
pub mod error;
pub mod facade;
pub mod failures;
pub mod inflight;
pub mod message;
pub mod packet;
pub mod peers;
pub mod policy;
pub mod precedence;
pub mod queue;
pub mod registry;
pub mod scheduler;
pub mod signal;
pub mod transport;

pub use clock::{Clock, SystemClock};
pub use config::QueueConfig;
pub use error::{QueueError, SlotError};
pub use facade::{Formatter, JsonFormatter, NodeId, OutboundQueue, QueueSnapshot};
pub use message::{MsgType, Origin};
pub use peers::{ForwardingSet, NodeType, Peers};
pub use policy::{
    DequeuePolicyTable, DequeueRule, EnqueueInstruction, EnqueuePolicyTable, FailurePolicyTable,
    NodeRole, RatePerSec,
};
pub use precedence::Precedence;
pub use transport::Transport;
