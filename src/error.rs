//! Error kinds (§7). The queue never panics on peer errors; policy lookups
//! that ought to be unreachable given the shipped defaults abort via
//! `unreachable!`, not a `Result`, per §7's "propagation policy".

use thiserror::Error;

/// What a single packet's result cell resolves to, surfaced through the
/// caller's `ResultHandle`.
#[derive(Debug, Error)]
pub enum SlotError<E> {
    /// The collaborator's `SendMsg` returned an error (§7.1).
    #[error("send failed: {0}")]
    SendFailure(E),
    /// The result cell was dropped (worker panicked, or the registry
    /// force-aborted it) before a result was ever written.
    #[error("packet cancelled before a result was produced")]
    Cancelled,
}

/// Errors surfaced by the facade's aggregate operations. Per-packet
/// `SendFailure`s are not represented here — they have nowhere to go except
/// the packet's own `ResultHandle` (§7.2).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// An enqueue instruction targeted a peer set with no surviving
    /// alternatives (§7.2). Not surfaced per-peer; `enqueue_sync` folds it
    /// into "no successes".
    #[error("no peer available for this destination")]
    NoPeer,
    /// `enqueue_cherished` exceeded its retry budget (§7.3).
    #[error("cherish retry budget exhausted")]
    CherishExhausted,
}
