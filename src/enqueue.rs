//! Enqueue interpreter (§4.E): turns one outbound message into zero or more
//! scheduled packets, according to the enqueue policy table.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

use tracing::{debug, error};

use crate::failures::FailureTracker;
use crate::inflight::InFlight;
use crate::message::{MsgType, Origin};
use crate::packet::{Key, Packet, ResultHandle};
use crate::peers::{remove_origin, restrict_peers, ForwardingSet, NodeType, Peers};
use crate::policy::{EnqueueInstruction, EnqueuePolicyTable};
use crate::precedence::Precedence;
use crate::queue::MultiQueue;
use crate::transport::Transport;

/// Sum of scheduled-and-in-flight work to `nid` at precedence `>= prec` — the
/// `ahead` count `MaxAhead` is checked against.
fn ahead<N, P, T>(mq: &MultiQueue<N, P, T>, inflight: &InFlight<N>, nid: &N, prec: Precedence) -> usize
where
    N: Eq + Hash + Clone,
    T: Transport<N, P>,
{
    let queued: usize = prec
        .at_or_above()
        .map(|p| mq.size_by(&Key::ByDestPrec(nid.clone(), p)))
        .sum();
    queued + inflight.at_or_above(nid, prec)
}

/// Ranks the alternatives in `fwd_set` by ascending `ahead` (least-loaded
/// first), then returns the first that is not already picked this
/// instruction, not in recent-failure cooldown, and under `max_ahead`.
#[allow(clippy::too_many_arguments)]
fn pick_alt<N, P, T>(
    fwd_set: &ForwardingSet<N>,
    prec: Precedence,
    max_ahead: usize,
    failures: &FailureTracker<N>,
    mq: &MultiQueue<N, P, T>,
    inflight: &InFlight<N>,
    already_picked: &HashSet<N>,
) -> Option<N>
where
    N: Eq + Hash + Clone,
    T: Transport<N, P>,
{
    let mut ranked: Vec<(N, usize)> = fwd_set
        .alternatives()
        .iter()
        .filter(|nid| !already_picked.contains(*nid))
        .map(|nid| (nid.clone(), ahead(mq, inflight, nid, prec)))
        .collect();
    ranked.sort_by_key(|(_, ahead)| *ahead);

    ranked
        .into_iter()
        .find(|(nid, ahead)| !failures.has_recent_failure(nid) && *ahead < max_ahead)
        .map(|(nid, _)| nid)
}

fn enqueue_one<N, P, T>(
    payload: P,
    msg_type: MsgType,
    dest_type: NodeType,
    dest_id: N,
    prec: Precedence,
    mq: &MultiQueue<N, P, T>,
) -> ResultHandle<T::Value, T::Error>
where
    N: Eq + Hash + Clone,
    T: Transport<N, P>,
{
    let (packet, handle) = Packet::new(payload, msg_type, dest_type, dest_id, prec);
    mq.enqueue(Arc::new(packet));
    handle
}

/// Restricts every destination class of `peers` to `restriction` — the peer
/// narrowing `enqueue_to` applies before running the usual instructions.
pub fn restrict<N: Clone + Eq + Hash>(peers: &Peers<N>, restriction: &HashSet<N>) -> Peers<N> {
    let mut out = Peers::empty();
    for t in NodeType::ALL {
        for fwd_set in restrict_peers(restriction, peers.peers_of_type(t)) {
            out.insert(t, fwd_set);
        }
    }
    out
}

/// Runs every `EnqueueInstruction` for `(msg_type, origin.kind())` against
/// `peers`, scheduling packets on `mq` and returning one `ResultHandle` per
/// packet actually scheduled. Implements the three-tier logging rule: no
/// known peers of a class is `debug`, known peers all ineligible is `error`
/// (the `NoPeer` condition), otherwise `debug` with the chosen destinations.
#[allow(clippy::too_many_arguments)]
pub fn interpret<N, P, T>(
    msg_type: MsgType,
    origin: &Origin<N>,
    payload: &P,
    peers: &Peers<N>,
    policy: &EnqueuePolicyTable,
    failures: &FailureTracker<N>,
    inflight: &InFlight<N>,
    mq: &MultiQueue<N, P, T>,
) -> Vec<ResultHandle<T::Value, T::Error>>
where
    N: Eq + Hash + Clone + std::fmt::Debug,
    P: Clone,
    T: Transport<N, P>,
{
    let mut handles = Vec::new();

    for instr in policy.instructions(msg_type, origin.kind()) {
        match instr {
            EnqueueInstruction::EnqueueAll {
                dest_type,
                max_ahead,
                precedence,
            } => {
                let known = remove_origin(origin, peers.peers_of_type(*dest_type));
                if known.is_empty() {
                    debug!(?dest_type, ?msg_type, "no known peers of this type, skipping");
                    continue;
                }

                let mut picked = HashSet::new();
                let mut destinations = Vec::new();
                for fwd_set in &known {
                    if let Some(nid) = pick_alt(fwd_set, *precedence, *max_ahead, failures, mq, inflight, &picked) {
                        picked.insert(nid.clone());
                        destinations.push(nid.clone());
                        handles.push(enqueue_one(payload.clone(), msg_type, *dest_type, nid, *precedence, mq));
                    }
                }

                if destinations.is_empty() {
                    error!(?dest_type, ?msg_type, "known peers exist but none were eligible");
                } else {
                    debug!(?dest_type, ?msg_type, ?destinations, "enqueued");
                }
            }
            EnqueueInstruction::EnqueueOne {
                dest_types_in_preference_order,
                max_ahead,
                precedence,
            } => {
                let mut any_known = false;
                let mut chosen = None;

                for dest_type in dest_types_in_preference_order {
                    let known = remove_origin(origin, peers.peers_of_type(*dest_type));
                    if known.is_empty() {
                        continue;
                    }
                    any_known = true;

                    let empty_picked = HashSet::new();
                    for fwd_set in &known {
                        if let Some(nid) = pick_alt(fwd_set, *precedence, *max_ahead, failures, mq, inflight, &empty_picked) {
                            chosen = Some((*dest_type, nid));
                            break;
                        }
                    }
                    if chosen.is_some() {
                        break;
                    }
                }

                match chosen {
                    Some((dest_type, nid)) => {
                        debug!(?dest_type, ?msg_type, ?nid, "enqueued");
                        handles.push(enqueue_one(payload.clone(), msg_type, dest_type, nid, *precedence, mq));
                    }
                    None if any_known => {
                        error!(?msg_type, "known peers exist across preferred types but none were eligible");
                    }
                    None => {
                        debug!(?msg_type, "no known peers of any preferred type, skipping");
                    }
                }
            }
        }
    }

    handles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::precedence::Precedence;
    use std::sync::Arc as StdArc;

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct TestErr;

    struct Noop;
    impl Transport<u32, &'static str> for Noop {
        type Value = ();
        type Error = TestErr;
        fn send(&self, _p: &&'static str, _d: &u32) -> Result<(), TestErr> {
            Ok(())
        }
    }

    fn table() -> EnqueuePolicyTable {
        let mut t = EnqueuePolicyTable::new();
        t.set(
            MsgType::AnnounceBlockHeader,
            crate::message::OriginKind::Sender,
            vec![EnqueueInstruction::EnqueueAll {
                dest_type: NodeType::Core,
                max_ahead: 2,
                precedence: Precedence::High,
            }],
        );
        t
    }

    #[test]
    fn enqueue_all_schedules_one_packet_per_forwarding_set() {
        let mq: MultiQueue<u32, &'static str, Noop> = MultiQueue::new();
        let failures = FailureTracker::new(StdArc::new(SystemClock));
        let inflight = InFlight::new();
        let peers = Peers::simple(NodeType::Core, vec![1, 2, 3]);

        let handles = interpret(
            MsgType::AnnounceBlockHeader,
            &Origin::Sender,
            &"hi",
            &peers,
            &table(),
            &failures,
            &inflight,
            &mq,
        );
        assert_eq!(handles.len(), 3);
        assert_eq!(mq.total_size(), 3);
    }

    #[test]
    fn forward_origin_is_never_sent_back_to_sender() {
        let mq: MultiQueue<u32, &'static str, Noop> = MultiQueue::new();
        let failures = FailureTracker::new(StdArc::new(SystemClock));
        let inflight = InFlight::new();
        let peers = Peers::simple(NodeType::Core, vec![1, 2]);

        let handles = interpret(
            MsgType::AnnounceBlockHeader,
            &Origin::Forward(1),
            &"hi",
            &peers,
            &table(),
            &failures,
            &inflight,
            &mq,
        );
        assert_eq!(handles.len(), 1);
        assert_eq!(mq.size_by(&Key::ByDest(1)), 0);
        assert_eq!(mq.size_by(&Key::ByDest(2)), 1);
    }

    #[test]
    fn max_ahead_caps_how_many_packets_reach_one_destination() {
        let mq: MultiQueue<u32, &'static str, Noop> = MultiQueue::new();
        let failures = FailureTracker::new(StdArc::new(SystemClock));
        let inflight = InFlight::new();
        let peers = Peers::simple(NodeType::Core, vec![1]);
        let t = table();

        for _ in 0..5 {
            interpret(
                MsgType::AnnounceBlockHeader,
                &Origin::Sender,
                &"hi",
                &peers,
                &t,
                &failures,
                &inflight,
                &mq,
            );
        }
        assert_eq!(mq.size_by(&Key::ByDest(1)), 2);
    }
}
