//! Property-based tests for the ten universal properties (distilled spec
//! §8). A few of the ten already have focused coverage as unit tests next to
//! the code they govern (failure cooldown expiry in `src/failures.rs`,
//! bucket-removal cleanup in `src/facade.rs`, flush termination in
//! `tests/scenarios.rs`); this file covers the ones that are naturally
//! data-shaped and benefit from arbitrary inputs.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use outbound_queue::enqueue::interpret;
use outbound_queue::failures::FailureTracker;
use outbound_queue::inflight::InFlight;
use outbound_queue::message::OriginKind;
use outbound_queue::packet::{Key, Packet};
use outbound_queue::peers::{remove_origin, restrict_peers};
use outbound_queue::queue::MultiQueue;
use outbound_queue::{
    EnqueueInstruction, EnqueuePolicyTable, ForwardingSet, MsgType, NodeRole, NodeType, Origin,
    OutboundQueue, Peers, Precedence, QueueConfig, QueueError, SystemClock, Transport,
};
use proptest::prelude::*;

#[derive(Debug, thiserror::Error)]
#[error("boom")]
struct TestErr;

struct Noop;
impl Transport<u8, u32> for Noop {
    type Value = ();
    type Error = TestErr;
    fn send(&self, _p: &u32, _d: &u8) -> Result<(), TestErr> {
        Ok(())
    }
}

fn small_dest() -> impl Strategy<Value = u8> {
    0u8..4
}

fn small_prec() -> impl Strategy<Value = Precedence> {
    use Precedence::*;
    prop_oneof![Just(Lowest), Just(Low), Just(Medium), Just(High), Just(Highest)]
}

proptest! {
    /// Property 1 (no duplicate dispatch): every packet id a `MultiQueue`
    /// ever hands back from `dequeue_by` is distinct, however the enqueues
    /// were interleaved across destinations and precedences.
    #[test]
    fn no_packet_is_ever_dequeued_twice(
        entries in prop::collection::vec((small_dest(), small_prec()), 0..40)
    ) {
        let mq: MultiQueue<u8, u32, Noop> = MultiQueue::new();
        for (i, (dest, prec)) in entries.iter().enumerate() {
            let (packet, _handle) = Packet::new(i as u32, MsgType::Transaction, NodeType::Core, *dest, *prec);
            mq.enqueue(Arc::new(packet));
        }

        let mut seen = HashSet::new();
        for prec in Precedence::DESCENDING {
            while let Some(p) = mq.dequeue_by(&Key::ByPrec(prec), |_| true) {
                prop_assert!(seen.insert(p.id), "packet {} dequeued twice", p.id);
            }
        }
        prop_assert_eq!(seen.len(), entries.len());
    }

    /// Property 4 (FIFO per dest/prec): packets enqueued to the same
    /// `(dest, prec)` key come back out in the order they went in.
    #[test]
    fn fifo_order_is_preserved_per_dest_and_precedence(
        dest in small_dest(),
        prec in small_prec(),
        count in 0usize..20,
    ) {
        let mq: MultiQueue<u8, u32, Noop> = MultiQueue::new();
        let mut ids = Vec::new();
        for i in 0..count {
            let (packet, _handle) = Packet::new(i as u32, MsgType::Transaction, NodeType::Core, dest, prec);
            ids.push(packet.id);
            mq.enqueue(Arc::new(packet));
        }

        let mut out = Vec::new();
        while let Some(p) = mq.dequeue_by(&Key::ByDestPrec(dest, prec), |_| true) {
            out.push(p.id);
        }
        prop_assert_eq!(out, ids);
    }

    /// Property 6 (origin suppression): `remove_origin` never leaves the
    /// forwarded-from id reachable through any surviving alternative.
    #[test]
    fn remove_origin_never_returns_the_forwarder(
        sets in prop::collection::vec(prop::collection::vec(0u8..6, 1..4), 0..6),
        forwarded_from in 0u8..6,
    ) {
        let fwd_sets: Vec<ForwardingSet<u8>> = sets.into_iter().filter_map(ForwardingSet::new).collect();
        let origin = Origin::Forward(forwarded_from);
        let out = remove_origin(&origin, &fwd_sets);
        for fs in &out {
            prop_assert!(!fs.alternatives().contains(&forwarded_from));
        }
    }

    /// `restrict_peers` never returns an alternative outside the caller's
    /// restriction set (the invariant `enqueue_to` depends on).
    #[test]
    fn restrict_peers_never_returns_an_id_outside_the_restriction(
        sets in prop::collection::vec(prop::collection::vec(0u8..8, 1..4), 0..6),
        restriction in prop::collection::hash_set(0u8..8, 0..8),
    ) {
        let fwd_sets: Vec<ForwardingSet<u8>> = sets.into_iter().filter_map(ForwardingSet::new).collect();
        let out = restrict_peers(&restriction, &fwd_sets);
        for fs in &out {
            for alt in fs.alternatives() {
                prop_assert!(restriction.contains(alt));
            }
        }
    }

    /// Property 8 (monoid law): `merge` is associative over arbitrary peer
    /// lists, with `empty()` as identity.
    #[test]
    fn merge_is_associative_with_arbitrary_peers(
        a in prop::collection::vec(0u8..10, 0..5),
        b in prop::collection::vec(0u8..10, 0..5),
        c in prop::collection::vec(0u8..10, 0..5),
    ) {
        let pa = Peers::simple(NodeType::Core, a);
        let pb = Peers::simple(NodeType::Core, b);
        let pc = Peers::simple(NodeType::Core, c);

        let left = pa.merge(&pb).merge(&pc);
        let right = pa.merge(&pb.merge(&pc));
        prop_assert_eq!(left.peers_of_type(NodeType::Core), right.peers_of_type(NodeType::Core));

        let identity = pa.merge(&Peers::empty());
        prop_assert_eq!(identity.peers_of_type(NodeType::Core), pa.peers_of_type(NodeType::Core));
    }

    /// Property 2 (MaxAhead bound): however many times the same destination
    /// is offered to the interpreter, the number of packets it ever schedules
    /// for that destination never exceeds `max_ahead`.
    #[test]
    fn max_ahead_bounds_scheduled_work_to_one_destination(
        max_ahead in 1usize..6,
        attempts in 1usize..20,
    ) {
        let mq: MultiQueue<u8, u32, Noop> = MultiQueue::new();
        let failures = FailureTracker::new(Arc::new(SystemClock));
        let inflight = InFlight::new();
        let mut table = EnqueuePolicyTable::new();
        table.set(
            MsgType::AnnounceBlockHeader,
            OriginKind::Sender,
            vec![EnqueueInstruction::EnqueueAll {
                dest_type: NodeType::Core,
                max_ahead,
                precedence: Precedence::Highest,
            }],
        );
        let peers = Peers::simple(NodeType::Core, vec![7u8]);

        for _ in 0..attempts {
            interpret(
                MsgType::AnnounceBlockHeader, &Origin::Sender, &0u32, &peers, &table, &failures, &inflight, &mq,
            );
        }
        prop_assert!(mq.size_by(&Key::ByDest(7u8)) <= max_ahead);
    }
}

/// Property 9 (cherish bound): `enqueue_cherished` always terminates within
/// its configured retry budget when nothing is ever eligible.
#[test]
fn cherish_exhausts_within_its_configured_budget() {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap();

    for retries in 1..6u32 {
        rt.block_on(async {
            let config = QueueConfig {
                cherish_retries: retries,
                cherish_retry_delay: Duration::from_millis(10),
                max_scheduled: None,
            };
            let queue = OutboundQueue::new(NodeRole::Core, Noop, config, Arc::new(SystemClock));
            // No peers registered: every attempt is NoPeer, never eligible.
            let err = queue
                .enqueue_cherished(MsgType::AnnounceBlockHeader, Origin::Sender, 0u32)
                .await
                .unwrap_err();
            assert_eq!(err, QueueError::CherishExhausted);
        });
    }
}
