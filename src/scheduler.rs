//! Dequeue scheduler (§4.F): the supervisor loop. Scans precedence classes
//! highest first, dispatches the first admissible packet it finds, and
//! yields to flush/shutdown control only once the scheduled queue is empty.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::warn;

use crate::clock::Clock;
use crate::failures::FailureTracker;
use crate::inflight::InFlight;
use crate::packet::{Key, Packet};
use crate::peers::NodeType;
use crate::policy::{DequeuePolicyTable, FailurePolicyTable};
use crate::precedence::Precedence;
use crate::queue::MultiQueue;
use crate::registry::WorkerRegistry;
use crate::signal::{CtrlMsg, Retry, Signal};
use crate::transport::Transport;

pub struct SchedulerCtx<N, P, T: Transport<N, P>> {
    pub mq: Arc<MultiQueue<N, P, T>>,
    pub signal: Arc<Signal>,
    pub inflight: Arc<InFlight<N>>,
    pub failures: Arc<FailureTracker<N>>,
    pub dequeue_policy: DequeuePolicyTable,
    pub failure_policy: FailurePolicyTable,
    pub registry: Arc<WorkerRegistry>,
    pub transport: Arc<T>,
    pub clock: Arc<dyn Clock>,
    last_sent: Mutex<HashMap<NodeType, Instant>>,
}

impl<N, P, T> SchedulerCtx<N, P, T>
where
    N: Eq + Hash + Clone + Send + Sync + std::fmt::Debug + 'static,
    P: Send + 'static,
    T: Transport<N, P>,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mq: Arc<MultiQueue<N, P, T>>,
        signal: Arc<Signal>,
        inflight: Arc<InFlight<N>>,
        failures: Arc<FailureTracker<N>>,
        dequeue_policy: DequeuePolicyTable,
        failure_policy: FailurePolicyTable,
        registry: Arc<WorkerRegistry>,
        transport: Arc<T>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            mq,
            signal,
            inflight,
            failures,
            dequeue_policy,
            failure_policy,
            registry,
            transport,
            clock,
            last_sent: Mutex::new(HashMap::new()),
        }
    }

    fn is_admissible(&self, packet: &Packet<N, P, T>) -> bool {
        let rule = self.dequeue_policy.rule(packet.dest_type);
        if self.inflight.total_for(&packet.dest_id) >= rule.max_in_flight {
            return false;
        }
        if self.failures.has_recent_failure(&packet.dest_id) {
            return false;
        }
        if let Some(rate) = rule.rate_limit {
            let now = self.clock.now();
            if let Some(last) = self.last_sent.lock().get(&packet.dest_type).copied() {
                if now < last + rate.min_spacing() {
                    return false;
                }
            }
        }
        true
    }

    fn try_dequeue_one(&self) -> Option<Arc<Packet<N, P, T>>> {
        for prec in Precedence::DESCENDING {
            if let Some(packet) = self.mq.dequeue_by(&Key::ByPrec(prec), |p| self.is_admissible(p)) {
                return Some(packet);
            }
        }
        None
    }
}

/// Spawns a worker that performs one `SendMsg` call and records its outcome.
/// Runs entirely on a blocking thread via the registry; every mutation here
/// (in-flight, failures, signal) is a plain sync call, so no async handoff
/// is needed between the send and its bookkeeping.
fn dispatch<N, P, T>(ctx: &Arc<SchedulerCtx<N, P, T>>, packet: Arc<Packet<N, P, T>>)
where
    N: Eq + Hash + Clone + Send + Sync + std::fmt::Debug + 'static,
    P: Send + 'static,
    T: Transport<N, P>,
{
    ctx.inflight.increment(&packet.dest_id, packet.prec);
    ctx.last_sent.lock().insert(packet.dest_type, ctx.clock.now());

    let ctx = ctx.clone();
    ctx.registry.fork_blocking(move || {
        let result = ctx.transport.send(&packet.payload, &packet.dest_id);
        let failed = result.is_err();
        if let Err(ref e) = result {
            warn!(dest = ?packet.dest_id, msg_type = ?packet.msg_type, error = %e, "send failed");
        }
        packet.resolve(result);
        ctx.inflight.decrement(&packet.dest_id, packet.prec);
        if failed {
            let cooldown = ctx.failure_policy.reconsider_after(packet.dest_type, packet.msg_type);
            ctx.failures.record(packet.dest_id.clone(), cooldown);
        }
        ctx.signal.poke();
    });
}

/// The supervisor loop. Runs until a `Shutdown` control message is drained
/// after all workers have returned.
pub async fn run<N, P, T>(ctx: Arc<SchedulerCtx<N, P, T>>)
where
    N: Eq + Hash + Clone + Send + Sync + std::fmt::Debug + 'static,
    P: Send + 'static,
    T: Transport<N, P>,
{
    loop {
        let retry = ctx
            .signal
            .retry_if_nothing(|| ctx.try_dequeue_one(), || ctx.mq.total_size() == 0)
            .await;

        match retry {
            Retry::Item(packet) => dispatch(&ctx, packet),
            Retry::Ctrl(CtrlMsg::Flush(ack)) => {
                ctx.registry.wait_all().await;
                let _ = ack.send(());
            }
            Retry::Ctrl(CtrlMsg::Shutdown(ack)) => {
                ctx.registry.wait_all().await;
                let _ = ack.send(());
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::message::MsgType;
    use crate::policy::RatePerSec;

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct TestErr;

    struct Recording {
        sent: Mutex<Vec<u32>>,
    }
    impl Transport<u32, &'static str> for Recording {
        type Value = ();
        type Error = TestErr;
        fn send(&self, _p: &&'static str, dest: &u32) -> Result<(), TestErr> {
            self.sent.lock().push(*dest);
            Ok(())
        }
    }

    fn make_ctx() -> Arc<SchedulerCtx<u32, &'static str, Recording>> {
        let mut dequeue_policy = DequeuePolicyTable::new();
        dequeue_policy.set(
            NodeType::Core,
            crate::policy::DequeueRule {
                rate_limit: Some(RatePerSec(1000)),
                max_in_flight: 4,
            },
        );
        Arc::new(SchedulerCtx::new(
            Arc::new(MultiQueue::new()),
            Arc::new(Signal::new()),
            Arc::new(InFlight::new()),
            Arc::new(FailureTracker::new(Arc::new(SystemClock))),
            dequeue_policy,
            FailurePolicyTable::defaults(),
            Arc::new(WorkerRegistry::new()),
            Arc::new(Recording { sent: Mutex::new(Vec::new()) }),
            Arc::new(SystemClock),
        ))
    }

    #[tokio::test]
    async fn dispatches_a_scheduled_packet_and_resolves_its_handle() {
        let ctx = make_ctx();
        let (packet, handle) = Packet::new("hi", MsgType::Transaction, NodeType::Core, 1u32, Precedence::Low);
        ctx.mq.enqueue(Arc::new(packet));

        let runner = tokio::spawn(run(ctx.clone()));
        let result = handle.await;
        assert!(result.is_ok());

        let (tx, rx) = tokio::sync::oneshot::channel();
        ctx.signal.submit_ctrl(CtrlMsg::Shutdown(tx));
        rx.await.unwrap();
        runner.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_waits_for_in_flight_worker_before_acking() {
        let ctx = make_ctx();
        let runner = tokio::spawn(run(ctx.clone()));

        let (tx, rx) = tokio::sync::oneshot::channel();
        ctx.signal.submit_ctrl(CtrlMsg::Shutdown(tx));
        rx.await.unwrap();
        runner.await.unwrap();
        assert_eq!(ctx.registry.active_count(), 0);
    }
}
