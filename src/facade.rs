//! Lifecycle facade (§4.H): the crate's public surface. Wires the multi-queue,
//! signal, policy tables, failure tracker, in-flight table, bucket table and
//! worker registry together behind `new`/`enqueue*`/`update_peers_bucket`/
//! `flush`/`wait_shutdown`/`dump_state`.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::buckets::BucketTable;
use crate::clock::Clock;
use crate::config::QueueConfig;
use crate::enqueue;
use crate::error::{QueueError, SlotError};
use crate::failures::FailureTracker;
use crate::inflight::InFlight;
use crate::message::{MsgType, Origin};
use crate::packet::{Key, ResultHandle};
use crate::peers::Peers;
use crate::policy::{DequeuePolicyTable, EnqueuePolicyTable, FailurePolicyTable, NodeRole};
use crate::precedence::Precedence;
use crate::queue::MultiQueue;
use crate::registry::WorkerRegistry;
use crate::scheduler::{self, SchedulerCtx};
use crate::signal::{CtrlMsg, Signal};
use crate::transport::Transport;

/// The bound every node identifier in this crate satisfies (§6). A blanket
/// impl means callers never write it out themselves.
pub trait NodeId: Clone + Eq + Ord + Hash + std::fmt::Display + std::fmt::Debug + Send + Sync + 'static {}
impl<T> NodeId for T where T: Clone + Eq + Ord + Hash + std::fmt::Display + std::fmt::Debug + Send + Sync + 'static {}

/// A point-in-time summary rendered by `dump_state` (§4.H).
#[derive(Debug, Serialize)]
pub struct QueueSnapshot {
    pub scheduled_total: usize,
    pub scheduled_by_precedence: Vec<(Precedence, usize)>,
    pub failure_table_size: usize,
    pub active_workers: usize,
}

pub trait Formatter {
    fn format(&self, snapshot: &QueueSnapshot) -> String;
}

/// The ambient "some formatter exists" default, via `serde_json`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format(&self, snapshot: &QueueSnapshot) -> String {
        serde_json::to_string_pretty(snapshot).unwrap_or_else(|_| "{}".to_string())
    }
}

pub struct OutboundQueue<N, P, T>
where
    N: NodeId,
    T: Transport<N, P>,
{
    mq: Arc<MultiQueue<N, P, T>>,
    signal: Arc<Signal>,
    inflight: Arc<InFlight<N>>,
    failures: Arc<FailureTracker<N>>,
    buckets: Arc<BucketTable<N>>,
    registry: Arc<WorkerRegistry>,
    enqueue_policy: EnqueuePolicyTable,
    scheduler_ctx: Arc<SchedulerCtx<N, P, T>>,
    config: QueueConfig,
    dequeue_started: AtomicBool,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl<N, P, T> OutboundQueue<N, P, T>
where
    N: NodeId,
    P: Send + 'static,
    T: Transport<N, P>,
{
    pub fn new(role: NodeRole, transport: T, config: QueueConfig, clock: Arc<dyn Clock>) -> Self {
        let mq = Arc::new(MultiQueue::new());
        let signal = Arc::new(Signal::new());
        let inflight = Arc::new(InFlight::new());
        let failures = Arc::new(FailureTracker::new(clock.clone()));
        let registry = Arc::new(WorkerRegistry::new());

        let scheduler_ctx = Arc::new(SchedulerCtx::new(
            mq.clone(),
            signal.clone(),
            inflight.clone(),
            failures.clone(),
            DequeuePolicyTable::defaults(),
            FailurePolicyTable::defaults(),
            registry.clone(),
            Arc::new(transport),
            clock,
        ));

        Self {
            mq,
            signal,
            inflight,
            failures,
            buckets: Arc::new(BucketTable::new()),
            registry,
            enqueue_policy: EnqueuePolicyTable::defaults(role),
            scheduler_ctx,
            config,
            dequeue_started: AtomicBool::new(false),
            supervisor: Mutex::new(None),
        }
    }

    /// Applies `f` to the named bucket and reclaims in-flight/failure/
    /// scheduled state for any peer that disappeared from the fold as a
    /// result (§4.H invariant).
    pub fn update_peers_bucket(&self, bucket_id: &str, f: impl FnOnce(&mut Peers<N>)) {
        let vanished = self.buckets.update(bucket_id, f);
        for nid in vanished {
            self.inflight.remove(&nid);
            self.failures.remove(&nid);
            // Dropping the removed packets resolves their `ResultHandle`s to
            // `SlotError::Cancelled`, the oneshot sender going out of scope.
            let _ = self.mq.remove_all_in(&Key::ByDest(nid));
        }
    }

    fn peers(&self) -> Peers<N> {
        self.buckets.fold()
    }

    /// Fire-and-forget: schedules whatever packets the enqueue policy
    /// produces and returns their handles without waiting on any of them.
    pub fn enqueue(&self, msg_type: MsgType, origin: Origin<N>, payload: P) -> Vec<ResultHandle<T::Value, T::Error>>
    where
        P: Clone,
    {
        let peers = self.peers();
        let handles = enqueue::interpret(
            msg_type,
            &origin,
            &payload,
            &peers,
            &self.enqueue_policy,
            &self.failures,
            &self.inflight,
            &self.mq,
        );
        self.signal.poke();
        handles
    }

    /// As `enqueue`, restricted to peers in `restriction`.
    pub fn enqueue_to(
        &self,
        restriction: &HashSet<N>,
        msg_type: MsgType,
        origin: Origin<N>,
        payload: P,
    ) -> Vec<ResultHandle<T::Value, T::Error>>
    where
        P: Clone,
    {
        let peers = enqueue::restrict(&self.peers(), restriction);
        let handles = enqueue::interpret(
            msg_type,
            &origin,
            &payload,
            &peers,
            &self.enqueue_policy,
            &self.failures,
            &self.inflight,
            &self.mq,
        );
        self.signal.poke();
        handles
    }

    /// Waits for every handle `enqueue` produced. `QueueError::NoPeer` if
    /// nothing was eligible to schedule at all (§7.2).
    pub async fn enqueue_sync(
        &self,
        msg_type: MsgType,
        origin: Origin<N>,
        payload: P,
    ) -> Result<Vec<Result<T::Value, SlotError<T::Error>>>, QueueError>
    where
        P: Clone,
    {
        let handles = self.enqueue(msg_type, origin, payload);
        if handles.is_empty() {
            return Err(QueueError::NoPeer);
        }
        let mut out = Vec::with_capacity(handles.len());
        for h in handles {
            out.push(h.await);
        }
        Ok(out)
    }

    pub async fn enqueue_to_sync(
        &self,
        restriction: &HashSet<N>,
        msg_type: MsgType,
        origin: Origin<N>,
        payload: P,
    ) -> Result<Vec<Result<T::Value, SlotError<T::Error>>>, QueueError>
    where
        P: Clone,
    {
        let handles = self.enqueue_to(restriction, msg_type, origin, payload);
        if handles.is_empty() {
            return Err(QueueError::NoPeer);
        }
        let mut out = Vec::with_capacity(handles.len());
        for h in handles {
            out.push(h.await);
        }
        Ok(out)
    }

    /// Retries `enqueue_sync` up to the configured cherish budget when the
    /// failure is `NoPeer`, giving up with `CherishExhausted` (§7.3).
    pub async fn enqueue_cherished(
        &self,
        msg_type: MsgType,
        origin: Origin<N>,
        payload: P,
    ) -> Result<Vec<Result<T::Value, SlotError<T::Error>>>, QueueError>
    where
        P: Clone,
    {
        let mut attempt = 0;
        loop {
            match self.enqueue_sync(msg_type, origin.clone(), payload.clone()).await {
                Ok(results) => return Ok(results),
                Err(QueueError::NoPeer) => {
                    attempt += 1;
                    if attempt >= self.config.cherish_retries {
                        return Err(QueueError::CherishExhausted);
                    }
                    tokio::time::sleep(self.config.cherish_retry_delay).await;
                }
                Err(other) => return Err(other),
            }
        }
    }

    pub async fn enqueue_to_cherished(
        &self,
        restriction: &HashSet<N>,
        msg_type: MsgType,
        origin: Origin<N>,
        payload: P,
    ) -> Result<Vec<Result<T::Value, SlotError<T::Error>>>, QueueError>
    where
        P: Clone,
    {
        let mut attempt = 0;
        loop {
            match self.enqueue_to_sync(restriction, msg_type, origin.clone(), payload.clone()).await {
                Ok(results) => return Ok(results),
                Err(QueueError::NoPeer) => {
                    attempt += 1;
                    if attempt >= self.config.cherish_retries {
                        return Err(QueueError::CherishExhausted);
                    }
                    tokio::time::sleep(self.config.cherish_retry_delay).await;
                }
                Err(other) => return Err(other),
            }
        }
    }

    pub fn clear_recent_failures(&self) {
        self.failures.clear_recent_failures();
    }

    /// Spawns the supervisor loop. A no-op on every call after the first —
    /// the spec calls for exactly one dequeue thread per queue instance.
    pub fn dequeue_thread(&self) {
        if self.dequeue_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let handle = tokio::spawn(scheduler::run(self.scheduler_ctx.clone()));
        *self.supervisor.lock() = Some(handle);
    }

    /// Asks the supervisor to drain every currently in-flight worker, then
    /// resumes normal scheduling. Does not stop accepting new packets.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        self.signal.submit_ctrl(CtrlMsg::Flush(tx));
        let _ = rx.await;
    }

    /// Asks the supervisor to drain every in-flight worker and then exit.
    /// Waits for the supervisor task itself to finish.
    pub async fn wait_shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        self.signal.submit_ctrl(CtrlMsg::Shutdown(tx));
        let _ = rx.await;
        let handle = self.supervisor.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    pub fn dump_state(&self, formatter: &impl Formatter) -> String {
        let scheduled_by_precedence: Vec<(Precedence, usize)> = Precedence::DESCENDING
            .iter()
            .map(|p| (*p, self.mq.size_by(&Key::ByPrec(*p))))
            .collect();
        let snapshot = QueueSnapshot {
            scheduled_total: self.mq.total_size(),
            scheduled_by_precedence,
            failure_table_size: self.failures.len(),
            active_workers: self.registry.active_count(),
        };
        formatter.format(&snapshot)
    }
}
