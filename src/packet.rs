//! The unit of scheduling (§3) and the multi-queue's indexing keys.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::SlotError;
use crate::message::MsgType;
use crate::peers::NodeType;
use crate::precedence::Precedence;
use crate::transport::Transport;

/// A multi-queue indexing key. A packet is enqueued under all three keys it
/// declares and removed from all three on dequeue (§3, §4.A).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key<N> {
    ByPrec(Precedence),
    ByDest(N),
    ByDestPrec(N, Precedence),
}

fn next_packet_id() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

/// `{payload, msg_type, dest_type, dest_id, prec, sent_slot}` from §3. The
/// `result_tx` is the write-once half of the single-shot `sent_slot`; the
/// caller holds the matching `ResultHandle` (a `oneshot::Receiver`, which
/// already resolves to an error if its sender is dropped without a write —
/// exactly the "always resolved" guarantee of §5).
pub struct Packet<N, P, T>
where
    T: Transport<N, P>,
{
    pub id: u64,
    pub payload: P,
    pub msg_type: MsgType,
    pub dest_type: NodeType,
    pub dest_id: N,
    pub prec: Precedence,
    keys: Vec<Key<N>>,
    result_tx: parking_lot::Mutex<Option<oneshot::Sender<Result<T::Value, T::Error>>>>,
}

impl<N: Clone, P, T: Transport<N, P>> Packet<N, P, T> {
    pub fn new(
        payload: P,
        msg_type: MsgType,
        dest_type: NodeType,
        dest_id: N,
        prec: Precedence,
    ) -> (Self, ResultHandle<T::Value, T::Error>)
    where
        N: Eq + std::hash::Hash,
    {
        let (tx, rx) = oneshot::channel();
        let keys = vec![
            Key::ByPrec(prec),
            Key::ByDest(dest_id.clone()),
            Key::ByDestPrec(dest_id.clone(), prec),
        ];
        let packet = Self {
            id: next_packet_id(),
            payload,
            msg_type,
            dest_type,
            dest_id,
            prec,
            keys,
            result_tx: parking_lot::Mutex::new(Some(tx)),
        };
        (packet, ResultHandle { rx })
    }

    pub fn keys(&self) -> &[Key<N>] {
        &self.keys
    }

    /// Resolves the packet's `sent_slot` exactly once. A second call (a
    /// programmer error — a packet is observed by exactly one worker) is a
    /// silent no-op rather than a panic, since the channel is already gone.
    pub fn resolve(&self, result: Result<T::Value, T::Error>) {
        if let Some(tx) = self.result_tx.lock().take() {
            let _ = tx.send(result);
        }
    }
}

/// The caller's half of a packet's single-shot result cell: a typed future.
pub struct ResultHandle<V, E> {
    rx: oneshot::Receiver<Result<V, E>>,
}

impl<V, E> Future for ResultHandle<V, E> {
    type Output = Result<V, SlotError<E>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(Ok(value))) => Poll::Ready(Ok(value)),
            Poll::Ready(Ok(Err(e))) => Poll::Ready(Err(SlotError::SendFailure(e))),
            Poll::Ready(Err(_canceled)) => Poll::Ready(Err(SlotError::Cancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}
