//! Single-consumer wakeup with a piggy-backed control message (§4.B).
//!
//! Built on `tokio::sync::Notify`, which already coalesces pokes that arrive
//! without an intervening consumer into a single stored permit — exactly the
//! idempotent-poke contract the spec asks for.

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Out-of-band control messages the supervisor checks for between scheduled
/// packets.
pub enum CtrlMsg {
    Flush(tokio::sync::oneshot::Sender<()>),
    Shutdown(tokio::sync::oneshot::Sender<()>),
}

pub enum Retry<T> {
    Ctrl(CtrlMsg),
    Item(T),
}

#[derive(Default)]
pub struct Signal {
    notify: Notify,
    ctrl: Mutex<Option<CtrlMsg>>,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wakes the single consumer. Any number of producers may call this;
    /// repeated pokes without an intervening consumer collapse to one.
    pub fn poke(&self) {
        self.notify.notify_one();
    }

    /// Stashes a control message for the consumer to pick up and pokes it.
    pub fn submit_ctrl(&self, msg: CtrlMsg) {
        *self.ctrl.lock() = Some(msg);
        self.poke();
    }

    fn take_ctrl(&self) -> Option<CtrlMsg> {
        self.ctrl.lock().take()
    }

    /// The `retry_if_nothing` contract: run `act`; if it yields a packet,
    /// return it. Otherwise check for a control message — but only when
    /// `queue_is_empty()` says so, which gives scheduled messages priority
    /// over flush/shutdown (§4.F). Otherwise block until poked and retry.
    ///
    /// Only one task may call this at a time; it is not reentrant.
    pub async fn retry_if_nothing<T>(
        &self,
        mut act: impl FnMut() -> Option<T>,
        queue_is_empty: impl Fn() -> bool,
    ) -> Retry<T> {
        loop {
            // Register interest before checking state, so a poke that lands
            // between our check and the await below is not lost.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(item) = act() {
                return Retry::Item(item);
            }
            if queue_is_empty() {
                if let Some(ctrl) = self.take_ctrl() {
                    return Retry::Ctrl(ctrl);
                }
            }
            notified.await;
        }
    }
}
