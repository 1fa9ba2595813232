//! Worker registry (§5, §9): tracks every in-flight worker task so the
//! supervisor can wait for all of them (flush, shutdown) or cancel all of
//! them (abnormal termination) without keeping its own list inline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

pub type WorkerId = u64;

#[derive(Default)]
pub struct WorkerRegistry {
    next_id: AtomicU64,
    handles: Mutex<HashMap<WorkerId, tokio::task::JoinHandle<()>>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `work` as a blocking worker (the collaborator `SendMsg` is a
    /// blocking call) behind a thin supervising async task that registers on
    /// spawn and deregisters on completion, whether `work` returns normally
    /// or panics.
    pub fn fork_blocking<F>(self: &Arc<Self>, work: F) -> WorkerId
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let registry = self.clone();
        let supervised = tokio::spawn(async move {
            let _ = tokio::task::spawn_blocking(work).await;
            registry.handles.lock().remove(&id);
        });
        self.handles.lock().insert(id, supervised);
        id
    }

    pub fn active_count(&self) -> usize {
        self.handles.lock().len()
    }

    /// Joins every still-registered worker. Used by `flush`/`shutdown`,
    /// which wait for workers to finish on their own rather than cancelling
    /// them (§5).
    pub async fn wait_all(&self) {
        loop {
            let handle = {
                let mut handles = self.handles.lock();
                let next_key = handles.keys().next().copied();
                next_key.and_then(|k| handles.remove(&k))
            };
            match handle {
                Some(h) => {
                    let _ = h.await;
                }
                None => break,
            }
        }
    }

    /// Aborts every still-registered worker. Reserved for abnormal
    /// supervisor termination (§5) — the normal flush/shutdown path always
    /// uses `wait_all`. Aborting the supervising task cannot interrupt
    /// `SendMsg` code already running on its blocking thread; it only stops
    /// the result from ever being observed (documented limitation, see
    /// DESIGN.md).
    pub fn kill_all(&self) {
        let handles = std::mem::take(&mut *self.handles.lock());
        for (_, h) in handles {
            h.abort();
        }
    }
}
