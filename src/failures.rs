//! Per-destination cooldown table (§4.G). Entries expire lazily against the
//! clock rather than via a background sweep: nothing in the spec calls for
//! one, and a sweep would be a feature this crate didn't ask for.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::clock::Clock;

struct FailureEntry {
    at: Instant,
    reconsider_after: Duration,
}

pub struct FailureTracker<N> {
    clock: Arc<dyn Clock>,
    table: Mutex<HashMap<N, FailureEntry>>,
}

impl<N: Eq + Hash + Clone> FailureTracker<N> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            table: Mutex::new(HashMap::new()),
        }
    }

    pub fn record(&self, nid: N, reconsider_after: Duration) {
        self.table.lock().insert(
            nid,
            FailureEntry {
                at: self.clock.now(),
                reconsider_after,
            },
        );
    }

    pub fn has_recent_failure(&self, nid: &N) -> bool {
        match self.table.lock().get(nid) {
            None => false,
            Some(entry) => self.clock.now() < entry.at + entry.reconsider_after,
        }
    }

    pub fn clear_recent_failures(&self) {
        self.table.lock().clear();
    }

    /// Drops `nid`'s entry outright — used when the peer disappears from the
    /// bucket fold (§4.H), not when its cooldown merely expires.
    pub fn remove(&self, nid: &N) {
        self.table.lock().remove(nid);
    }

    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;

    #[tokio::test(start_paused = true)]
    async fn failure_expires_after_reconsider_after() {
        let tracker = FailureTracker::new(Arc::new(SystemClock));
        tracker.record(1u32, Duration::from_secs(200));
        assert!(tracker.has_recent_failure(&1));

        tokio::time::advance(Duration::from_secs(199)).await;
        assert!(tracker.has_recent_failure(&1));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!tracker.has_recent_failure(&1));
    }

    #[tokio::test]
    async fn remove_clears_single_entry_and_clear_clears_all() {
        let tracker = FailureTracker::new(Arc::new(SystemClock));
        tracker.record(1u32, Duration::from_secs(100));
        tracker.record(2u32, Duration::from_secs(100));
        tracker.remove(&1);
        assert!(!tracker.has_recent_failure(&1));
        assert!(tracker.has_recent_failure(&2));

        tracker.clear_recent_failures();
        assert!(!tracker.has_recent_failure(&2));
        assert!(tracker.is_empty());
    }
}
