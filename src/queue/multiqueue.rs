//! A mapping from `Key` to an ordered FIFO of packets, with atomic multi-key
//! enqueue and atomic cross-key removal on dequeue (§4.A).
//!
//! One `parking_lot::Mutex` guards the whole table; every operation is a
//! single critical section, so cross-key consistency and linearizability
//! fall out of "it's all one lock" rather than needing a separate proof.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::Arc;

use crate::packet::{Key, Packet};
use crate::transport::Transport;

struct Inner<N, P, T: Transport<N, P>> {
    queues: HashMap<Key<N>, VecDeque<Arc<Packet<N, P, T>>>>,
    total: usize,
}

pub struct MultiQueue<N, P, T: Transport<N, P>> {
    inner: parking_lot::Mutex<Inner<N, P, T>>,
}

impl<N, P, T: Transport<N, P>> Default for MultiQueue<N, P, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Eq + Hash + Clone, P, T: Transport<N, P>> MultiQueue<N, P, T> {
    pub fn new() -> Self {
        Self {
            inner: parking_lot::Mutex::new(Inner {
                queues: HashMap::new(),
                total: 0,
            }),
        }
    }

    /// Appends `packet` to every key it declares, atomically. Payload
    /// identity is shared across keys via the `Arc` clone, not the payload.
    pub fn enqueue(&self, packet: Arc<Packet<N, P, T>>) {
        let mut inner = self.inner.lock();
        for key in packet.keys() {
            inner.queues.entry(key.clone()).or_default().push_back(packet.clone());
        }
        inner.total += 1;
    }

    /// Pops the first payload under `key` satisfying `predicate`, removing it
    /// from every other key it sits in. Leaves the queue unchanged if nothing
    /// matches.
    pub fn dequeue_by(
        &self,
        key: &Key<N>,
        mut predicate: impl FnMut(&Packet<N, P, T>) -> bool,
    ) -> Option<Arc<Packet<N, P, T>>> {
        let mut inner = self.inner.lock();
        let fifo = inner.queues.get_mut(key)?;
        let pos = fifo.iter().position(|p| predicate(p))?;
        let packet = fifo.remove(pos).expect("position came from this deque");

        for other_key in packet.keys() {
            if other_key == key {
                continue;
            }
            if let Some(other_fifo) = inner.queues.get_mut(other_key) {
                if let Some(p) = other_fifo.iter().position(|x| Arc::ptr_eq(x, &packet)) {
                    other_fifo.remove(p);
                }
            }
        }
        inner.total -= 1;
        Some(packet)
    }

    pub fn size_by(&self, key: &Key<N>) -> usize {
        self.inner.lock().queues.get(key).map_or(0, |q| q.len())
    }

    pub fn total_size(&self) -> usize {
        self.inner.lock().total
    }

    /// Removes every packet whose key set contains `key`, from all keys.
    /// Returns the removed packets so the caller can resolve their result
    /// cells (used when a destination vanishes from the peer fold, §4.H).
    pub fn remove_all_in(&self, key: &Key<N>) -> Vec<Arc<Packet<N, P, T>>> {
        let mut inner = self.inner.lock();
        let removed: Vec<_> = inner
            .queues
            .remove(key)
            .map(|q| q.into_iter().collect())
            .unwrap_or_default();

        for packet in &removed {
            for other_key in packet.keys() {
                if other_key == key {
                    continue;
                }
                if let Some(other_fifo) = inner.queues.get_mut(other_key) {
                    other_fifo.retain(|x| !Arc::ptr_eq(x, packet));
                }
            }
        }
        inner.total -= removed.len();
        removed
    }
}
