//! `InFlight`: `nid -> (prec -> count)`, counts packets dispatched but not
//! yet completed (§3). Invariant: `sum over prec <= MaxInFlight(dest_type)`,
//! enforced by the scheduler consulting `total` before dispatch (§4.F).

use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::Mutex;

use crate::precedence::Precedence;

#[derive(Clone, Copy, Default)]
struct Counts([usize; 5]);

impl Counts {
    fn total(&self) -> usize {
        self.0.iter().sum()
    }

    fn at_or_above(&self, prec: Precedence) -> usize {
        prec.at_or_above().map(|p| self.0[p.index()]).sum()
    }
}

pub struct InFlight<N> {
    table: Mutex<HashMap<N, Counts>>,
}

impl<N: Eq + Hash + Clone> InFlight<N> {
    pub fn new() -> Self {
        Self { table: Mutex::new(HashMap::new()) }
    }

    pub fn increment(&self, nid: &N, prec: Precedence) {
        let mut table = self.table.lock();
        let counts = table.entry(nid.clone()).or_default();
        counts.0[prec.index()] += 1;
    }

    pub fn decrement(&self, nid: &N, prec: Precedence) {
        let mut table = self.table.lock();
        if let Some(counts) = table.get_mut(nid) {
            counts.0[prec.index()] = counts.0[prec.index()].saturating_sub(1);
            if counts.total() == 0 {
                table.remove(nid);
            }
        }
    }

    pub fn total_for(&self, nid: &N) -> usize {
        self.table.lock().get(nid).map_or(0, Counts::total)
    }

    /// Sum of in-flight counts to `nid` at precedence `>= prec` — half of the
    /// `ahead` computation in `pick_alt` (§4.E); the other half comes from
    /// the multi-queue's `ByDestPrec` sizes.
    pub fn at_or_above(&self, nid: &N, prec: Precedence) -> usize {
        self.table.lock().get(nid).map_or(0, |c| c.at_or_above(prec))
    }

    pub fn remove(&self, nid: &N) {
        self.table.lock().remove(nid);
    }

    pub fn is_empty(&self) -> bool {
        self.table.lock().is_empty()
    }
}

impl<N: Eq + Hash + Clone> Default for InFlight<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_decrement_round_trips() {
        let inf: InFlight<u32> = InFlight::new();
        inf.increment(&1, Precedence::High);
        inf.increment(&1, Precedence::Low);
        assert_eq!(inf.total_for(&1), 2);
        assert_eq!(inf.at_or_above(&1, Precedence::Medium), 1);

        inf.decrement(&1, Precedence::High);
        inf.decrement(&1, Precedence::Low);
        assert_eq!(inf.total_for(&1), 0);
        assert!(inf.is_empty());
    }
}
