//! Named peer-knowledge partitions (§3, "Bucket"). Each bucket has exactly
//! one writer; the effective peer set is the monoidal fold of all buckets.

use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::Mutex;

use crate::peers::Peers;

pub struct BucketTable<N> {
    buckets: Mutex<HashMap<String, Peers<N>>>,
}

impl<N: Clone + Eq + Hash> BucketTable<N> {
    pub fn new() -> Self {
        Self { buckets: Mutex::new(HashMap::new()) }
    }

    /// The merged view across all buckets (the "fold").
    pub fn fold(&self) -> Peers<N> {
        let buckets = self.buckets.lock();
        buckets.values().fold(Peers::empty(), |acc, p| acc.merge(p))
    }

    /// Applies `f` to the named bucket (creating it if absent) and returns
    /// the set of peer ids that were present in the fold beforehand but are
    /// no longer reachable afterward — the set `update_peers_bucket` (§4.H)
    /// must reclaim in-flight/failure/queue state for.
    ///
    /// Held for the whole read-modify-diff under one lock, which is exactly
    /// what makes "writer T adding n then enqueuing cannot have the message
    /// removed by concurrent writer U" hold: U cannot observe a fold that
    /// mixes T's old and new bucket contents.
    pub fn update(&self, bucket_id: &str, f: impl FnOnce(&mut Peers<N>)) -> Vec<N> {
        let mut buckets = self.buckets.lock();
        let before = buckets.values().fold(Peers::empty(), |acc, p| acc.merge(p)).all_ids();

        let entry = buckets.entry(bucket_id.to_string()).or_insert_with(Peers::empty);
        f(entry);

        let after = buckets.values().fold(Peers::empty(), |acc, p| acc.merge(p)).all_ids();
        before.difference(&after).cloned().collect()
    }
}

impl<N: Clone + Eq + Hash> Default for BucketTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peers::NodeType;

    #[test]
    fn vanished_peer_is_reported_once() {
        let buckets: BucketTable<u32> = BucketTable::new();
        buckets.update("gossip", |p| *p = Peers::simple(NodeType::Core, vec![1, 2]));
        buckets.update("verified", |p| *p = Peers::simple(NodeType::Relay, vec![3]));

        let vanished = buckets.update("gossip", |p| *p = Peers::simple(NodeType::Core, vec![1]));
        assert_eq!(vanished, vec![2]);

        // 3 is still present via the other bucket, so removing it from
        // "gossip" (where it never was) changes nothing.
        let vanished = buckets.update("gossip", |_p| {});
        assert!(vanished.is_empty());
    }
}
