//! Per-node record of what a node already knows about its peers' chains.

use dashmap::DashMap;

use crate::{node::NodeId, proof::Proof};

/// Tracks, for each peer, the highest block number this node has already
/// learned about. Pure data: no validation, no I/O.
///
/// Backed by a [`DashMap`] so updates from [`Proof::apply_updates`] never need
/// a crate-wide lock; the merge itself uses `DashMap::entry`, the same
/// `Entry::Occupied`/`Entry::Vacant` idiom used for the pending-transaction map
/// in this lineage's transaction queue.
#[derive(Debug, Default)]
pub struct MetaKnowledge {
    last_known: DashMap<NodeId, u64>,
}

impl MetaKnowledge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns 0 if nothing is known about `peer` yet.
    pub fn first_unknown_block_number(&self, peer: NodeId) -> u64 {
        self.last_known.get(&peer).map_or(0, |v| *v + 1)
    }

    /// Returns -1 if nothing is known about `peer` yet.
    pub fn last_known_block_number(&self, peer: NodeId) -> i64 {
        self.last_known.get(&peer).map_or(-1, |v| *v as i64)
    }

    /// Merges `max(existing, updates.last.number)` for every owner present in
    /// `proof`'s chain updates. Called only after `apply_updates` has
    /// successfully spliced every chain, per the concurrency contract in
    /// `spec.md` §5.
    #[cfg(any(test, feature = "test-support"))]
    pub fn update_for_test(&self, peer: NodeId, last_known: u64) {
        self.last_known.insert(peer, last_known);
    }

    pub fn update(&self, proof: &Proof) {
        for (owner, blocks) in proof.chain_updates() {
            let Some(last) = blocks.last() else { continue };
            self.last_known
                .entry(*owner)
                .and_modify(|v| *v = (*v).max(last.number()))
                .or_insert_with(|| last.number());
        }
    }
}
