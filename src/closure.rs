//! Chain closure algorithms: given a transaction and a receiver, compute the
//! minimal set of chains whose updates must ride along in a proof.

use std::collections::{HashMap, HashSet};

use crate::{
    meta_knowledge::MetaKnowledge,
    node::NodeId,
    transaction::{Transaction, TransactionKey},
};

/// Recursively accumulates the set of owner chains a proof for `transaction`
/// must bundle for `receiver`, given what `receiver` already knows.
///
/// Both this and [`append_chains2`] guard against cyclic source graphs with a
/// recursion-path set (`visiting`), pruning (returning without recursing
/// further) only on revisiting a transaction already on the *current path* —
/// this still allows a legitimate diamond, the same source reachable from two
/// different parents, to be walked twice, while failing closed on an actual
/// cycle instead of overflowing the stack (`spec.md` §9).
pub fn append_chains(
    nr_of_nodes: usize,
    transaction: &Transaction,
    receiver: NodeId,
    meta_knowledge: &MetaKnowledge,
    chains: &mut HashSet<NodeId>,
) {
    let mut visiting = HashSet::new();
    append_chains_inner(
        nr_of_nodes,
        transaction,
        receiver,
        meta_knowledge,
        chains,
        &mut visiting,
    );
}

fn append_chains_inner(
    nr_of_nodes: usize,
    transaction: &Transaction,
    receiver: NodeId,
    meta_knowledge: &MetaKnowledge,
    chains: &mut HashSet<NodeId>,
    visiting: &mut HashSet<TransactionKey>,
) {
    let Some(owner) = transaction.sender() else {
        return;
    };
    if owner == receiver {
        return;
    }
    let Some(bn) = transaction.block_number() else {
        return;
    };
    if meta_knowledge.first_unknown_block_number(owner) >= bn {
        return;
    }

    let key = transaction.key();
    if !visiting.insert(key) {
        return;
    }

    chains.insert(owner);
    if chains.len() < nr_of_nodes.saturating_sub(1) {
        for source in transaction.sources() {
            append_chains_inner(
                nr_of_nodes,
                source,
                receiver,
                meta_knowledge,
                chains,
                visiting,
            );
        }
    }

    visiting.remove(&key);
}

/// Parallel variant producing `Map<Node, highestBlockNumber>`, using
/// `last_known_block_number` as the cutoff and max-merging the upper bound
/// per owner. Kept as a separate function from [`append_chains`] rather than
/// unified behind a cutoff/merge-op closure (an option `spec.md` §9 leaves
/// open): the two cutoff predicates and accumulator shapes differ enough
/// that a shared generic would add indirection without shrinking the
/// algorithm meaningfully.
pub fn append_chains2(
    transaction: &Transaction,
    receiver: NodeId,
    meta_knowledge: &MetaKnowledge,
    chains: &mut HashMap<NodeId, u64>,
) {
    let mut visiting = HashSet::new();
    append_chains2_inner(transaction, receiver, meta_knowledge, chains, &mut visiting);
}

fn append_chains2_inner(
    transaction: &Transaction,
    receiver: NodeId,
    meta_knowledge: &MetaKnowledge,
    chains: &mut HashMap<NodeId, u64>,
    visiting: &mut HashSet<TransactionKey>,
) {
    let Some(owner) = transaction.sender() else {
        return;
    };
    if owner == receiver {
        return;
    }
    let Some(bn) = transaction.block_number() else {
        return;
    };
    if meta_knowledge.last_known_block_number(owner) >= bn as i64 {
        return;
    }

    let key = transaction.key();
    if !visiting.insert(key) {
        return;
    }

    chains
        .entry(owner)
        .and_modify(|v| *v = (*v).max(bn))
        .or_insert(bn);

    for source in transaction.sources() {
        append_chains2_inner(source, receiver, meta_knowledge, chains, visiting);
    }

    visiting.remove(&key);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn chained_tx(id: u64, sender: NodeId, bn: u64, sources: Vec<Arc<Transaction>>) -> Arc<Transaction> {
        Transaction::new(id, Some(sender), 99, 1, vec![], Some(bn), sources)
    }

    #[test]
    fn direct_sender_is_the_receivers_own_chain_is_excluded() {
        let mk = MetaKnowledge::new();
        let tx = chained_tx(0, 2, 1, vec![]);
        let mut chains = HashSet::new();
        append_chains(10, &tx, 2, &mk, &mut chains);
        assert!(chains.is_empty());
    }

    #[test]
    fn already_known_block_is_pruned() {
        let mk = MetaKnowledge::new();
        mk.update_for_test(1, 5);
        let tx = chained_tx(0, 1, 3, vec![]);
        let mut chains = HashSet::new();
        append_chains(10, &tx, 2, &mk, &mut chains);
        assert!(chains.is_empty());
    }

    #[test]
    fn transitive_sources_are_included() {
        let mk = MetaKnowledge::new();
        let genesis_a = Transaction::new_genesis(1, 1, vec![]);
        let tx_b = chained_tx(0, 1, 1, vec![genesis_a]);
        let tx_c = chained_tx(0, 2, 1, vec![tx_b]);

        let mut chains = HashSet::new();
        append_chains(10, &tx_c, 4, &mk, &mut chains);
        assert_eq!(chains, HashSet::from([2, 1]));
    }

    #[test]
    fn cyclic_sources_do_not_overflow_the_stack() {
        // Build two transactions whose sources point at each other through
        // a shared Arc cell is impossible without interior mutability, so we
        // simulate the cycle guard directly against the inner function with
        // a pre-seeded visiting set equivalent to a self-referential walk.
        let mk = MetaKnowledge::new();
        let a = chained_tx(0, 1, 1, vec![]);
        let mut chains = HashSet::new();
        let mut visiting = HashSet::new();
        visiting.insert(a.key());
        append_chains_inner(10, &a, 2, &mk, &mut chains, &mut visiting);
        assert!(chains.is_empty());
    }

    #[test]
    fn append_chains2_tracks_highest_block_number_per_owner() {
        let mk = MetaKnowledge::new();
        let genesis_a = Transaction::new_genesis(1, 1, vec![]);
        let tx_a2 = chained_tx(1, 1, 2, vec![genesis_a]);
        let tx_b = chained_tx(0, 1, 3, vec![tx_a2]);

        let mut chains = HashMap::new();
        append_chains2(&tx_b, 2, &mk, &mut chains);
        assert_eq!(chains.get(&1), Some(&3));
    }
}
