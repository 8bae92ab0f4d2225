//! End-to-end scenarios S1-S6, literal node ids and block numbers as given.

use std::collections::HashSet;
use std::sync::Arc;

use scaleout_core::prelude::*;

fn node_with_genesis(id: NodeId) -> Arc<Node> {
    let node = Arc::new(Node::new(id));
    node.chain().update(vec![Block::genesis(id, vec![])]).unwrap();
    node
}

#[test]
fn s1_single_hop_transfer() {
    let a = node_with_genesis(1);
    let oracle = InMemoryMainChain::new();
    oracle.commit(1, 0);
    oracle.commit(1, 1);

    let store = InMemoryStore::new(2, oracle);
    store.insert_node(Arc::clone(&a));

    let mk = MetaKnowledge::new();
    let genesis_tx = Transaction::new_genesis(1, 10, vec![]);
    let tx = Transaction::new(0, Some(1), 2, 10, vec![], Some(1), vec![genesis_tx.clone()]);

    let mut chains = HashSet::new();
    append_chains(2, &tx, 2, &mk, &mut chains);
    assert_eq!(chains, HashSet::from([1]));

    let mut proof = Proof::new(Arc::clone(&tx));
    proof.add_block(1, Block::genesis(1, vec![genesis_tx]));
    proof.add_block(
        1,
        Block::new(1, 1, vec![Arc::clone(&tx)], Some(BlockRef { owner: 1, number: 0 })).unwrap(),
    );

    let encoded = proof.encode();
    let decoded = Proof::decode(encoded, &store).expect("decode should succeed");
    decoded.verify(&store).expect("verification should succeed");
    decoded
        .apply_updates(store.this_node(), &store)
        .expect("apply should succeed");

    assert_eq!(
        store.this_node().meta_knowledge().last_known_block_number(1),
        1
    );
}

#[test]
fn s2_genesis_verification() {
    let b = node_with_genesis(2);
    let oracle = InMemoryMainChain::new();
    oracle.commit(2, 0);
    let store = InMemoryStore::new(2, oracle);
    store.insert_node(Arc::clone(&b));

    let genesis_tx = Transaction::new_genesis(2, 5, vec![]);
    b.chain()
        .update(vec![Block::genesis(2, vec![Arc::clone(&genesis_tx)])])
        .unwrap();

    let mut proof = Proof::new(Arc::clone(&genesis_tx));
    proof.add_block(2, Block::genesis(2, vec![Arc::clone(&genesis_tx)]));
    proof.verify(&store).expect("genesis should verify");

    // Changing the block number to 1 must fail BadGenesis.
    let bad_tx = Transaction::new(0, None, 2, 5, vec![], Some(1), vec![]);
    let bad_proof = Proof::new(bad_tx);
    assert!(matches!(bad_proof.verify(&store), Err(VerifyError::BadGenesis)));
}

#[test]
fn s3_missing_commit_anchor() {
    let a = node_with_genesis(1);
    let oracle = InMemoryMainChain::new();
    oracle.commit(1, 0); // block 1 is never committed
    let store = InMemoryStore::new(2, oracle);
    store.insert_node(Arc::clone(&a));

    let genesis_tx = Transaction::new_genesis(1, 10, vec![]);
    let tx = Transaction::new(0, Some(1), 2, 10, vec![], Some(1), vec![genesis_tx.clone()]);
    let mut proof = Proof::new(Arc::clone(&tx));
    proof.add_block(1, Block::genesis(1, vec![genesis_tx]));
    proof.add_block(
        1,
        Block::new(1, 1, vec![Arc::clone(&tx)], Some(BlockRef { owner: 1, number: 0 })).unwrap(),
    );

    assert!(matches!(
        proof.verify(&store),
        Err(VerifyError::NoCommittedAnchor)
    ));
}

#[test]
fn s4_transitive_source_three_hops() {
    let a = node_with_genesis(1);
    let b = node_with_genesis(2);
    let c = node_with_genesis(3);

    let oracle = InMemoryMainChain::new();
    for (owner, n) in [(1, 0), (1, 1), (2, 0), (2, 1), (3, 0), (3, 1)] {
        oracle.commit(owner, n);
    }
    let store = InMemoryStore::new(4, oracle);
    store.insert_node(Arc::clone(&a));
    store.insert_node(Arc::clone(&b));
    store.insert_node(Arc::clone(&c));

    let genesis_a = Transaction::new_genesis(1, 10, vec![]);
    let tx_b = Transaction::new(0, Some(1), 2, 10, vec![], Some(1), vec![genesis_a.clone()]);
    let tx_c = Transaction::new(0, Some(2), 3, 10, vec![], Some(1), vec![tx_b.clone()]);
    let tx_d = Transaction::new(0, Some(3), 4, 10, vec![], Some(1), vec![tx_c.clone()]);

    let mk = MetaKnowledge::new();
    let mut chains = HashSet::new();
    append_chains(4, &tx_d, 4, &mk, &mut chains);
    assert_eq!(chains, HashSet::from([1, 2, 3]));

    let mut proof = Proof::new(Arc::clone(&tx_d));
    proof.add_block(1, Block::genesis(1, vec![genesis_a]));
    proof.add_block(
        1,
        Block::new(1, 1, vec![tx_b.clone()], Some(BlockRef { owner: 1, number: 0 })).unwrap(),
    );
    proof.add_block(2, Block::genesis(2, vec![]));
    proof.add_block(
        2,
        Block::new(1, 2, vec![tx_c.clone()], Some(BlockRef { owner: 2, number: 0 })).unwrap(),
    );
    proof.add_block(3, Block::genesis(3, vec![]));
    proof.add_block(
        3,
        Block::new(1, 3, vec![tx_d.clone()], Some(BlockRef { owner: 3, number: 0 })).unwrap(),
    );

    proof.verify(&store).expect("three-hop transitive proof should verify");
}

#[test]
fn s5_invalid_chain_view() {
    let a = node_with_genesis(1);
    a.chain().mark_committed(0);
    let oracle = InMemoryMainChain::new();
    oracle.commit(1, 0);
    let store = InMemoryStore::new(2, oracle);
    store.insert_node(Arc::clone(&a));

    let genesis_tx = Transaction::new_genesis(1, 10, vec![]);
    let tx = Transaction::new(0, Some(1), 2, 10, vec![], Some(1), vec![genesis_tx.clone()]);
    let mut proof = Proof::new(Arc::clone(&tx));
    // Re-proposes the already-committed block 0 instead of chaining onto it.
    proof.add_block(1, Block::genesis(1, vec![genesis_tx]));

    assert!(matches!(
        proof.verify(&store),
        Err(VerifyError::InvalidChainView)
    ));
}

#[test]
fn s6_duplicate_transaction() {
    let a = node_with_genesis(1);
    let oracle = InMemoryMainChain::new();
    oracle.commit(1, 0);
    oracle.commit(1, 1);
    oracle.commit(1, 2);
    let store = InMemoryStore::new(2, oracle);
    store.insert_node(Arc::clone(&a));

    let genesis_tx = Transaction::new_genesis(1, 10, vec![]);
    let tx = Transaction::new(0, Some(1), 2, 10, vec![], Some(1), vec![genesis_tx.clone()]);
    let mut proof = Proof::new(Arc::clone(&tx));
    proof.add_block(1, Block::genesis(1, vec![genesis_tx]));
    proof.add_block(
        1,
        Block::new(1, 1, vec![Arc::clone(&tx)], Some(BlockRef { owner: 1, number: 0 })).unwrap(),
    );
    proof.add_block(
        1,
        Block::new(2, 1, vec![Arc::clone(&tx)], Some(BlockRef { owner: 1, number: 1 })).unwrap(),
    );

    assert!(matches!(
        proof.verify(&store),
        Err(VerifyError::DuplicateTransaction)
    ));
}
