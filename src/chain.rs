//! Append-only per-node chains of blocks.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};

use crate::{error::ChainError, node::NodeId, transaction::Transaction};

/// A lightweight `(owner, number)` key standing in for a live back-pointer.
///
/// `spec.md` §9 explicitly allows cross-chain references to resolve through
/// `localStore.getNode(id).chain[bn]` "even if an in-memory pointer is cached
/// after relink" — this crate takes the simpler side of that allowance and
/// never caches a live pointer at all. A `BlockRef` carries everything the
/// Block invariants need to check (`previousBlock.number + 1 == number`,
/// `previousBlock.owner == owner`) directly in its fields, with no
/// indirection and no `Rc`/`Arc` cycle between a block and its predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRef {
    pub owner: NodeId,
    pub number: u64,
}

/// A numbered container of transactions belonging to one node's chain.
///
/// Equality is over `(number, owner, previous_block, transactions)`;
/// `Hash` only over `(number, owner)`, matching `spec.md` §3's explicit
/// choice to keep hashing cheap while back-pointers are being relinked.
#[derive(Debug, Clone)]
pub struct Block {
    number: u64,
    owner: NodeId,
    transactions: Vec<Arc<Transaction>>,
    previous_block: Option<BlockRef>,
}

impl Block {
    /// Builds a block, checking the back-pointer invariants from `spec.md` §3.
    pub fn new(
        number: u64,
        owner: NodeId,
        transactions: Vec<Arc<Transaction>>,
        previous_block: Option<BlockRef>,
    ) -> Result<Self, ChainError> {
        if let Some(prev) = previous_block {
            if prev.number + 1 != number || prev.owner != owner {
                return Err(ChainError::InvalidUpdate);
            }
        }
        Ok(Self {
            number,
            owner,
            transactions,
            previous_block,
        })
    }

    pub fn genesis(owner: NodeId, transactions: Vec<Arc<Transaction>>) -> Self {
        Self {
            number: 0,
            owner,
            transactions,
            previous_block: None,
        }
    }

    /// Builds a block fresh off the wire, before Pass A of decode has had a
    /// chance to relink its back-pointer. Skips invariant checking since a
    /// freshly decoded non-genesis block legitimately has `previous_block =
    /// None` until relinked.
    pub(crate) fn from_raw(number: u64, owner: NodeId, transactions: Vec<Arc<Transaction>>) -> Self {
        Self {
            number,
            owner,
            transactions,
            previous_block: None,
        }
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn owner(&self) -> NodeId {
        self.owner
    }

    pub fn transactions(&self) -> &[Arc<Transaction>] {
        &self.transactions
    }

    pub fn previous_block(&self) -> Option<BlockRef> {
        self.previous_block
    }

    pub(crate) fn set_previous_block(&mut self, previous: Option<BlockRef>) {
        self.previous_block = previous;
    }

    pub fn transaction(&self, id: u64) -> Option<Arc<Transaction>> {
        self.transactions.iter().find(|tx| tx.id() == id).cloned()
    }

    pub fn contains_transaction(&self, key: crate::transaction::TransactionKey) -> bool {
        self.transactions.iter().any(|tx| tx.key() == key)
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.number == other.number
            && self.owner == other.owner
            && self.previous_block == other.previous_block
            && self.transactions.len() == other.transactions.len()
            && self
                .transactions
                .iter()
                .zip(other.transactions.iter())
                .all(|(a, b)| Arc::ptr_eq(a, b) || a == b)
    }
}

impl Eq for Block {}

impl std::hash::Hash for Block {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.number.hash(state);
        self.owner.hash(state);
    }
}

/// An append-only, numbered sequence of [`Block`]s belonging to one node.
///
/// `Chain::update` is the sole writer (`spec.md` §5): the write lock is held
/// for the whole validate-then-splice critical section so a reader never
/// observes a partially applied update.
#[derive(Debug)]
pub struct Chain {
    owner: NodeId,
    blocks: RwLock<Vec<Block>>,
    /// -1 means nothing is committed yet.
    committed_height: AtomicI64,
}

impl Chain {
    pub fn new(owner: NodeId) -> Self {
        Self {
            owner,
            blocks: RwLock::new(Vec::new()),
            committed_height: AtomicI64::new(-1),
        }
    }

    pub fn owner(&self) -> NodeId {
        self.owner
    }

    /// -1 if the chain is empty.
    pub fn height(&self) -> i64 {
        self.blocks.read().unwrap().len() as i64 - 1
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.read().unwrap().is_empty()
    }

    pub fn last_committed_number(&self) -> i64 {
        self.committed_height.load(Ordering::Acquire)
    }

    /// True if the chain has no blocks yet or no block has been committed,
    /// meaning it may be replaced wholesale starting from genesis.
    pub fn is_fully_replaceable(&self) -> bool {
        self.is_empty() || self.last_committed_number() < 0
    }

    pub fn get_block(&self, number: u64) -> Option<Block> {
        self.blocks.read().unwrap().get(number as usize).cloned()
    }

    /// Marks every block up to and including `number` as committed. Called by
    /// whatever code outside this crate learns of a new main-chain anchor
    /// (the oracle itself is an external collaborator per `spec.md` §4.6).
    pub fn mark_committed(&self, number: u64) {
        self.committed_height
            .fetch_max(number as i64, Ordering::AcqRel);
    }

    /// Validates and splices `updates` onto the chain's tail, truncating any
    /// uncommitted blocks the update overwrites. The whole validate-then-swap
    /// sequence happens under one write-lock guard, satisfying the "swap in
    /// the new tail under lock" atomicity `spec.md` §5 requires.
    pub fn update(&self, updates: Vec<Block>) -> Result<(), ChainError> {
        if updates.is_empty() {
            return Ok(());
        }
        let mut guard = self.blocks.write().unwrap();
        let base_height = guard.len() as i64 - 1;
        let last_committed = self.committed_height.load(Ordering::Acquire);
        if !crate::view::validity_rules(base_height, last_committed, guard.is_empty(), &updates) {
            return Err(ChainError::InvalidUpdate);
        }
        let first_number = updates[0].number() as usize;
        guard.truncate(first_number);
        guard.extend(updates);
        Ok(())
    }
}
