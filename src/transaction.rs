//! Transactions: value transfers with an optional sender (genesis iff absent)
//! and a set of source transactions consumed as inputs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::{message::TransactionSourceRef, node::NodeId};

/// Identity key used for duplicate-detection and closure bookkeeping.
///
/// `spec.md` §9 flags that plain `List.contains`-style equality does not
/// reliably distinguish transactions with equal ids minted in different
/// blocks. This crate resolves that Open Question by keying on
/// `(sender, blockNumber, id)`, which is exactly the triple the wire
/// `TransactionSource` reference carries and is therefore always available
/// wherever identity comparisons are needed.
pub type TransactionKey = (Option<NodeId>, Option<u64>, u64);

/// A value transfer. Genesis transactions have `sender = None`.
///
/// `source` is a set of `Arc<Transaction>` handles rather than owned clones:
/// verification memoization (`locally_verified`) must be visible through
/// every transaction that shares a source, so sources are reference-counted.
/// The list is written exactly once — either at construction time or by the
/// Pass B relinking step of [`crate::proof::Proof::decode`] — through a
/// [`OnceCell`], matching the "thereafter immutable" lifecycle `spec.md`
/// assigns to decoded proof data.
#[derive(Debug)]
pub struct Transaction {
    id: u64,
    sender: Option<NodeId>,
    receiver: NodeId,
    amount: u64,
    remainder: Vec<u8>,
    block_number: Option<u64>,
    source_refs: Vec<TransactionSourceRef>,
    source: OnceCell<Vec<Arc<Transaction>>>,
    locally_verified: AtomicBool,
}

impl Transaction {
    /// Constructs a transaction with its sources already resolved (the
    /// sender's own local view of a transaction it is about to bundle into a
    /// proof always has live source pointers; only a *receiver* reconstructing
    /// from the wire needs the two-pass relinking in `Proof::decode`).
    pub fn new(
        id: u64,
        sender: Option<NodeId>,
        receiver: NodeId,
        amount: u64,
        remainder: Vec<u8>,
        block_number: Option<u64>,
        sources: Vec<Arc<Transaction>>,
    ) -> Arc<Transaction> {
        let source = OnceCell::new();
        // A freshly constructed transaction is the sole writer; this can never fail.
        let _ = source.set(sources);
        Arc::new(Self {
            id,
            sender,
            receiver,
            amount,
            remainder,
            block_number,
            source_refs: Vec::new(),
            source,
            locally_verified: AtomicBool::new(false),
        })
    }

    /// Convenience constructor for a genesis transaction (`sender = None`,
    /// `block_number = Some(0)`, no sources).
    pub fn new_genesis(receiver: NodeId, amount: u64, remainder: Vec<u8>) -> Arc<Transaction> {
        Transaction::new(0, None, receiver, amount, remainder, Some(0), Vec::new())
    }

    pub(crate) fn from_wire_parts(
        id: u64,
        sender: Option<NodeId>,
        receiver: NodeId,
        amount: u64,
        remainder: Vec<u8>,
        block_number: Option<u64>,
        source_refs: Vec<TransactionSourceRef>,
    ) -> Self {
        Self {
            id,
            sender,
            receiver,
            amount,
            remainder,
            block_number,
            source_refs,
            source: OnceCell::new(),
            locally_verified: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn sender(&self) -> Option<NodeId> {
        self.sender
    }

    pub fn receiver(&self) -> NodeId {
        self.receiver
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn remainder(&self) -> &[u8] {
        &self.remainder
    }

    pub fn block_number(&self) -> Option<u64> {
        self.block_number
    }

    pub fn sources(&self) -> &[Arc<Transaction>] {
        self.source.get().map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn pending_source_refs(&self) -> &[TransactionSourceRef] {
        &self.source_refs
    }

    pub(crate) fn needs_relinking(&self) -> bool {
        self.source.get().is_none() && !self.source_refs.is_empty()
    }

    /// Resolves a decoded transaction's sources. Called at most once, by
    /// Pass B of `Proof::decode`.
    pub(crate) fn resolve_sources(
        &self,
        sources: Vec<Arc<Transaction>>,
    ) -> Result<(), crate::error::ProofError> {
        self.source
            .set(sources)
            .map_err(|_| crate::error::ProofError::AlreadyResolved)
    }

    /// Identity key used for duplicate detection and closure bookkeeping.
    pub fn key(&self) -> TransactionKey {
        (self.sender, self.block_number, self.id)
    }

    pub fn is_locally_verified(&self) -> bool {
        self.locally_verified.load(Ordering::Acquire)
    }

    pub(crate) fn mark_locally_verified(&self) {
        self.locally_verified.store(true, Ordering::Release);
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.sender == other.sender
            && self.receiver == other.receiver
            && self.amount == other.amount
            && self.remainder == other.remainder
            && self.block_number == other.block_number
    }
}

impl Eq for Transaction {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_has_no_sender_and_sits_at_block_zero() {
        let tx = Transaction::new_genesis(2, 100, vec![]);
        assert!(tx.sender().is_none());
        assert_eq!(tx.block_number(), Some(0));
        assert!(tx.sources().is_empty());
    }

    #[test]
    fn decoded_transaction_starts_unresolved() {
        let raw = Transaction::from_wire_parts(
            0,
            Some(1),
            2,
            50,
            vec![],
            Some(1),
            vec![TransactionSourceRef {
                owner_id: 1,
                block_number: 0,
                id: 0,
            }],
        );
        assert!(raw.sources().is_empty());
        assert!(raw.needs_relinking());
    }

    #[test]
    fn locally_verified_flag_is_shared_through_arc_clones() {
        let tx = Transaction::new_genesis(2, 1, vec![]);
        let alias = Arc::clone(&tx);
        tx.mark_locally_verified();
        assert!(alias.is_locally_verified());
    }

    #[test]
    fn resolve_sources_is_single_assignment() {
        let raw = Transaction::from_wire_parts(0, Some(1), 2, 50, vec![], Some(1), vec![]);
        assert!(raw.resolve_sources(vec![]).is_ok());
        assert!(matches!(
            raw.resolve_sources(vec![]),
            Err(crate::error::ProofError::AlreadyResolved)
        ));
    }
}
