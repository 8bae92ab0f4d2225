//! Error taxonomy for chain splicing, proof decoding, and proof verification.

use crate::node::NodeId;

/// Rejection reasons for [`crate::chain::Chain::update`].
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// The proposed update list does not splice cleanly onto the chain's
    /// committed suffix (see [`crate::view::ChainView`] validity rules).
    #[error("update list does not splice onto the chain's committed suffix")]
    InvalidUpdate,
}

/// Failures specific to [`crate::proof::Proof::decode`]'s two relinking passes.
#[derive(Debug, thiserror::Error)]
pub enum ProofError {
    /// Pass A could not find the predecessor a non-genesis first block requires.
    #[error("missing predecessor block (owner={owner}, number={number}) required to relink proof")]
    MissingPredecessor { owner: NodeId, number: u64 },

    /// Pass B could not resolve a `TransactionSource` reference to a transaction.
    #[error("could not resolve transaction source (owner={owner_id}, block={block_number}, id={id})")]
    MissingSource {
        owner_id: NodeId,
        block_number: u64,
        id: u64,
    },

    /// The proven transaction named by the envelope was not present where looked up.
    #[error("proven transaction not present in its chain view")]
    MissingProvenTransaction,

    /// The proven transaction has no sealed block number, which decode requires
    /// to locate it.
    #[error("proof decode requires a sealed block number on the proven transaction")]
    MissingBlockNumber,

    /// A transaction's sources were already resolved; relinking is single-assignment.
    #[error("transaction source list was already resolved")]
    AlreadyResolved,

    /// Resolving a node through the local store/tracker failed.
    #[error("failed to resolve a node via the local store")]
    DecodeIO(#[from] std::io::Error),
}

/// Error taxonomy raised by [`crate::proof::Proof::verify`] and its helpers.
///
/// Every variant here is fatal for the proof it was raised against; none are
/// retried against the same payload (see `spec.md` §7). `locallyVerified` only
/// memoizes success, so a failure never poisons a transaction for a later,
/// different proof.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// The sender's (or receiver's, for genesis) `ChainView` failed its validity rules.
    #[error("chain view failed validity checks")]
    InvalidChainView,

    /// The proven transaction was not found anywhere in its sender's chain view.
    #[error("transaction was not found in its sender's chain view")]
    TransactionNotFound,

    /// The same transaction appears in more than one block of the sender's chain view.
    #[error("transaction appears in more than one block of its sender's chain")]
    DuplicateTransaction,

    /// No block at or after the transaction's sealed height is committed to the
    /// main chain.
    #[error("no block at or after the transaction's height is committed to the main chain")]
    NoCommittedAnchor,

    /// The transaction has no sealed block number.
    #[error("transaction is missing its sealed block number")]
    MissingBlockNumber,

    /// A genesis transaction was not sealed at block number 0.
    #[error("genesis transaction must be sealed at block number 0")]
    BadGenesis,

    /// The receiver's chain view has no block 0.
    #[error("receiver's chain view has no genesis block")]
    MissingGenesisBlock,

    /// The genesis block is not committed to the main chain.
    #[error("genesis block is not committed to the main chain")]
    GenesisNotCommitted,

    /// A cycle was detected in the transitive source graph.
    #[error("cyclic transaction source graph detected")]
    CyclicSource,

    /// Verification of a transitive source transaction failed.
    #[error("source transaction verification failed")]
    SourceInvalid(#[source] Box<VerifyError>),

    /// Resolving a node through the local store/tracker failed.
    #[error("failed to resolve a node via the local store")]
    DecodeIO(#[from] std::io::Error),

    /// Applying a chain update during `apply_updates` was rejected.
    #[error("chain update rejected")]
    ChainUpdate(#[from] ChainError),
}

/// Errors surfaced by [`crate::message::Envelope::handle`], covering the whole
/// decode → verify → apply pipeline for an inbound message.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("failed to decode proof: {0}")]
    Decode(#[from] ProofError),
    #[error("proof rejected: {0}")]
    Verify(#[from] VerifyError),
}
