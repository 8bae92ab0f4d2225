//! Proof construction and verification core of a scale-out distributed
//! ledger: per-node chains, cross-chain proof bundles, and recursive
//! verification of a transaction and its transitive sources against a
//! committed main-chain anchor.
//!
//! Every node maintains its own local [`chain::Chain`]; because no single
//! node observes every chain, a sender accompanies a transaction with a
//! [`proof::Proof`] — the minimal bundle of remote block updates a receiver
//! needs to verify it. [`closure`] computes that bundle, [`proof`] decodes
//! and verifies it, and [`chain`]/[`view`] provide the overlay the verifier
//! reads through.

pub mod chain;
pub mod closure;
pub mod config;
pub mod error;
pub mod main_chain;
pub mod message;
pub mod meta_knowledge;
pub mod node;
pub mod proof;
pub mod store;
pub mod transaction;
pub mod view;

pub mod prelude {
    //! Re-exports the types most call sites need. Meant to be glob imported.

    pub use crate::{
        chain::{Block, BlockRef, Chain},
        closure::{append_chains, append_chains2},
        config::Configuration,
        error::{ChainError, EnvelopeError, ProofError, VerifyError},
        main_chain::{BlockAbstract, InMemoryMainChain, MainChain},
        message::{BlockMessage, Envelope, MessageId, ProofMessage, TransactionMessage},
        meta_knowledge::MetaKnowledge,
        node::{Node, NodeId},
        proof::Proof,
        store::{InMemoryStore, LocalStore},
        transaction::{Transaction, TransactionKey},
        view::{ChainView, LightView},
    };
}
