//! Wire envelope and message payloads exchanged between nodes.
//!
//! Transport itself (sockets, framing) is out of scope; this module only
//! defines what travels inside a frame and how a receiver dispatches on it.

use std::collections::BTreeMap;
use std::sync::Arc;

use parity_scale_codec::{Decode, Encode};

use crate::{
    chain::Block,
    error::EnvelopeError,
    node::NodeId,
    proof::Proof,
    store::LocalStore,
    transaction::Transaction,
};

/// Lightweight `(ownerId, blockNumber, id)` reference to a transaction,
/// used on the wire instead of nesting transactions (which would reintroduce
/// cycles through shared sources).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct TransactionSourceRef {
    pub owner_id: NodeId,
    pub block_number: u64,
    pub id: u64,
}

/// Wire representation of a [`Transaction`].
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct TransactionMessage {
    pub sender_id: Option<NodeId>,
    pub block_number: Option<u64>,
    pub number: u64,
    pub receiver_id: NodeId,
    pub amount: u64,
    pub remainder: Vec<u8>,
    pub source: Vec<TransactionSourceRef>,
}

/// Wire representation of a [`Block`].
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct BlockMessage {
    pub number: u64,
    pub owner_id: NodeId,
    pub transactions: Vec<TransactionMessage>,
}

/// Wire representation of a [`Proof`].
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct ProofMessage {
    pub transaction: TransactionMessage,
    pub chain_updates: BTreeMap<NodeId, Vec<BlockMessage>>,
}

/// Known message ids. Only `TransactionPattern` is attested by name in the
/// source this spec was distilled from; the others are assigned sequentially
/// and are pure wire-numbering with no behavioural consequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
#[repr(u8)]
pub enum MessageId {
    Transaction = 1,
    Proof = 2,
    Block = 3,
    TransactionPattern = 6,
}

/// Every inbound frame carries a `messageId` and a `handle` capability; the
/// receiver dispatches by id. Only the `Proof` variant drives the
/// decode → verify → apply pipeline this crate implements; the others are
/// modelled for completeness of the envelope but carry no processing logic
/// here (transaction-pattern simulation and bare transaction gossip are out
/// of scope per `spec.md` §1).
#[derive(Debug, Clone)]
pub enum Envelope {
    Transaction(TransactionMessage),
    Proof(ProofMessage),
    Block(BlockMessage),
    TransactionPattern(Vec<u8>),
}

impl Envelope {
    pub fn message_id(&self) -> MessageId {
        match self {
            Envelope::Transaction(_) => MessageId::Transaction,
            Envelope::Proof(_) => MessageId::Proof,
            Envelope::Block(_) => MessageId::Block,
            Envelope::TransactionPattern(_) => MessageId::TransactionPattern,
        }
    }

    /// Dispatches the envelope against `local_store`. For a `Proof` message
    /// this runs the full decode → verify → apply pipeline; failures are
    /// logged and returned to the caller, which discards the transaction
    /// rather than retrying it against the same payload (`spec.md` §7).
    pub fn handle(&self, local_store: &dyn LocalStore) -> Result<(), EnvelopeError> {
        match self {
            Envelope::Proof(msg) => {
                let proof = Proof::decode(msg.clone(), local_store)?;
                if let Err(err) = proof.verify(local_store) {
                    tracing::warn!(error = %err, "rejecting proof: verification failed");
                    return Err(err.into());
                }
                if let Err(err) = proof.apply_updates(local_store.this_node(), local_store) {
                    tracing::warn!(error = %err, "rejecting proof: apply failed");
                    return Err(err.into());
                }
                Ok(())
            }
            Envelope::Transaction(_) | Envelope::Block(_) | Envelope::TransactionPattern(_) => {
                tracing::debug!("ignoring envelope outside the proof pipeline");
                Ok(())
            }
        }
    }
}

impl Transaction {
    /// Builds an unresolved transaction straight from its wire form. `source`
    /// is left empty until Pass B of decode resolves `source_refs`.
    pub fn from_message(msg: TransactionMessage) -> Self {
        Transaction::from_wire_parts(
            msg.number,
            msg.sender_id,
            msg.receiver_id,
            msg.amount,
            msg.remainder,
            msg.block_number,
            msg.source,
        )
    }
}

pub(crate) fn block_to_message(block: &Block) -> BlockMessage {
    BlockMessage {
        number: block.number(),
        owner_id: block.owner(),
        transactions: block
            .transactions()
            .iter()
            .map(|tx| transaction_to_message(tx))
            .collect(),
    }
}

pub(crate) fn transaction_to_message(tx: &Arc<Transaction>) -> TransactionMessage {
    TransactionMessage {
        sender_id: tx.sender(),
        block_number: tx.block_number(),
        number: tx.id(),
        receiver_id: tx.receiver(),
        amount: tx.amount(),
        remainder: tx.remainder().to_vec(),
        source: tx
            .sources()
            .iter()
            .map(|s| TransactionSourceRef {
                owner_id: s.sender().unwrap_or_else(|| s.receiver()),
                block_number: s.block_number().unwrap_or(0),
                id: s.id(),
            })
            .collect(),
    }
}
