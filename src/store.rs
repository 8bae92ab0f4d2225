//! The node/tracker lookup interface: an external collaborator (`spec.md`
//! §6) the core consumes to resolve ids into nodes, and to reach this
//! process's own main-chain oracle handle.

use std::sync::Arc;

use dashmap::DashMap;

use crate::{main_chain::MainChain, node::{Node, NodeId}};

/// `local_store.get_node(id)` returns the [`Node`] for an id, contacting a
/// tracker if unknown; this call may block and fail with I/O errors, which
/// propagate out of `Proof::decode` as [`crate::error::ProofError::DecodeIO`].
///
/// `this_node` identifies which node is running the receiving process, so
/// [`crate::message::Envelope::handle`] knows whose meta-knowledge to update
/// after a successful apply. `main_chain` aggregates access to the oracle
/// alongside node lookup since both are external collaborators reached
/// through the same local environment handle.
pub trait LocalStore: Send + Sync {
    fn this_node(&self) -> &Arc<Node>;
    fn get_node(&self, id: NodeId) -> std::io::Result<Arc<Node>>;
    fn main_chain(&self) -> &dyn MainChain;
}

/// An in-memory `LocalStore`, used by tests and as a minimal standalone
/// single-process simulation. Unknown ids are rejected rather than
/// fetched from a tracker, since there is no tracker in this crate's scope.
pub struct InMemoryStore<M: MainChain> {
    this_node: Arc<Node>,
    nodes: DashMap<NodeId, Arc<Node>>,
    main_chain: M,
}

impl<M: MainChain> InMemoryStore<M> {
    pub fn new(this_node_id: NodeId, main_chain: M) -> Self {
        let this_node = Arc::new(Node::new(this_node_id));
        let nodes = DashMap::new();
        nodes.insert(this_node_id, Arc::clone(&this_node));
        Self {
            this_node,
            nodes,
            main_chain,
        }
    }

    /// Registers a peer node so `get_node` can resolve it.
    pub fn insert_node(&self, node: Arc<Node>) {
        self.nodes.insert(node.id(), node);
    }
}

impl<M: MainChain> LocalStore for InMemoryStore<M> {
    fn this_node(&self) -> &Arc<Node> {
        &self.this_node
    }

    fn get_node(&self, id: NodeId) -> std::io::Result<Arc<Node>> {
        self.nodes.get(&id).map(|n| Arc::clone(&n)).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no locally known node with id {id}"),
            )
        })
    }

    fn main_chain(&self) -> &dyn MainChain {
        &self.main_chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::main_chain::InMemoryMainChain;

    #[test]
    fn unknown_node_is_an_io_error() {
        let store = InMemoryStore::new(1, InMemoryMainChain::new());
        assert!(store.get_node(42).is_err());
    }

    #[test]
    fn registered_nodes_resolve() {
        let store = InMemoryStore::new(1, InMemoryMainChain::new());
        store.insert_node(Arc::new(Node::new(2)));
        assert_eq!(store.get_node(2).unwrap().id(), 2);
    }
}
