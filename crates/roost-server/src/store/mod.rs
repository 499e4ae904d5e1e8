//! Node storage
//!
//! Backend-agnostic interface for node records. Every mutation is a
//! targeted, atomic operation on one node; there is no whole-record
//! overwrite, so a fact refresh can never clobber a concurrent bind.
//!
//! Binding is a single-writer compare-and-set: `bind_node` checks that the
//! node is still unbound (and that the policy has room) and writes the
//! binding under one lock. A request that loses the race gets the winner's
//! node back instead of an error.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use roost_common::{Binding, Facts, HardwareId, InstallState, MetadataValue, Node};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("node not found: {0}")]
    NotFound(u64),

    #[error("node {id} is {state}, expected {expected}")]
    InvalidState {
        id: u64,
        state: InstallState,
        expected: InstallState,
    },

    #[error("lock error: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Result of a guarded bind
#[derive(Debug, Clone, PartialEq)]
pub enum BindOutcome {
    /// This call bound the node
    Bound(Node),
    /// The node was already bound, possibly by a concurrent request
    AlreadyBound(Node),
    /// The policy has reached its `max_count`
    PolicyFull,
}

/// Backend-agnostic node storage.
///
/// All methods are async so networked backends can implement it.
#[async_trait]
pub trait Store: Send + Sync {
    // === Lookup ===

    async fn get_node(&self, id: u64) -> Result<Option<Node>>;

    async fn get_node_by_hw_id(&self, hw_id: &HardwareId) -> Result<Option<Node>>;

    /// Look up a node by hardware id, creating it on first contact.
    /// Returns the node and whether it was created by this call.
    async fn get_or_create_node(&self, hw_id: &HardwareId) -> Result<(Node, bool)>;

    async fn list_nodes(&self) -> Result<Vec<Node>>;

    /// Number of nodes currently bound to a policy
    async fn count_bound(&self, policy: &str) -> Result<usize>;

    // === Mutation ===

    /// Replace the node's facts wholesale
    async fn replace_facts(&self, id: u64, facts: Facts) -> Result<Node>;

    /// Merge metadata values into the node; `None` removes the key
    async fn update_metadata(
        &self,
        id: u64,
        updates: BTreeMap<String, Option<MetadataValue>>,
    ) -> Result<Node>;

    /// Bind an unbound node: `unbound -> installing`
    async fn bind_node(&self, id: u64, binding: Binding, max_count: Option<u32>) -> Result<BindOutcome>;

    /// Installer completion: `installing -> installed`. Idempotent for
    /// nodes that are already installed.
    async fn complete_install(&self, id: u64) -> Result<Node>;

    /// Drop the binding: any state `-> unbound`
    async fn unbind_node(&self, id: u64) -> Result<Node>;

    async fn delete_node(&self, id: u64) -> Result<bool>;
}
