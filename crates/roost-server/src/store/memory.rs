//! In-memory storage backend
//!
//! All state lives behind one RwLock so that check-then-write operations
//! (first-contact creation, binding) happen under a single write guard.

use super::{BindOutcome, Result, Store, StoreError};
use async_trait::async_trait;
use roost_common::{Binding, Facts, HardwareId, InstallState, MetadataValue, Node};
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

#[derive(Default)]
struct Inner {
    nodes: BTreeMap<u64, Node>,
    /// hardware id -> node id
    hw_index: HashMap<HardwareId, u64>,
    /// Last assigned node id; ids are never reused
    last_id: u64,
}

impl Inner {
    fn node_mut(&mut self, id: u64) -> Result<&mut Node> {
        self.nodes.get_mut(&id).ok_or(StoreError::NotFound(id))
    }

    fn count_bound(&self, policy: &str) -> usize {
        self.nodes
            .values()
            .filter(|n| n.bound_policy() == Some(policy))
            .count()
    }
}

/// In-memory node store for development and tests
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Helper to acquire write lock with error conversion
    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Lock(format!("write lock poisoned: {}", e)))
    }

    /// Helper to acquire read lock with error conversion
    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Lock(format!("read lock poisoned: {}", e)))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_node(&self, id: u64) -> Result<Option<Node>> {
        Ok(self.read()?.nodes.get(&id).cloned())
    }

    async fn get_node_by_hw_id(&self, hw_id: &HardwareId) -> Result<Option<Node>> {
        let inner = self.read()?;
        Ok(inner
            .hw_index
            .get(hw_id)
            .and_then(|id| inner.nodes.get(id))
            .cloned())
    }

    async fn get_or_create_node(&self, hw_id: &HardwareId) -> Result<(Node, bool)> {
        let mut inner = self.write()?;

        if let Some(node) = inner.hw_index.get(hw_id).and_then(|id| inner.nodes.get(id)) {
            return Ok((node.clone(), false));
        }

        inner.last_id += 1;
        let node = Node::new(inner.last_id, hw_id.clone());
        inner.hw_index.insert(hw_id.clone(), node.id);
        inner.nodes.insert(node.id, node.clone());
        info!("Registered {} for hardware {}", node.name(), hw_id);
        Ok((node, true))
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        Ok(self.read()?.nodes.values().cloned().collect())
    }

    async fn count_bound(&self, policy: &str) -> Result<usize> {
        Ok(self.read()?.count_bound(policy))
    }

    async fn replace_facts(&self, id: u64, facts: Facts) -> Result<Node> {
        let mut inner = self.write()?;
        let node = inner.node_mut(id)?;
        node.replace_facts(facts);
        debug!("Replaced facts of {} ({} facts)", node.name(), node.facts.len());
        Ok(node.clone())
    }

    async fn update_metadata(
        &self,
        id: u64,
        updates: BTreeMap<String, Option<MetadataValue>>,
    ) -> Result<Node> {
        let mut inner = self.write()?;
        let node = inner.node_mut(id)?;
        for (key, value) in updates {
            match value {
                Some(value) => {
                    node.metadata.insert(key, value);
                }
                None => {
                    node.metadata.remove(&key);
                }
            }
        }
        Ok(node.clone())
    }

    async fn bind_node(&self, id: u64, binding: Binding, max_count: Option<u32>) -> Result<BindOutcome> {
        let mut inner = self.write()?;

        let node = inner.nodes.get(&id).ok_or(StoreError::NotFound(id))?;
        if node.is_bound() {
            return Ok(BindOutcome::AlreadyBound(node.clone()));
        }

        if let Some(max) = max_count {
            if inner.count_bound(&binding.policy) >= max as usize {
                debug!("Policy '{}' is full ({} nodes)", binding.policy, max);
                return Ok(BindOutcome::PolicyFull);
            }
        }

        let node = inner.node_mut(id)?;
        node.binding = Some(binding);
        node.install_state = InstallState::Installing;
        Ok(BindOutcome::Bound(node.clone()))
    }

    async fn complete_install(&self, id: u64) -> Result<Node> {
        let mut inner = self.write()?;
        let node = inner.node_mut(id)?;
        match node.install_state {
            InstallState::Installing => {
                node.install_state = InstallState::Installed;
                Ok(node.clone())
            }
            InstallState::Installed => Ok(node.clone()),
            InstallState::Unbound => Err(StoreError::InvalidState {
                id,
                state: node.install_state,
                expected: InstallState::Installing,
            }),
        }
    }

    async fn unbind_node(&self, id: u64) -> Result<Node> {
        let mut inner = self.write()?;
        let node = inner.node_mut(id)?;
        node.unbind();
        Ok(node.clone())
    }

    async fn delete_node(&self, id: u64) -> Result<bool> {
        let mut inner = self.write()?;
        match inner.nodes.remove(&id) {
            Some(node) => {
                inner.hw_index.remove(&node.hw_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
