//! Boot decision engine
//!
//! This module answers the two questions a polling node asks:
//! - which boot script to run right now (`boot`)
//! - what to do after reporting facts from the microkernel (`checkin`)
//!
//! The node's install state drives the decision. Unbound nodes are matched
//! against the policy table and bound, bound nodes get their installer, and
//! installed nodes boot from local disk (through `sanboot` where the
//! firmware needs it).

use crate::store::{BindOutcome, Store, StoreError};
use roost_common::{
    node_name, Facts, HardwareId, InstallState, MetadataValue, Node, FACT_IS_VIRTUAL,
    FACT_VIRTUAL, METADATA_SANBOOT,
};
use roost_ipxe::{
    local_boot_script, microkernel_script, sanboot_script, BootScript, InstallContext, IpxeError,
    MicrokernelConfig, TaskRegistry,
};
use roost_policy::{matcher, Policy, PolicyError, PolicyRepository};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Virtualization platforms whose guests can't fall through to the local
/// disk with a plain `exit` and need an explicit `sanboot`.
pub const SANBOOT_HYPERVISORS: [&str; 9] = [
    "parallels",
    "vmware",
    "virtualbox",
    "xenhvm",
    "xen0",
    "xenu",
    "rhev",
    "ovirt",
    "hyperv",
];

/// Errors from the boot service
#[derive(Debug, Error)]
pub enum BootError {
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] roost_common::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("script error: {0}")]
    Script(#[from] IpxeError),

    #[error("unknown installer task: {0}")]
    UnknownTask(String),
}

pub type Result<T> = std::result::Result<T, BootError>;

/// What kind of script a node should get
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptRequest {
    /// Discovery image; the node checks in and polls
    Microkernel,
    /// Installer for the bound policy
    Install { policy: Policy, task: String },
    /// Boot the installed OS from disk
    LocalBoot { sanboot: bool },
}

/// Response to a microkernel check-in
#[derive(Debug, Clone, Serialize)]
pub struct CheckInResponse {
    pub node: Node,
    /// Instructions for the microkernel
    pub action: CheckinAction,
}

/// What the microkernel should do after check-in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckinAction {
    /// The node is bound; reboot into the installer
    Reboot,
    /// Keep polling
    None,
}

/// Whether an installed node must boot its disk via `sanboot`.
///
/// The `sanboot` metadata flag wins; otherwise the node must report itself
/// virtual on one of the [`SANBOOT_HYPERVISORS`]. Unknown or missing
/// values count as physical.
pub fn needs_sanboot(node: &Node) -> bool {
    if node.metadata_flag(METADATA_SANBOOT) {
        return true;
    }

    if !node.facts.is_true(FACT_IS_VIRTUAL) {
        return false;
    }

    let platform = node.facts.get_or_empty(FACT_VIRTUAL).trim().to_ascii_lowercase();
    SANBOOT_HYPERVISORS.contains(&platform.as_str())
}

/// Boot service
///
/// Coordinates node lookup, policy binding and script rendering.
pub struct BootService {
    store: Arc<dyn Store>,
    policies: RwLock<PolicyRepository>,
    tasks: TaskRegistry,
    microkernel: MicrokernelConfig,
    server_url: String,
}

impl BootService {
    pub fn new(
        store: Arc<dyn Store>,
        policies: PolicyRepository,
        tasks: TaskRegistry,
        microkernel: MicrokernelConfig,
        server_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            policies: RwLock::new(policies),
            tasks,
            microkernel,
            server_url: server_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Get access to the store
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    // === Boot ===

    /// Boot script for the machine owning these MAC addresses
    pub async fn boot<I, S>(&self, macs: I) -> Result<BootScript>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let hw_id = HardwareId::from_macs(macs)?;
        debug!("Boot request for hardware {}", hw_id);

        let (node, created) = self.store.get_or_create_node(&hw_id).await?;
        if created {
            info!("New node {} for hardware {}", node.name(), hw_id);
        }

        let (node, request) = self.decide_boot(node).await?;
        debug!("{} ({}) gets {:?}", node.name(), node.install_state, request);
        self.render(&node, &request).await
    }

    /// Decide what a node boots into, binding it first if it is unbound.
    ///
    /// Returns the node as it stands after any binding.
    pub async fn decide_boot(&self, node: Node) -> Result<(Node, ScriptRequest)> {
        match node.install_state {
            InstallState::Unbound => match self.match_and_bind(&node).await? {
                Some(bound) => {
                    let request = self.install_request(&bound).await;
                    Ok((bound, request))
                }
                None => Ok((node, ScriptRequest::Microkernel)),
            },
            InstallState::Installing => {
                let request = self.install_request(&node).await;
                Ok((node, request))
            }
            InstallState::Installed => {
                let sanboot = needs_sanboot(&node);
                Ok((node, ScriptRequest::LocalBoot { sanboot }))
            }
        }
    }

    /// Bind an unbound node to the first matching policy that has room.
    ///
    /// Already-bound nodes are returned as they are. `None` means no
    /// enabled policy matched.
    pub async fn match_and_bind(&self, node: &Node) -> Result<Option<Node>> {
        if node.is_bound() {
            return Ok(Some(node.clone()));
        }

        // Snapshot the candidates so the policy lock isn't held across store calls
        let candidates: Vec<Policy> = {
            let repo = self.policies.read().await;
            matcher::candidates(&node.facts, repo.policies())
                .into_iter()
                .cloned()
                .collect()
        };

        for policy in candidates {
            let binding = policy.binding_for(node.id);
            match self.store.bind_node(node.id, binding, policy.max_count).await? {
                BindOutcome::Bound(bound) => {
                    info!(
                        "Bound {} to policy '{}' as {}",
                        bound.name(),
                        policy.name,
                        policy.hostname_for(bound.id)
                    );
                    return Ok(Some(bound));
                }
                BindOutcome::AlreadyBound(existing) => {
                    debug!(
                        "{} was bound concurrently to '{}'",
                        existing.name(),
                        existing.bound_policy().unwrap_or_default()
                    );
                    return Ok(Some(existing));
                }
                BindOutcome::PolicyFull => {
                    debug!("Policy '{}' is full, trying next match", policy.name);
                }
            }
        }

        debug!("{}: {}", node.name(), matcher::NoMatch);
        Ok(None)
    }

    async fn install_request(&self, node: &Node) -> ScriptRequest {
        let Some(policy_name) = node.bound_policy() else {
            warn!("{} is {} without a binding", node.name(), node.install_state);
            return ScriptRequest::Microkernel;
        };

        let policy = self.policies.read().await.get(policy_name).cloned();
        let Some(policy) = policy else {
            warn!(
                "{} is bound to missing policy '{}', serving microkernel",
                node.name(),
                policy_name
            );
            return ScriptRequest::Microkernel;
        };

        if !self.tasks.contains(&policy.installer_task) {
            warn!(
                "Policy '{}' names unknown installer task '{}', serving microkernel",
                policy.name, policy.installer_task
            );
            return ScriptRequest::Microkernel;
        }

        let task = policy.installer_task.clone();
        ScriptRequest::Install { policy, task }
    }

    /// Render a script request for a node
    pub async fn render(&self, node: &Node, request: &ScriptRequest) -> Result<BootScript> {
        match request {
            ScriptRequest::Microkernel => Ok(microkernel_script(&self.microkernel)?),
            ScriptRequest::Install { policy, task } => {
                let ctx = self.install_context(node, policy);
                match self.tasks.render(task, &ctx) {
                    Ok(script) => Ok(script),
                    Err(e) => {
                        error!(
                            "Installer task '{}' failed for {}: {}, serving microkernel",
                            task,
                            node.name(),
                            e
                        );
                        Ok(microkernel_script(&self.microkernel)?)
                    }
                }
            }
            ScriptRequest::LocalBoot { sanboot } => {
                let hostname = node.binding.as_ref().map(|b| b.hostname.as_str());
                if *sanboot {
                    Ok(sanboot_script(hostname))
                } else {
                    Ok(local_boot_script(hostname))
                }
            }
        }
    }

    fn install_context(&self, node: &Node, policy: &Policy) -> InstallContext {
        let hostname = node
            .binding
            .as_ref()
            .map(|b| b.hostname.clone())
            .unwrap_or_else(|| policy.hostname_for(node.id));

        InstallContext {
            node_id: node.id,
            node_name: node.name(),
            hostname,
            policy: policy.name.clone(),
            image_ref: policy.image_ref.clone(),
            broker_ref: policy.broker_ref.clone(),
            server_url: self.server_url.clone(),
            retry_interval: self.microkernel.checkin_interval,
        }
    }

    // === Microkernel & installer callbacks ===

    /// Handle a microkernel check-in: replace facts, then try to bind
    pub async fn checkin<I, S>(&self, macs: I, facts: Facts) -> Result<CheckInResponse>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let hw_id = HardwareId::from_macs(macs)?;
        let (node, created) = self.store.get_or_create_node(&hw_id).await?;
        if created {
            info!("New node {} registered by check-in", node.name());
        }

        let node = self.store.replace_facts(node.id, facts).await?;
        debug!("Check-in from {} with {} facts", node.name(), node.facts.len());

        let node = match self.match_and_bind(&node).await? {
            Some(bound) => bound,
            None => node,
        };

        // Only reboot when the next boot would actually reach an installer;
        // a node whose policy or task has gone keeps polling
        let action = match node.install_state {
            InstallState::Installing => match self.install_request(&node).await {
                ScriptRequest::Install { .. } => CheckinAction::Reboot,
                _ => CheckinAction::None,
            },
            _ => CheckinAction::None,
        };

        Ok(CheckInResponse { node, action })
    }

    /// Installer completion signal
    pub async fn stage_done(&self, id: u64) -> Result<Node> {
        let node = self.store.complete_install(id).await?;
        info!("{} finished installing", node.name());
        Ok(node)
    }

    // === Node administration ===

    pub async fn nodes(&self) -> Result<Vec<Node>> {
        Ok(self.store.list_nodes().await?)
    }

    pub async fn node(&self, id: u64) -> Result<Option<Node>> {
        Ok(self.store.get_node(id).await?)
    }

    /// Drop the binding so the node is matched again on its next boot
    pub async fn reinstall(&self, id: u64) -> Result<Node> {
        let node = self.store.unbind_node(id).await?;
        info!("{} marked for reinstall", node.name());
        Ok(node)
    }

    /// Merge JSON metadata into a node. `null` removes a key.
    pub async fn update_metadata(
        &self,
        id: u64,
        updates: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Node> {
        let mut converted = BTreeMap::new();
        for (key, value) in updates {
            let value = match value {
                serde_json::Value::Null => None,
                other => Some(MetadataValue::from_json(&key, &other)?),
            };
            converted.insert(key, value);
        }
        Ok(self.store.update_metadata(id, converted).await?)
    }

    pub async fn delete_node(&self, id: u64) -> Result<bool> {
        let deleted = self.store.delete_node(id).await?;
        if deleted {
            info!("Deleted {}", node_name(id));
        }
        Ok(deleted)
    }

    // === Policy administration ===

    /// Policies in evaluation order
    pub async fn policies(&self) -> Vec<Policy> {
        self.policies.read().await.policies().to_vec()
    }

    pub async fn policy(&self, name: &str) -> Option<Policy> {
        self.policies.read().await.get(name).cloned()
    }

    /// Number of nodes bound to a policy
    pub async fn bound_count(&self, name: &str) -> Result<usize> {
        Ok(self.store.count_bound(name).await?)
    }

    pub async fn create_policy(&self, policy: Policy) -> Result<Policy> {
        if !self.tasks.contains(&policy.installer_task) {
            return Err(BootError::UnknownTask(policy.installer_task));
        }

        self.policies.write().await.insert(policy.clone())?;
        Ok(policy)
    }

    pub async fn enable_policy(&self, name: &str) -> Result<Policy> {
        Ok(self.policies.write().await.enable(name)?.clone())
    }

    pub async fn disable_policy(&self, name: &str) -> Result<Policy> {
        Ok(self.policies.write().await.disable(name)?.clone())
    }

    /// Remove a policy. Nodes already bound to it keep their binding.
    pub async fn remove_policy(&self, name: &str) -> Result<Policy> {
        let policy = self.policies.write().await.remove(name)?;
        info!("Removed policy '{}'", name);
        Ok(policy)
    }
}
