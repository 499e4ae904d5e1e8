//! Server configuration
//!
//! Loaded from a YAML file. Every field has a default so a minimal file
//! only needs to say where the microkernel lives.

use anyhow::{bail, Context};
use roost_ipxe::{KernelTask, MicrokernelConfig, TaskRegistry};
use roost_policy::{Policy, PolicyRepository};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/roost/config.yaml";

/// Roost server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP server listens on
    pub listen: SocketAddr,

    /// URL nodes use to reach this server
    pub server_url: String,

    /// Discovery image settings
    pub microkernel: MicrokernelConfig,

    /// Installer tasks in addition to the built-in ones
    pub tasks: Vec<KernelTask>,

    /// Policies loaded at startup
    pub policies: Vec<Policy>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8150)),
            server_url: "http://127.0.0.1:8150".to_string(),
            microkernel: MicrokernelConfig::default(),
            tasks: Vec::new(),
            policies: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Read and parse a config file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = Self::from_yaml(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(raw).context("failed to parse YAML")?;
        config.validate()?;
        Ok(config)
    }

    /// Check settings that serde can't
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server_url.trim().is_empty() {
            bail!("server_url must not be empty");
        }
        if self.microkernel.image_base_uri.trim().is_empty() {
            bail!("microkernel.image_base_uri must not be empty");
        }
        Ok(())
    }

    /// Built-in tasks plus the configured kernel tasks
    pub fn task_registry(&self) -> anyhow::Result<TaskRegistry> {
        let mut registry = TaskRegistry::with_builtin();
        for task in &self.tasks {
            task.validate()
                .with_context(|| format!("invalid installer task '{}'", task.name))?;
            if registry.contains(&task.name) {
                bail!("installer task '{}' is defined more than once", task.name);
            }
            debug!("Registered installer task '{}'", task.name);
            registry.register(Arc::new(task.clone()));
        }
        Ok(registry)
    }

    /// Validated policy table. Every policy must name a registered task.
    pub fn policy_repository(&self, tasks: &TaskRegistry) -> anyhow::Result<PolicyRepository> {
        for policy in &self.policies {
            if !tasks.contains(&policy.installer_task) {
                bail!(
                    "policy '{}' names unknown installer task '{}'",
                    policy.name,
                    policy.installer_task
                );
            }
        }
        PolicyRepository::from_policies(self.policies.iter().cloned())
            .context("invalid policy configuration")
    }
}
