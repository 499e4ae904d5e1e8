//! Policy repository
//!
//! Holds the operator's policies and enforces the configuration-time
//! invariants: unique names, unique line numbers, valid rules. Matching
//! reads from here but never mutates it.

use crate::{Policy, PolicyError, Result};
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct PolicyRepository {
    /// Kept sorted by line number
    policies: Vec<Policy>,
}

impl PolicyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a repository from a list, validating each policy in turn
    pub fn from_policies(policies: impl IntoIterator<Item = Policy>) -> Result<Self> {
        let mut repo = Self::new();
        for policy in policies {
            repo.insert(policy)?;
        }
        Ok(repo)
    }

    /// All policies, sorted by line number
    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    pub fn get(&self, name: &str) -> Option<&Policy> {
        self.policies.iter().find(|p| p.name == name)
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Add a new policy
    pub fn insert(&mut self, policy: Policy) -> Result<()> {
        policy.validate()?;

        if self.get(&policy.name).is_some() {
            return Err(PolicyError::DuplicateName(policy.name));
        }

        if let Some(holder) = self
            .policies
            .iter()
            .find(|p| p.line_number == policy.line_number)
        {
            return Err(PolicyError::DuplicateLineNumber {
                line_number: policy.line_number,
                holder: holder.name.clone(),
            });
        }

        info!("Added policy '{}' at line {}", policy.name, policy.line_number);
        let pos = self
            .policies
            .partition_point(|p| p.line_number < policy.line_number);
        self.policies.insert(pos, policy);
        Ok(())
    }

    /// Enable a policy, re-validating it first
    pub fn enable(&mut self, name: &str) -> Result<&Policy> {
        let policy = self.get_mut(name)?;
        policy.validate()?;
        policy.enabled = true;
        info!("Enabled policy '{}'", name);
        Ok(&*policy)
    }

    pub fn disable(&mut self, name: &str) -> Result<&Policy> {
        let policy = self.get_mut(name)?;
        policy.enabled = false;
        info!("Disabled policy '{}'", name);
        Ok(&*policy)
    }

    pub fn remove(&mut self, name: &str) -> Result<Policy> {
        let pos = self
            .policies
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| PolicyError::NotFound(name.to_string()))?;
        Ok(self.policies.remove(pos))
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut Policy> {
        self.policies
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| PolicyError::NotFound(name.to_string()))
    }
}
