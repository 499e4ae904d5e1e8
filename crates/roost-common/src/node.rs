//! The Node type and its hardware-derived identity.

use crate::{Error, Facts, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Metadata key that forces a sanboot local boot
pub const METADATA_SANBOOT: &str = "sanboot";

/// Normalize MAC address to lowercase with colons.
///
/// Accepts `aa:bb:..`, `AA-BB-..` and bare `aabbccddeeff` forms.
pub fn normalize_mac(mac: &str) -> Result<String> {
    let hex: String = mac
        .trim()
        .chars()
        .filter(|c| *c != ':' && *c != '-')
        .collect::<String>()
        .to_lowercase();

    if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::InvalidMac(mac.to_string()));
    }

    let octets: Vec<&str> = (0..6).map(|i| &hex[i * 2..i * 2 + 2]).collect();
    Ok(octets.join(":"))
}

/// String truthiness shared by facts and metadata
pub fn is_truthy_str(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "on" | "1"
    )
}

// ============================================================================
// Identity
// ============================================================================

/// Stable node identity derived from its MAC addresses.
///
/// MACs are normalized, deduplicated and sorted so the same set of NICs
/// always yields the same id regardless of the order they were observed in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HardwareId(String);

impl HardwareId {
    pub fn from_macs<I, S>(macs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized = macs
            .into_iter()
            .map(|m| normalize_mac(m.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        if normalized.is_empty() {
            return Err(Error::NoMacAddress);
        }

        normalized.sort();
        normalized.dedup();
        Ok(Self(normalized.join("-")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The MAC addresses making up this id
    pub fn macs(&self) -> impl Iterator<Item = &str> {
        self.0.split('-')
    }
}

impl fmt::Display for HardwareId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// Operator-set metadata value. Stored as whatever the operator sent,
/// read back through `is_truthy`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Text(String),
}

impl MetadataValue {
    pub fn is_truthy(&self) -> bool {
        match self {
            MetadataValue::Bool(b) => *b,
            MetadataValue::Text(s) => is_truthy_str(s),
        }
    }

    /// Convert an arbitrary JSON value, rejecting anything that is not a
    /// bool, string or number.
    pub fn from_json(key: &str, value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Bool(b) => Ok(MetadataValue::Bool(*b)),
            serde_json::Value::String(s) => Ok(MetadataValue::Text(s.clone())),
            serde_json::Value::Number(n) => Ok(MetadataValue::Text(n.to_string())),
            other => Err(Error::InvalidMetadata {
                key: key.to_string(),
                message: format!("expected bool or string, got {}", other),
            }),
        }
    }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self {
        MetadataValue::Bool(b)
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::Text(s.to_string())
    }
}

// ============================================================================
// State
// ============================================================================

/// Node provisioning state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallState {
    /// No policy bound yet
    #[default]
    Unbound,
    /// Bound to a policy, installer running
    Installing,
    /// Installer reported completion
    Installed,
}

impl InstallState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallState::Unbound => "unbound",
            InstallState::Installing => "installing",
            InstallState::Installed => "installed",
        }
    }
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Association of a node to the policy it was matched to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub policy: String,
    pub hostname: String,
    pub bound_at: DateTime<Utc>,
}

// ============================================================================
// The Node
// ============================================================================

/// Display name of the node with this id
pub fn node_name(id: u64) -> String {
    format!("node{}", id)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Numeric id assigned by the store on first contact
    pub id: u64,
    pub hw_id: HardwareId,
    pub facts: Facts,
    pub metadata: BTreeMap<String, MetadataValue>,
    pub binding: Option<Binding>,
    pub install_state: InstallState,
    pub created_at: DateTime<Utc>,
    pub last_checkin: Option<DateTime<Utc>>,
}

impl Node {
    pub fn new(id: u64, hw_id: HardwareId) -> Self {
        Self {
            id,
            hw_id,
            facts: Facts::default(),
            metadata: BTreeMap::new(),
            binding: None,
            install_state: InstallState::Unbound,
            created_at: Utc::now(),
            last_checkin: None,
        }
    }

    /// Display name, `node<id>`
    pub fn name(&self) -> String {
        node_name(self.id)
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    pub fn bound_policy(&self) -> Option<&str> {
        self.binding.as_ref().map(|b| b.policy.as_str())
    }

    /// Truthiness of a metadata key; absent keys are false
    pub fn metadata_flag(&self, key: &str) -> bool {
        self.metadata.get(key).map(MetadataValue::is_truthy).unwrap_or(false)
    }

    /// Replace facts wholesale
    pub fn replace_facts(&mut self, facts: Facts) {
        self.facts = facts;
        self.last_checkin = Some(Utc::now());
    }

    /// Drop the binding so the matcher runs again on next boot
    pub fn unbind(&mut self) {
        self.binding = None;
        self.install_state = InstallState::Unbound;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_mac_forms() {
        assert_eq!(normalize_mac("00-11-22-AA-BB-CC").unwrap(), "00:11:22:aa:bb:cc");
        assert_eq!(normalize_mac("001122aabbcc").unwrap(), "00:11:22:aa:bb:cc");
        assert_eq!(normalize_mac(" 00:11:22:aa:bb:cc ").unwrap(), "00:11:22:aa:bb:cc");
        assert!(normalize_mac("00:11:22").is_err());
        assert!(normalize_mac("zz:11:22:33:44:55").is_err());
    }

    #[test]
    fn test_hardware_id_is_order_and_case_independent() {
        let a = HardwareId::from_macs(["AA:BB:CC:DD:EE:01", "00:11:22:33:44:55"]).unwrap();
        let b = HardwareId::from_macs(["00-11-22-33-44-55", "aa:bb:cc:dd:ee:01"]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "00:11:22:33:44:55-aa:bb:cc:dd:ee:01");
        assert_eq!(a.macs().count(), 2);
    }

    #[test]
    fn test_hardware_id_dedups() {
        let id = HardwareId::from_macs(["00:11:22:33:44:55", "00-11-22-33-44-55"]).unwrap();
        assert_eq!(id.as_str(), "00:11:22:33:44:55");
    }

    #[test]
    fn test_hardware_id_requires_a_mac() {
        let empty: [&str; 0] = [];
        assert_eq!(HardwareId::from_macs(empty), Err(Error::NoMacAddress));
    }

    #[test]
    fn test_metadata_truthiness() {
        assert!(MetadataValue::Bool(true).is_truthy());
        assert!(MetadataValue::from("TRUE").is_truthy());
        assert!(MetadataValue::from("yes").is_truthy());
        assert!(!MetadataValue::from("false").is_truthy());
        assert!(!MetadataValue::from("").is_truthy());
        assert!(!MetadataValue::Bool(false).is_truthy());
    }

    #[test]
    fn test_metadata_from_json() {
        let v = MetadataValue::from_json("sanboot", &serde_json::json!(true)).unwrap();
        assert_eq!(v, MetadataValue::Bool(true));
        let v = MetadataValue::from_json("rack", &serde_json::json!(4)).unwrap();
        assert_eq!(v, MetadataValue::Text("4".to_string()));
        assert!(MetadataValue::from_json("x", &serde_json::json!([1])).is_err());
    }

    #[test]
    fn test_new_node_is_unbound() {
        let node = Node::new(7, HardwareId::from_macs(["00:11:22:33:44:55"]).unwrap());
        assert_eq!(node.name(), "node7");
        assert_eq!(node_name(7), node.name());
        assert_eq!(node.install_state, InstallState::Unbound);
        assert!(!node.is_bound());
        assert!(!node.metadata_flag(METADATA_SANBOOT));
    }

    #[test]
    fn test_unbind_resets_state() {
        let mut node = Node::new(1, HardwareId::from_macs(["00:11:22:33:44:55"]).unwrap());
        node.binding = Some(Binding {
            policy: "centos".to_string(),
            hostname: "host1".to_string(),
            bound_at: Utc::now(),
        });
        node.install_state = InstallState::Installed;
        node.unbind();
        assert!(node.binding.is_none());
        assert_eq!(node.install_state, InstallState::Unbound);
    }
}
