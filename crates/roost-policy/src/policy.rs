//! Policy types
//!
//! Policies are operator-defined: a list of rules evaluated against node
//! facts, plus the installer task, image and broker used once a node is
//! bound.

use crate::{PolicyError, Result};
use chrono::Utc;
use regex::Regex;
use roost_common::{Binding, Facts};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Placeholder replaced by the node's numeric id in hostname patterns
pub const HOSTNAME_ID_PLACEHOLDER: &str = "${id}";

/// Substitute a node id into a hostname pattern
pub fn hostname(pattern: &str, node_id: u64) -> String {
    pattern.replace(HOSTNAME_ID_PLACEHOLDER, &node_id.to_string())
}

/// A provisioning policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Policy {
    /// Unique policy name
    pub name: String,

    /// Only enabled policies take part in matching
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Priority; lower numbers are evaluated first. Unique and immutable.
    pub line_number: u32,

    /// Hostname pattern, e.g. `host${id}.example.com`
    pub hostname_pattern: String,

    /// Name of the installer task that produces the install boot script
    pub installer_task: String,

    /// Image (repository) reference handed to the installer task
    #[serde(default)]
    pub image_ref: String,

    /// Broker reference, opaque to the core
    #[serde(default)]
    pub broker_ref: String,

    /// Rules; all must hold for the policy to match
    #[serde(default)]
    pub rules: Vec<MatchRule>,

    /// Maximum number of nodes this policy may be bound to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_count: Option<u32>,
}

fn default_enabled() -> bool {
    true
}

impl Policy {
    /// Create an enabled policy with no rules and a `host${id}` hostname
    pub fn new(name: impl Into<String>, line_number: u32, installer_task: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            line_number,
            hostname_pattern: format!("host{}", HOSTNAME_ID_PLACEHOLDER),
            installer_task: installer_task.into(),
            image_ref: String::new(),
            broker_ref: String::new(),
            rules: Vec::new(),
            max_count: None,
        }
    }

    pub fn with_rule(mut self, rule: MatchRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_hostname_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.hostname_pattern = pattern.into();
        self
    }

    pub fn with_image(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = image_ref.into();
        self
    }

    pub fn with_broker(mut self, broker_ref: impl Into<String>) -> Self {
        self.broker_ref = broker_ref.into();
        self
    }

    pub fn with_max_count(mut self, max_count: u32) -> Self {
        self.max_count = Some(max_count);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// True when every rule holds against the facts
    pub fn matches(&self, facts: &Facts) -> bool {
        self.rules.iter().all(|rule| rule.matches(facts))
    }

    /// Hostname for a node bound to this policy
    pub fn hostname_for(&self, node_id: u64) -> String {
        hostname(&self.hostname_pattern, node_id)
    }

    /// Build the binding record for a node
    pub fn binding_for(&self, node_id: u64) -> Binding {
        Binding {
            policy: self.name.clone(),
            hostname: self.hostname_for(node_id),
            bound_at: Utc::now(),
        }
    }

    /// Validate the policy
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(PolicyError::MissingField("name".to_string()));
        }

        if self.installer_task.trim().is_empty() {
            return Err(PolicyError::MissingField("installer_task".to_string()));
        }

        if !self.hostname_pattern.contains(HOSTNAME_ID_PLACEHOLDER) {
            return Err(PolicyError::InvalidFieldValue {
                field: "hostname_pattern".to_string(),
                message: format!("must contain {}", HOSTNAME_ID_PLACEHOLDER),
            });
        }

        if self.max_count == Some(0) {
            return Err(PolicyError::InvalidFieldValue {
                field: "max_count".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        for (i, rule) in self.rules.iter().enumerate() {
            rule.validate().map_err(|e| PolicyError::InvalidFieldValue {
                field: format!("rules[{}]", i),
                message: e.to_string(),
            })?;
        }

        Ok(())
    }
}

/// How a rule compares a fact against its expected value
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Comparator {
    /// Fact equals value
    Eq,
    /// Fact differs from value
    Neq,
    /// Fact is one of a comma-separated list
    In,
    /// Fact matches a regular expression
    Like,
    /// Numeric greater-than
    Gt,
    /// Numeric less-than
    Lt,
    /// Fact is present (value ignored)
    Exists,
    /// Fact is absent (value ignored)
    Absent,
}

impl Comparator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparator::Eq => "eq",
            Comparator::Neq => "neq",
            Comparator::In => "in",
            Comparator::Like => "like",
            Comparator::Gt => "gt",
            Comparator::Lt => "lt",
            Comparator::Exists => "exists",
            Comparator::Absent => "absent",
        }
    }
}

/// A single fact test
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchRule {
    pub fact: String,
    #[serde(rename = "op")]
    pub comparator: Comparator,
    #[serde(default)]
    pub value: String,
    /// `like` pattern, compiled on first use
    #[serde(skip)]
    pattern: CompiledPattern,
}

/// Lazily compiled regex. `None` records a pattern that failed to compile.
#[derive(Debug, Clone, Default)]
struct CompiledPattern(OnceLock<Option<Regex>>);

// Derived from `value`, so it never takes part in equality
impl PartialEq for CompiledPattern {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl MatchRule {
    pub fn new(fact: impl Into<String>, comparator: Comparator, value: impl Into<String>) -> Self {
        Self {
            fact: fact.into(),
            comparator,
            value: value.into(),
            pattern: CompiledPattern::default(),
        }
    }

    fn regex(&self) -> Option<&Regex> {
        self.pattern
            .0
            .get_or_init(|| Regex::new(&self.value).ok())
            .as_ref()
    }

    /// Evaluate against a fact snapshot. Absent facts read as the empty
    /// string, except for the presence and numeric comparators.
    pub fn matches(&self, facts: &Facts) -> bool {
        let actual = facts.get(&self.fact);
        match self.comparator {
            Comparator::Exists => actual.is_some(),
            Comparator::Absent => actual.is_none(),
            Comparator::Eq => actual.unwrap_or("") == self.value,
            Comparator::Neq => actual.unwrap_or("") != self.value,
            Comparator::In => {
                let actual = actual.unwrap_or("");
                self.value.split(',').map(str::trim).any(|v| v == actual)
            }
            Comparator::Like => match self.regex() {
                Some(re) => re.is_match(actual.unwrap_or("")),
                None => false,
            },
            Comparator::Gt | Comparator::Lt => {
                let (Some(actual), Ok(expected)) = (actual, self.value.trim().parse::<f64>()) else {
                    return false;
                };
                let Ok(actual) = actual.trim().parse::<f64>() else {
                    return false;
                };
                if self.comparator == Comparator::Gt {
                    actual > expected
                } else {
                    actual < expected
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.fact.trim().is_empty() {
            return Err(PolicyError::MissingField("fact".to_string()));
        }

        match self.comparator {
            Comparator::Like => {
                Regex::new(&self.value).map_err(|e| PolicyError::InvalidFieldValue {
                    field: "value".to_string(),
                    message: format!("invalid regular expression: {}", e),
                })?;
            }
            Comparator::Gt | Comparator::Lt => {
                self.value.trim().parse::<f64>().map_err(|_| PolicyError::InvalidFieldValue {
                    field: "value".to_string(),
                    message: format!("'{}' is not a number", self.value),
                })?;
            }
            _ => {}
        }

        Ok(())
    }
}
