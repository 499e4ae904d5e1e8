//! Roost provisioning policies
//!
//! A policy pairs a set of fact match rules with the installer task, image
//! and broker a matching node should be provisioned with. Policies are kept
//! in a [`PolicyRepository`] that enforces unique names and unique line
//! numbers; the [`matcher`] walks enabled policies in line-number order and
//! picks the first one whose rules all hold.
//!
//! # Example
//!
//! ```
//! use roost_common::Facts;
//! use roost_policy::{Comparator, MatchRule, Policy, PolicyRepository, matcher};
//!
//! let mut repo = PolicyRepository::new();
//! repo.insert(
//!     Policy::new("vmware-vms", 10, "centos")
//!         .with_rule(MatchRule::new("virtual", Comparator::Eq, "vmware")),
//! ).unwrap();
//! repo.insert(Policy::new("everything-else", 20, "ubuntu")).unwrap();
//!
//! let facts = Facts::new().with("virtual", "vmware");
//! let policy = matcher::first_match(&facts, repo.policies()).unwrap();
//! assert_eq!(policy.name, "vmware-vms");
//! ```

pub mod error;
pub mod matcher;
pub mod policy;
pub mod repository;

pub use error::*;
pub use matcher::NoMatch;
pub use policy::*;
pub use repository::PolicyRepository;
