//! First-match policy matcher
//!
//! Enabled policies are stably sorted by line number and scanned in order;
//! the first policy whose rules all hold wins. There is no scoring and no
//! backtracking. Storage order is never relied on.

use crate::Policy;
use roost_common::{Binding, Facts, InstallState, Node};
use thiserror::Error;
use tracing::debug;

/// No enabled policy matched the node's facts
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("no enabled policy matches")]
pub struct NoMatch;

/// Enabled policies in evaluation order
pub fn eligible(policies: &[Policy]) -> Vec<&Policy> {
    let mut enabled: Vec<&Policy> = policies.iter().filter(|p| p.enabled).collect();
    enabled.sort_by_key(|p| p.line_number);
    enabled
}

/// Every matching policy in evaluation order.
///
/// The binder walks this list so that a policy refused at bind time (for
/// example one that has reached its `max_count`) falls through to the next.
pub fn candidates<'a>(facts: &Facts, policies: &'a [Policy]) -> Vec<&'a Policy> {
    eligible(policies)
        .into_iter()
        .filter(|p| p.matches(facts))
        .collect()
}

/// The lowest line-number enabled policy whose rules all hold
pub fn first_match<'a>(facts: &Facts, policies: &'a [Policy]) -> Result<&'a Policy, NoMatch> {
    let found = eligible(policies).into_iter().find(|p| p.matches(facts));
    match found {
        Some(policy) => {
            debug!("Facts matched policy '{}' (line {})", policy.name, policy.line_number);
            Ok(policy)
        }
        None => Err(NoMatch),
    }
}

/// Bind an exclusively-owned node to the first matching policy.
///
/// Already-bound nodes are returned untouched without evaluating any rule.
/// Callers sharing nodes across requests must go through a guarded bind
/// instead; this is the single-owner form.
pub fn match_and_bind(node: &mut Node, policies: &[Policy]) -> Result<Binding, NoMatch> {
    if let Some(binding) = &node.binding {
        return Ok(binding.clone());
    }

    let policy = first_match(&node.facts, policies)?;
    let binding = policy.binding_for(node.id);
    node.binding = Some(binding.clone());
    node.install_state = InstallState::Installing;
    Ok(binding)
}
