//! Role-based content gating.
//!
//! DESIGN
//! ======
//! A page is a forest of `ContentNode`s. A node is gated by an inline
//! allowed-roles list (`niko-role="customer, retailer"`), by a content tag
//! that the `VisibilityPolicy` maps to a rule, or both (both must allow).
//! Excluded nodes are removed with their whole subtree so nothing reaches the
//! client; hiding in place is an explicit per-rule opt-in.
//!
//! An unauthenticated viewer (`role == None`) passes no gate.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::identity::Role;

/// A unit of page content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Content tag looked up in the policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Inline comma-separated allowed roles.
    #[serde(default, rename = "niko-role", skip_serializing_if = "Option::is_none")]
    pub allowed_roles: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ContentNode>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateMethod {
    #[default]
    Remove,
    /// Keep the node but mark it hidden. Its content still reaches the client.
    Hide,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateRule {
    pub allowed: BTreeSet<Role>,
    pub method: GateMethod,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GatingReport {
    pub removed: usize,
    pub hidden: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Show,
    Apply(GateMethod),
}

/// Parse an inline role list; unknown entries grant nothing.
#[must_use]
pub fn parse_role_list(raw: &str) -> BTreeSet<Role> {
    raw.split(',').filter_map(|r| r.parse().ok()).collect()
}

/// Mapping from content tag to allowed roles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilityPolicy {
    rules: BTreeMap<String, GateRule>,
}

impl VisibilityPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The site's standard tags.
    #[must_use]
    pub fn standard() -> Self {
        Self::new()
            .with_rule("auth-required", &Role::ALL, GateMethod::Remove)
            .with_rule("retailer-only", &[Role::Retailer], GateMethod::Remove)
            .with_rule("trade-pricing", &[Role::Retailer], GateMethod::Remove)
            .with_rule("customer-only", &[Role::Customer], GateMethod::Remove)
            .with_rule("wishlist-button", &Role::ALL, GateMethod::Remove)
    }

    #[must_use]
    pub fn with_rule(mut self, tag: &str, allowed: &[Role], method: GateMethod) -> Self {
        self.rules
            .insert(tag.to_owned(), GateRule { allowed: allowed.iter().copied().collect(), method });
        self
    }

    #[must_use]
    pub fn rule(&self, tag: &str) -> Option<&GateRule> {
        self.rules.get(tag)
    }

    fn verdict(&self, node: &ContentNode, role: Option<Role>) -> Verdict {
        let permits = |allowed: &BTreeSet<Role>| role.is_some_and(|r| allowed.contains(&r));

        if let Some(raw) = node.allowed_roles.as_deref() {
            if !permits(&parse_role_list(raw)) {
                return Verdict::Apply(GateMethod::Remove);
            }
        }
        if let Some(rule) = node.tag.as_deref().and_then(|t| self.rules.get(t)) {
            if !permits(&rule.allowed) {
                return Verdict::Apply(rule.method);
            }
        }
        Verdict::Show
    }

    /// Gate `nodes` in place for `role`.
    pub fn apply(&self, nodes: &mut Vec<ContentNode>, role: Option<Role>) -> GatingReport {
        let mut report = GatingReport::default();
        self.apply_inner(nodes, role, &mut report);
        tracing::debug!(role = ?role, removed = report.removed, hidden = report.hidden, "content gated");
        report
    }

    fn apply_inner(&self, nodes: &mut Vec<ContentNode>, role: Option<Role>, report: &mut GatingReport) {
        nodes.retain_mut(|node| match self.verdict(node, role) {
            Verdict::Apply(GateMethod::Remove) => {
                report.removed += 1;
                false
            }
            Verdict::Apply(GateMethod::Hide) => {
                node.hidden = true;
                report.hidden += 1;
                true
            }
            Verdict::Show => {
                self.apply_inner(&mut node.children, role, report);
                true
            }
        });
    }
}

#[cfg(test)]
#[path = "gating_test.rs"]
mod tests;
