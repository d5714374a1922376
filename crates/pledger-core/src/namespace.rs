//! # Namespaces
//!
//! Dry-run sandboxes are keyed by the id of the policy being dry-run. Every
//! ledger send and every namespaced store query names its namespace
//! explicitly, so sandbox data cannot leak into production reads.

use serde::{Deserialize, Serialize};

use crate::identity::PolicyId;

/// Isolation scope for ledger messages and namespaced store rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "policyId", rename_all = "snake_case")]
pub enum Namespace {
    /// Real ledger, real documents.
    Production,
    /// Sandbox owned by one dry-running policy.
    DryRun(PolicyId),
}

impl Namespace {
    /// Namespace for a policy instance, sandboxed when `dry_run` is set.
    pub fn for_policy(policy_id: PolicyId, dry_run: bool) -> Self {
        if dry_run {
            Self::DryRun(policy_id)
        } else {
            Self::Production
        }
    }

    /// True for sandbox namespaces.
    pub fn is_dry_run(&self) -> bool {
        matches!(self, Self::DryRun(_))
    }

    /// The owning policy of a sandbox namespace.
    pub fn dry_run_id(&self) -> Option<PolicyId> {
        match self {
            Self::Production => None,
            Self::DryRun(id) => Some(*id),
        }
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Production => f.write_str("production"),
            Self::DryRun(id) => write!(f, "dry-run:{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_policy() {
        let id = PolicyId::new();
        assert_eq!(Namespace::for_policy(id, false), Namespace::Production);
        assert_eq!(Namespace::for_policy(id, true).dry_run_id(), Some(id));
        assert!(!Namespace::Production.is_dry_run());
    }

    #[test]
    fn test_sandboxes_distinct_per_policy() {
        assert_ne!(
            Namespace::DryRun(PolicyId::new()),
            Namespace::DryRun(PolicyId::new())
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Namespace::Production.to_string(), "production");
        let id = PolicyId::new();
        assert_eq!(Namespace::DryRun(id).to_string(), format!("dry-run:{id}"));
    }
}
