//! # Policy Lifecycle
//!
//! ```text
//! DRAFT ──▶ DRY_RUN ──▶ PUBLISH (terminal)
//!   │  ▲       │           ▲
//!   │  └───────┤           │
//!   │          ▼           │
//!   └────▶ PUBLISH_ERROR ──┘
//!              │  ▲
//!              └──┘ (retry fails again)
//! ```
//!
//! `DRAFT → PUBLISH_ERROR` and `DRY_RUN → PUBLISH_ERROR` are taken by the
//! publish failure boundary. Only a `DRAFT` policy may be deleted.

use serde::{Deserialize, Serialize};

use pledger_core::{StateError, Timestamp};

/// Lifecycle status of a policy row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyStatus {
    /// Editable, not yet on the ledger.
    Draft,
    /// Running in an isolated sandbox namespace.
    DryRun,
    /// Published to the ledger (terminal).
    Publish,
    /// A publish attempt failed; topics provisioned so far are kept for reuse.
    PublishError,
}

impl PolicyStatus {
    /// Returns the canonical state name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::DryRun => "DRY_RUN",
            Self::Publish => "PUBLISH",
            Self::PublishError => "PUBLISH_ERROR",
        }
    }

    /// Parse a canonical state name.
    pub fn parse(s: &str) -> Result<Self, StateError> {
        match s {
            "DRAFT" => Ok(Self::Draft),
            "DRY_RUN" => Ok(Self::DryRun),
            "PUBLISH" => Ok(Self::Publish),
            "PUBLISH_ERROR" => Ok(Self::PublishError),
            other => Err(StateError::UnknownStatus {
                kind: "policy",
                value: other.to_string(),
            }),
        }
    }

    /// Whether this state is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Publish)
    }

    /// Whether a policy in this state may be deleted.
    pub fn is_deletable(&self) -> bool {
        matches!(self, Self::Draft)
    }

    /// Whether the transition `self → to` is in the table.
    pub fn can_transition_to(&self, to: PolicyStatus) -> bool {
        matches!(
            (self, to),
            (Self::Draft, Self::DryRun)
                | (Self::Draft, Self::Publish)
                | (Self::Draft, Self::PublishError)
                | (Self::DryRun, Self::Draft)
                | (Self::DryRun, Self::Publish)
                | (Self::DryRun, Self::PublishError)
                | (Self::PublishError, Self::Publish)
                | (Self::PublishError, Self::PublishError)
        )
    }

    /// Validate `self → to`, returning a record for the transition log.
    pub fn transition(
        &self,
        to: PolicyStatus,
        reason: impl Into<String>,
    ) -> Result<PolicyTransitionRecord, StateError> {
        if !self.can_transition_to(to) {
            let reason = if self.is_terminal() {
                "policy is already published".to_string()
            } else {
                "transition not permitted".to_string()
            };
            return Err(StateError::InvalidTransition {
                from: self.name().to_string(),
                to: to.name().to_string(),
                reason,
            });
        }
        Ok(PolicyTransitionRecord {
            from_state: *self,
            to_state: to,
            timestamp: Timestamp::now(),
            reason: reason.into(),
        })
    }
}

impl std::fmt::Display for PolicyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One entry of a policy's status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyTransitionRecord {
    /// State before the transition.
    pub from_state: PolicyStatus,
    /// State after the transition.
    pub to_state: PolicyStatus,
    /// When the transition occurred.
    pub timestamp: Timestamp,
    /// Why the transition happened.
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [PolicyStatus; 4] = [
        PolicyStatus::Draft,
        PolicyStatus::DryRun,
        PolicyStatus::Publish,
        PolicyStatus::PublishError,
    ];

    #[test]
    fn test_happy_paths() {
        assert!(PolicyStatus::Draft.can_transition_to(PolicyStatus::Publish));
        assert!(PolicyStatus::Draft.can_transition_to(PolicyStatus::DryRun));
        assert!(PolicyStatus::DryRun.can_transition_to(PolicyStatus::Publish));
        assert!(PolicyStatus::DryRun.can_transition_to(PolicyStatus::Draft));
    }

    #[test]
    fn test_publish_error_recovery() {
        assert!(PolicyStatus::Draft.can_transition_to(PolicyStatus::PublishError));
        assert!(PolicyStatus::PublishError.can_transition_to(PolicyStatus::Publish));
        assert!(PolicyStatus::PublishError.can_transition_to(PolicyStatus::PublishError));
        assert!(!PolicyStatus::PublishError.can_transition_to(PolicyStatus::Draft));
    }

    #[test]
    fn test_publish_is_terminal() {
        for to in ALL {
            assert!(!PolicyStatus::Publish.can_transition_to(to));
        }
        let err = PolicyStatus::Publish
            .transition(PolicyStatus::Draft, "edit")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid transition from PUBLISH to DRAFT: policy is already published"
        );
    }

    #[test]
    fn test_transition_record() {
        let rec = PolicyStatus::Draft
            .transition(PolicyStatus::Publish, "version 1.0.0")
            .unwrap();
        assert_eq!(rec.from_state, PolicyStatus::Draft);
        assert_eq!(rec.to_state, PolicyStatus::Publish);
        assert_eq!(rec.reason, "version 1.0.0");
    }

    #[test]
    fn test_only_draft_deletable() {
        let deletable: Vec<_> = ALL.iter().filter(|s| s.is_deletable()).collect();
        assert_eq!(deletable, vec![&PolicyStatus::Draft]);
    }

    #[test]
    fn test_names_roundtrip() {
        for s in ALL {
            assert_eq!(PolicyStatus::parse(s.name()).unwrap(), s);
            assert_eq!(serde_json::to_string(&s).unwrap(), format!("\"{}\"", s.name()));
        }
        assert!(PolicyStatus::parse("ARCHIVED").is_err());
    }
}
