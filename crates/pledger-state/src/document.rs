//! # Document Status
//!
//! Workflow status carried by stored credentials and presentations.
//! `Revoked` is terminal: once the revocation protocol marks a document,
//! no later status overwrite applies to it.

use serde::{Deserialize, Serialize};

use pledger_core::StateError;

/// Workflow status of a stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentStatus {
    /// Freshly submitted.
    New,
    /// Waiting for a reviewer.
    Waiting,
    /// Accepted by a reviewer.
    Approved,
    /// Refused by a reviewer.
    Rejected,
    /// Replaced by a newer document.
    Superseded,
    /// Temporarily withdrawn.
    Suspended,
    /// Withdrawn by the revocation protocol (terminal).
    Revoked,
}

impl DocumentStatus {
    /// The canonical status name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Waiting => "Waiting",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::Superseded => "Superseded",
            Self::Suspended => "Suspended",
            Self::Revoked => "Revoked",
        }
    }

    /// Parse a status name as configured in block options.
    pub fn parse(s: &str) -> Result<Self, StateError> {
        match s {
            "New" => Ok(Self::New),
            "Waiting" => Ok(Self::Waiting),
            "Approved" => Ok(Self::Approved),
            "Rejected" => Ok(Self::Rejected),
            "Superseded" => Ok(Self::Superseded),
            "Suspended" => Ok(Self::Suspended),
            "Revoked" => Ok(Self::Revoked),
            other => Err(StateError::UnknownStatus {
                kind: "document",
                value: other.to_string(),
            }),
        }
    }

    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Revoked)
    }

    /// Validate overwriting `current` with `to`. A missing current status
    /// behaves like `New`.
    pub fn check_overwrite(current: Option<Self>, to: Self) -> Result<(), StateError> {
        match current {
            Some(from) if from.is_terminal() => Err(StateError::InvalidTransition {
                from: from.name().to_string(),
                to: to.name().to_string(),
                reason: "document is revoked".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
