//! # Schema Status
//!
//! Only `DRAFT` schemas may be version-incremented or deleted. Publishing a
//! schema pins its version and IRI for good.

use serde::{Deserialize, Serialize};

use pledger_core::StateError;

/// Publication status of a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemaStatus {
    /// Editable.
    Draft,
    /// Immutable and on the ledger.
    Published,
}

impl SchemaStatus {
    /// Canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Published => "PUBLISHED",
        }
    }

    /// Only drafts are mutable.
    pub fn is_mutable(&self) -> bool {
        matches!(self, Self::Draft)
    }

    /// Validate `self → to`.
    pub fn check_transition(&self, to: SchemaStatus) -> Result<(), StateError> {
        if matches!((self, to), (Self::Draft, Self::Published)) {
            Ok(())
        } else {
            Err(StateError::InvalidTransition {
                from: self.name().to_string(),
                to: to.name().to_string(),
                reason: "published schemas are immutable".to_string(),
            })
        }
    }
}

impl std::fmt::Display for SchemaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_publishes_once() {
        assert!(SchemaStatus::Draft.check_transition(SchemaStatus::Published).is_ok());
        assert!(SchemaStatus::Published.check_transition(SchemaStatus::Published).is_err());
        assert!(SchemaStatus::Published.check_transition(SchemaStatus::Draft).is_err());
    }

    #[test]
    fn test_mutability() {
        assert!(SchemaStatus::Draft.is_mutable());
        assert!(!SchemaStatus::Published.is_mutable());
    }
}
