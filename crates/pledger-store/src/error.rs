//! # Store Errors

use thiserror::Error;

/// Errors returned by store implementations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The addressed row does not exist.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Entity kind.
        kind: &'static str,
        /// Requested key.
        id: String,
    },

    /// Another row already holds this `(uuid, version)` pair.
    #[error("policy {uuid} already has a row with version {version}")]
    DuplicateVersion {
        /// Policy uuid.
        uuid: String,
        /// Contested version.
        version: String,
    },

    /// Backend failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Shorthand for a missing row.
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}
