//! # Revocation Errors

use thiserror::Error;

use pledger_core::MessageId;
use pledger_ledger::LedgerError;
use pledger_store::StoreError;

/// Failures of the dependency walk.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// The trigger is not among the policy's messages.
    #[error("message {0} is not on any topic of the policy")]
    TriggerNotFound(MessageId),
}

/// Top-level error of the revoke block.
#[derive(Error, Debug)]
pub enum RevokeError {
    /// Block options are malformed. Carries the author-facing message.
    #[error("{0}")]
    InvalidOptions(String),

    /// The trigger document was never anchored on the ledger.
    #[error("document {0} has no ledger message")]
    NotAnchored(String),

    /// A submission failed part way through the plan. Entries before the
    /// failure stay revoked on the ledger and locally.
    #[error("revocation stopped after {revoked} of {total} messages: {source}")]
    Partial {
        /// Revocation records already appended.
        revoked: usize,
        /// Planned entries.
        total: usize,
        /// The failed submission.
        #[source]
        source: LedgerError,
    },

    /// Dependency walk failure.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Ledger read or account resolution failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}
