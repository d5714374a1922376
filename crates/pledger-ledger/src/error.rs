//! # Ledger Errors

use pledger_core::{MessageId, TopicId};
use thiserror::Error;

/// Errors surfaced by ledger gateways, provisioners and account resolvers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The topic does not exist in the sending namespace.
    #[error("topic {0} not found")]
    TopicNotFound(TopicId),

    /// The message does not exist in the reading namespace.
    #[error("message {0} not found")]
    MessageNotFound(MessageId),

    /// The ledger rejected a submission.
    #[error("submission to topic {topic} failed: {reason}")]
    SubmissionFailed {
        /// Target topic.
        topic: TopicId,
        /// Rejection reason.
        reason: String,
    },

    /// Topic creation or linking failed.
    #[error("topic provisioning failed: {0}")]
    Provisioning(String),

    /// No ledger account is bound to the identity.
    #[error("no ledger account for {0}")]
    AccountNotFound(String),

    /// Transient transport failure; safe to retry.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

impl LedgerError {
    /// Whether the failure is transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
