//! # Error Types
//!
//! Errors shared by every crate in the workspace. Higher layers define their
//! own enums (`LedgerError`, `StoreError`, `EngineError`, `RevokeError`) and
//! wrap these through `#[from]`.
//!
//! ## Design
//!
//! - State machine errors include the current state, attempted transition,
//!   and rejection reason.
//! - Cryptographic errors fail loudly with full context.

use thiserror::Error;

/// Top-level error type for foundational operations.
#[derive(Error, Debug)]
pub enum PledgerError {
    /// Canonicalization failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// State machine transition rejected.
    #[error("invalid state transition: {0}")]
    InvalidTransition(#[from] StateError),

    /// A value failed format validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    #[error("float values are not permitted in canonical representations: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Error in cryptographic operations.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Signature verification failed.
    #[error("signature verification failed: {0}")]
    VerificationFailed(String),

    /// Key generation or parsing failed.
    #[error("key error: {0}")]
    KeyError(String),
}

/// Error in state machine transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// Attempted an invalid state transition.
    #[error("invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        /// Current state name.
        from: String,
        /// Attempted target state name.
        to: String,
        /// Reason the transition was rejected.
        reason: String,
    },

    /// A status string did not name a known state.
    #[error("unknown {kind} status {value:?}")]
    UnknownStatus {
        /// Which status family was being parsed.
        kind: &'static str,
        /// The rejected input.
        value: String,
    },
}
