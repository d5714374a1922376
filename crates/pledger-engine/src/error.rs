//! # Engine Errors
//!
//! Rejections carry the operator-facing wording; collaborator failures are
//! wrapped with `#[from]` so `?` works across the pipeline.

use std::path::PathBuf;

use thiserror::Error;

use pledger_core::{Did, PolicyId, StateError, TopicId};
use pledger_ledger::LedgerError;
use pledger_store::StoreError;
use pledger_vc::VcError;

/// Top-level error of the lifecycle engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// No policy row matches.
    #[error("Policy {0} does not exist")]
    PolicyNotFound(String),

    /// The policy has no block configuration.
    #[error("The policy is empty")]
    EmptyConfig,

    /// Publishing a policy that is already published.
    #[error("Policy already published")]
    AlreadyPublished,

    /// The requested version is not 1–3 dot-separated digit groups.
    #[error("Invalid version format: {0:?}")]
    InvalidVersionFormat(String),

    /// The requested version does not exceed the previous one.
    #[error("Version {version} must be greater than {previous:?}")]
    VersionNotGreater {
        /// Requested version.
        version: String,
        /// Version the policy was derived from (empty if none).
        previous: String,
    },

    /// Another row already holds `(uuid, version)`.
    #[error("Policy with version {version} already was published")]
    DuplicateVersion {
        /// Policy uuid.
        uuid: String,
        /// Contested version.
        version: String,
    },

    /// The acting identity is not the creator of the source policy.
    #[error("Invalid owner")]
    InvalidOwner,

    /// The requester does not own the policy.
    #[error("Insufficient permissions to {action} the policy")]
    PermissionDenied {
        /// Attempted operation.
        action: &'static str,
    },

    /// The policy's status does not allow the operation.
    #[error("{0}")]
    InvalidStatus(String),

    /// The acting user may not enter this policy instance.
    #[error("Forbidden")]
    Forbidden,

    /// A dry-running policy has no sandbox identity.
    #[error("dry run of policy {0} has no virtual user")]
    NoVirtualUser(PolicyId),

    /// The owner has no root topic to register policies under.
    #[error("no user topic for {0}")]
    UserTopicNotFound(Did),

    /// The policy row carries no definition topic.
    #[error("policy {0} has no topic")]
    PolicyTopicMissing(PolicyId),

    /// A recorded topic could not be resolved.
    #[error("topic {0} is not recorded")]
    TopicNotFound(TopicId),

    /// The worker did not report readiness in time.
    #[error("worker for policy {policy_id} not ready after {secs}s")]
    WorkerTimeout {
        /// Policy whose worker timed out.
        policy_id: PolicyId,
        /// Timeout that elapsed.
        secs: u64,
    },

    /// A newer readiness waiter replaced this one.
    #[error("readiness wait for policy {0} was superseded")]
    WorkerCancelled(PolicyId),

    /// A ledger message is not what the operation expects.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// The worker's readiness payload could not be read.
    #[error("invalid readiness payload: {0}")]
    InvalidReadyPayload(String),

    /// Ledger gateway failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Credential issuance failure.
    #[error(transparent)]
    Vc(#[from] VcError),

    /// Archive encode/decode failure.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Control bus failure.
    #[error(transparent)]
    Bus(#[from] BusError),

    /// Rejected status transition.
    #[error(transparent)]
    State(#[from] StateError),

    /// JSON conversion failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Policy archive errors.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Reading or writing the tar/gzip stream failed.
    #[error("archive I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An entry is not valid JSON for its kind.
    #[error("archive entry {entry} is malformed: {source}")]
    Malformed {
        /// Entry path.
        entry: String,
        /// Parse error.
        source: serde_json::Error,
    },

    /// A required entry is absent.
    #[error("archive has no {0} entry")]
    MissingEntry(&'static str),
}

/// Control bus errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// No subscriber is listening anymore.
    #[error("control bus is closed")]
    Closed,
}

/// Engine configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not valid YAML for [`EngineConfig`](crate::EngineConfig).
    #[error("invalid config YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// An environment override does not parse.
    #[error("environment variable {var}={value:?} is not a valid value")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },

    /// A field is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}
