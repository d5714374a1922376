//! # pledger-engine — Policy Lifecycle Manager
//!
//! Drives a policy from draft to published instance:
//!
//! ```text
//! DRAFT ──dry_run──▶ DRY_RUN ──stop_dry_run──▶ DRAFT
//!   │                   │
//!   └──────publish──────┴──▶ PUBLISH            (terminal)
//!                       └──▶ PUBLISH_ERROR ──publish──▶ PUBLISH
//! ```
//!
//! [`PolicyEngine`] owns its collaborators (store, ledger gateway, topic
//! provisioner, account resolver, credential issuer, control bus) and two
//! pieces of process state: the [`WorkerRegistry`] of execution channels
//! and the [`ReadyTable`] where callers wait for workers to report ready.
//!
//! ## Failure boundaries
//!
//! - Publish: any failing step demotes the row to `PUBLISH_ERROR`, clears
//!   its version, persists it, and re-raises. Provisioned topic ids stay on
//!   the row and are reused by the next attempt.
//! - Dry run: any failing step discards the sandbox namespace; the row is
//!   not touched.
//! - Worker readiness: bounded by `ready_timeout_secs`; on expiry the worker
//!   is torn down and [`EngineError::WorkerTimeout`] is raised.

pub mod archive;
pub mod bus;
pub mod config;
pub mod create;
pub mod engine;
pub mod error;
pub mod import;
pub mod multi;
pub mod publish;
pub mod registry;
pub mod rendezvous;
pub mod schema;
pub mod tree;
pub mod worker;

pub use archive::{ArchivedArtifact, PolicyArchive};
pub use bus::{ChannelControlBus, ControlBus, PolicyEvent};
pub use config::EngineConfig;
pub use create::{ImportResult, PolicyDraft, PolicyOverrides};
pub use engine::{AuthUser, Collaborators, PolicyEngine, PolicyInstance, PolicyUser};
pub use error::{ArchiveError, BusError, ConfigError, EngineError};
pub use import::{PolicyPreview, VersionRef};
pub use multi::MultiPolicyRequest;
pub use publish::{PublishResult, DRY_RUN_ADMINISTRATOR};
pub use registry::{WorkerChannel, WorkerRegistry};
pub use rendezvous::{ReadyTable, ReadyTicket};
pub use schema::SchemaPublishSummary;
pub use worker::ModelTarget;
