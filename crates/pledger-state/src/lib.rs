//! # pledger-state — Status Machines
//!
//! Every status that used to travel as a free-form string is a closed enum
//! here, and every enum that moves carries its transition table.
//!
//! ## State Machines
//!
//! - **Policy** (`policy.rs`): `DRAFT → DRY_RUN → PUBLISH` with a
//!   `PUBLISH_ERROR` recovery branch that can be retried.
//!
//! - **Document** (`document.rs`): workflow statuses of stored credentials,
//!   with `Revoked` terminal.
//!
//! - **Schema** (`schema.rs`): `DRAFT → PUBLISHED`, published schemas are
//!   immutable.
//!
//! ## Design
//!
//! Policies are persisted rows whose status is only known at runtime, so
//! the machines are enums validated by `matches!` tables rather than
//! typestates. Rejections carry both state names in a `StateError`.

pub mod document;
pub mod policy;
pub mod schema;

pub use document::DocumentStatus;
pub use policy::{PolicyStatus, PolicyTransitionRecord};
pub use schema::SchemaStatus;
