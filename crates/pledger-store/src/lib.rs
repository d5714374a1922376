//! # pledger-store — Policy and Document Store
//!
//! Persistence contract for everything the lifecycle engine and the
//! revocation protocol read or write: policies, topics, schemas, artifacts,
//! tokens, multi-policy bindings, documents, document states, role groups,
//! and sandbox virtual users.
//!
//! ## Namespaces
//!
//! Topics, documents, document states, groups and virtual users are stored
//! per [`Namespace`](pledger_core::Namespace). Policies, schemas, artifacts,
//! tokens and multi-policies are production-only.
//!
//! ## Version uniqueness
//!
//! `(uuid, version)` is unique among policy rows. [`PolicyStore::reserve_policy_version`]
//! claims a pair atomically so two concurrent publishes of the same version
//! cannot both proceed.

pub mod error;
pub mod memory;
pub mod model;
pub mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use model::{
    Artifact, Document, DocumentKind, DocumentState, MultiPolicy, MultiPolicyRole, Policy,
    PolicyGroup, Schema, SchemaEntity, Token, Topic, VirtualUser,
};
pub use store::PolicyStore;
