//! # pledger-revoke — Revocation Protocol
//!
//! Withdraws a document and everything derived from it. The ledger is
//! append-only, so "withdraw" means appending one revocation record per
//! affected message and then marking the local document mirrors `Revoked`.
//!
//! ## Pipeline
//!
//! 1. Snapshot every message on the policy's topics ([`MessageGraph`]).
//! 2. Walk dependants of the trigger depth-first ([`MessageGraph::plan`]),
//!    collecting each reached message once with the set of predecessors
//!    that led to it.
//! 3. Submit a revocation record per planned entry, in ledger order.
//! 4. Mark matching local documents `Revoked` and optionally overwrite the
//!    status of the trigger's preceding document.
//! 5. Notify downstream consumers through a [`BlockEventSink`].
//!
//! There is no rollback. A failed submission raises
//! [`RevokeError::Partial`] after the documents of the entries already
//! revoked have been updated; running the block again resumes where the
//! previous attempt stopped, because revoked messages are walked through
//! but never resubmitted.

pub mod block;
pub mod error;
pub mod events;
pub mod graph;

pub use block::{BlockServices, RevocationOutcome, RevokeBlock, RevokeOptions, UiMetaData};
pub use error::{GraphError, RevokeError};
pub use events::{BlockEvent, BlockEventSink, RecordingSink};
pub use graph::{MessageGraph, RevocationEntry, RevocationPlan};
