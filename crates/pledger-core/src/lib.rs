//! # pledger-core — Foundational Types for Policy Lifecycle Management
//!
//! Every other crate in the workspace depends on `pledger-core`; it depends on
//! nothing internal. It holds the type-system primitives shared by the ledger
//! gateway, the document store, the lifecycle engine and the revocation
//! protocol.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `PolicyId`, `TopicId`,
//!    `MessageId`, `Did`. No bare strings or UUIDs cross crate boundaries.
//!
//! 2. **Explicit namespaces.** Every sandboxed operation carries a
//!    [`Namespace`]. Dry-run data lives in `Namespace::DryRun(policy_id)` and
//!    is never visible from `Namespace::Production`.
//!
//! 3. **`CanonicalBytes` newtype.** Credential hashing and signing flow
//!    through `CanonicalBytes::new()`. No raw `serde_json::to_vec()` for
//!    digests.
//!
//! 4. **One version ordering.** [`version_compare`] is the only place that
//!    orders policy versions; the publish guard and the preview listing both
//!    use it.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `pledger-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod identity;
pub mod namespace;
pub mod temporal;
pub mod validation;
pub mod version;

// Re-export primary types for ergonomic imports.
pub use canonical::CanonicalBytes;
pub use digest::{sha256_digest, sha256_hex, ContentDigest};
pub use error::{CanonicalizationError, CryptoError, PledgerError, StateError};
pub use identity::{Did, MessageId, PolicyId, TopicId};
pub use namespace::Namespace;
pub use temporal::Timestamp;
pub use validation::{BlockReport, ValidationReport, ValidationResultsContainer};
pub use version::{check_version_format, version_compare, VersionError};
