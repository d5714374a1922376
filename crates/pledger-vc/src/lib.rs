//! # pledger-vc — Policy Credentials
//!
//! Every published policy is anchored by a verifiable credential whose
//! subject describes the publish message (message id, version, content
//! locator, owner). This crate defines the credential envelope, its Ed25519
//! proof, the credential hash persisted next to the document, and the
//! [`CredentialIssuer`] contract the lifecycle engine mints through.
//!
//! ## Security Invariant
//!
//! Signing canonicalizes the credential body with `proof` removed via
//! `CanonicalBytes::new()`. The credential hash canonicalizes the full
//! credential, proof included, so two parties holding the same signed
//! credential compute the same hash.

pub mod credential;
pub mod issuer;
pub mod proof;

pub use credential::{VcError, VerifiableCredential, BASE_CONTEXT};
pub use issuer::{with_schema_context, CredentialIssuer, Ed25519Issuer};
pub use proof::{Proof, ProofPurpose, ProofType};
