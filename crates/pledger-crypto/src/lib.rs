//! # pledger-crypto — Account Key Cryptography
//!
//! Ed25519 key pairs for ledger accounts. The same key that pays for a
//! ledger submission signs the credential minted on publish.
//!
//! ## Crate Policy
//!
//! - Depends only on `pledger-core` internally.
//! - Signing input is always `&CanonicalBytes`.
//! - No mocking of cryptographic operations in tests.

pub mod ed25519;

pub use ed25519::{verify, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};
