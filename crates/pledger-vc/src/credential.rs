//! # Verifiable Credential Envelope
//!
//! Signing canonicalizes the credential body (proof removed) through
//! [`CanonicalBytes::new()`] and attaches a single Ed25519 [`Proof`].
//! The envelope is rigid; `credential_subject` is free-form JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use pledger_core::{sha256_hex, CanonicalBytes, Did};
use pledger_crypto::{verify, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};

use crate::proof::{Proof, ProofType};

/// Base JSON-LD context present on every credential.
pub const BASE_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";

/// Errors from credential signing, hashing and verification.
#[derive(Error, Debug)]
pub enum VcError {
    /// Canonicalization of the credential failed.
    #[error("canonicalization failed: {0}")]
    Canonicalization(#[from] pledger_core::CanonicalizationError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The issuer's signing key could not be loaded.
    #[error("signing key error: {0}")]
    Key(String),

    /// The credential carries no proof.
    #[error("credential has no proof")]
    NoProof,

    /// Signature did not verify.
    #[error("signature verification failed: {0}")]
    VerificationFailed(String),
}

/// A W3C verifiable credential with one optional proof.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiableCredential {
    /// JSON-LD contexts. The first entry is always [`BASE_CONTEXT`].
    #[serde(rename = "@context")]
    pub context: Vec<Value>,

    /// Credential identifier (`urn:uuid:...`).
    pub id: String,

    /// Credential types. Always includes `VerifiableCredential`.
    #[serde(rename = "type")]
    pub credential_type: Vec<String>,

    /// DID of the issuer.
    pub issuer: String,

    /// Issuance time.
    pub issuance_date: DateTime<Utc>,

    /// Subject claims.
    pub credential_subject: Value,

    /// Issuer proof.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<Proof>,
}

impl VerifiableCredential {
    /// An unsigned credential over `subject`.
    pub fn new(issuer: &Did, subject: Value) -> Self {
        Self {
            context: vec![Value::String(BASE_CONTEXT.to_string())],
            id: format!("urn:uuid:{}", uuid::Uuid::new_v4()),
            credential_type: vec!["VerifiableCredential".to_string()],
            issuer: issuer.to_string(),
            issuance_date: Utc::now(),
            credential_subject: subject,
            proof: None,
        }
    }

    /// Canonical bytes of the credential with `proof` removed.
    pub fn signing_input(&self) -> Result<CanonicalBytes, VcError> {
        let mut val = serde_json::to_value(self)?;
        if let Some(obj) = val.as_object_mut() {
            obj.remove("proof");
        }
        Ok(CanonicalBytes::new(&val)?)
    }

    /// Sign and attach the proof, replacing any previous one.
    pub fn sign_ed25519(&mut self, key: &Ed25519KeyPair) -> Result<(), VcError> {
        let canonical = self.signing_input()?;
        let signature = key.sign(&canonical);
        self.proof = Some(Proof::ed25519(
            format!("{}#did-root-key", self.issuer),
            signature.to_hex(),
            Utc::now(),
        ));
        Ok(())
    }

    /// Verify the attached proof against a known public key.
    pub fn verify(&self, public_key: &Ed25519PublicKey) -> Result<(), VcError> {
        let proof = self.proof.as_ref().ok_or(VcError::NoProof)?;
        match proof.proof_type {
            ProofType::Ed25519Signature2018 => {}
        }
        let sig = Ed25519Signature::from_hex(&proof.proof_value)
            .map_err(|e| VcError::VerificationFailed(e.to_string()))?;
        verify(&self.signing_input()?, &sig, public_key)
            .map_err(|e| VcError::VerificationFailed(e.to_string()))
    }

    /// Hash identifying this credential, proof included.
    pub fn credential_hash(&self) -> Result<String, VcError> {
        Ok(sha256_hex(&CanonicalBytes::new(self)?))
    }

    /// The credential as a JSON tree, for persisting as a document body.
    pub fn to_json_tree(&self) -> Result<Value, VcError> {
        Ok(serde_json::to_value(self)?)
    }
}
