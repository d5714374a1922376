//! # Credential Proofs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Supported proof suites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProofType {
    /// Ed25519 signature over the JCS-canonical credential body.
    Ed25519Signature2018,
}

impl std::fmt::Display for ProofType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ed25519Signature2018 => f.write_str("Ed25519Signature2018"),
        }
    }
}

/// Why the proof was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProofPurpose {
    /// The issuer asserts the credential subject.
    AssertionMethod,
}

/// A proof attached to a credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    /// Proof suite.
    #[serde(rename = "type")]
    pub proof_type: ProofType,
    /// Creation time.
    pub created: DateTime<Utc>,
    /// DID URL of the signing key.
    pub verification_method: String,
    /// Purpose.
    pub proof_purpose: ProofPurpose,
    /// Hex-encoded Ed25519 signature.
    pub proof_value: String,
}

impl Proof {
    /// An assertion proof carrying a hex signature.
    pub fn ed25519(verification_method: String, proof_value: String, created: DateTime<Utc>) -> Self {
        Self {
            proof_type: ProofType::Ed25519Signature2018,
            created,
            verification_method,
            proof_purpose: ProofPurpose::AssertionMethod,
            proof_value,
        }
    }
}
