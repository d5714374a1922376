//! # Credential Issuance
//!
//! The lifecycle engine mints credentials through [`CredentialIssuer`] so a
//! deployment can route signing to an HSM or remote wallet. [`Ed25519Issuer`]
//! signs locally with the owner's account key.

use async_trait::async_trait;
use serde_json::Value;

use pledger_core::Did;
use pledger_crypto::Ed25519KeyPair;

use crate::credential::{VcError, VerifiableCredential};

/// Mints signed credentials.
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    /// Issue a credential over `subject`, signed with `signing_key`
    /// (the issuer's account key as a hex seed).
    async fn issue(
        &self,
        issuer: &Did,
        signing_key: &str,
        subject: Value,
    ) -> Result<VerifiableCredential, VcError>;
}

/// Local Ed25519 issuer.
#[derive(Debug, Default, Clone)]
pub struct Ed25519Issuer;

#[async_trait]
impl CredentialIssuer for Ed25519Issuer {
    async fn issue(
        &self,
        issuer: &Did,
        signing_key: &str,
        subject: Value,
    ) -> Result<VerifiableCredential, VcError> {
        let key =
            Ed25519KeyPair::from_seed_hex(signing_key).map_err(|e| VcError::Key(e.to_string()))?;
        let mut vc = VerifiableCredential::new(issuer, subject);
        vc.sign_ed25519(&key)?;
        Ok(vc)
    }
}

/// Attach a schema's JSON-LD context and type to a credential subject.
///
/// Non-object subjects are returned unchanged.
pub fn with_schema_context(mut subject: Value, context_url: &str, schema_type: &str) -> Value {
    if let Some(obj) = subject.as_object_mut() {
        obj.insert(
            "@context".to_string(),
            Value::Array(vec![Value::String(context_url.to_string())]),
        );
        obj.insert("type".to_string(), Value::String(schema_type.to_string()));
    }
    subject
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_issue_signs_with_account_key() {
        let key = Ed25519KeyPair::generate();
        let vc = Ed25519Issuer
            .issue(&Did::from("did:test:root"), &key.seed_hex(), json!({"name": "p"}))
            .await
            .unwrap();
        vc.verify(&key.public_key()).unwrap();
        assert_eq!(vc.issuer, "did:test:root");
    }

    #[tokio::test]
    async fn test_issue_rejects_malformed_key() {
        let result = Ed25519Issuer
            .issue(&Did::from("did:test:root"), "not-hex", json!({}))
            .await;
        assert!(matches!(result, Err(VcError::Key(_))));
    }

    #[test]
    fn test_schema_context_enrichment() {
        let subject = with_schema_context(json!({"id": "m1"}), "ipfs://ctx", "PolicyCredential");
        assert_eq!(subject["@context"], json!(["ipfs://ctx"]));
        assert_eq!(subject["type"], "PolicyCredential");
        assert_eq!(subject["id"], "m1");
    }

    #[test]
    fn test_schema_context_ignores_non_objects() {
        assert_eq!(with_schema_context(json!("x"), "c", "t"), json!("x"));
    }
}
