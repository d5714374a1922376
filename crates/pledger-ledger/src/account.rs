//! # Accounts
//!
//! Every ledger submission is paid for by an account. Policy owners pay
//! with their root account; workflow users pay with their own.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use pledger_core::Did;
use pledger_crypto::Ed25519KeyPair;

use crate::error::LedgerError;

/// A paying ledger account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerAccount {
    /// Ledger account id (e.g. `0.0.5001`).
    pub account_id: String,
    /// Private key as a hex seed.
    pub account_key: String,
    /// DID bound to the account.
    pub did: Did,
}

impl std::fmt::Debug for LedgerAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerAccount")
            .field("account_id", &self.account_id)
            .field("account_key", &"<private>")
            .field("did", &self.did)
            .finish()
    }
}

/// Platform role of a registered user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    /// Policy author and root of a user hierarchy.
    StandardRegistry,
    /// Workflow participant.
    User,
    /// Read-only observer.
    Auditor,
}

/// A user known to the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredUser {
    /// Login name.
    pub username: String,
    /// DID, once the user completed identity setup.
    pub did: Option<Did>,
    /// Platform role.
    pub role: UserRole,
}

/// Resolves identities to accounts.
#[async_trait]
pub trait AccountResolver: Send + Sync {
    /// Root account of a policy owner.
    async fn root_account(&self, owner: &Did) -> Result<LedgerAccount, LedgerError>;

    /// Account of a workflow user.
    async fn user_account(&self, did: &Did) -> Result<LedgerAccount, LedgerError>;

    /// Look a user up by login name.
    async fn find_user(&self, username: &str) -> Result<Option<RegisteredUser>, LedgerError>;
}

/// In-process account registry.
#[derive(Debug, Default)]
pub struct MemoryAccounts {
    accounts: RwLock<HashMap<Did, LedgerAccount>>,
    users: RwLock<HashMap<String, RegisteredUser>>,
    next_account: RwLock<u64>,
}

impl MemoryAccounts {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user and, when a DID is given, a fresh account for it.
    pub fn register(&self, username: &str, did: Option<Did>, role: UserRole) -> Option<LedgerAccount> {
        self.users.write().insert(
            username.to_string(),
            RegisteredUser {
                username: username.to_string(),
                did: did.clone(),
                role,
            },
        );
        let did = did?;
        let account = {
            let mut next = self.next_account.write();
            *next += 1;
            LedgerAccount {
                account_id: format!("0.0.{}", 5000 + *next),
                account_key: Ed25519KeyPair::generate().seed_hex(),
                did: did.clone(),
            }
        };
        self.accounts.write().insert(did, account.clone());
        Some(account)
    }
}

#[async_trait]
impl AccountResolver for MemoryAccounts {
    async fn root_account(&self, owner: &Did) -> Result<LedgerAccount, LedgerError> {
        self.accounts
            .read()
            .get(owner)
            .cloned()
            .ok_or_else(|| LedgerError::AccountNotFound(owner.to_string()))
    }

    async fn user_account(&self, did: &Did) -> Result<LedgerAccount, LedgerError> {
        self.root_account(did).await
    }

    async fn find_user(&self, username: &str) -> Result<Option<RegisteredUser>, LedgerError> {
        Ok(self.users.read().get(username).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_resolve() {
        let accounts = MemoryAccounts::new();
        let did = Did::from("did:test:registry");
        let acct = accounts
            .register("registry", Some(did.clone()), UserRole::StandardRegistry)
            .unwrap();
        assert_eq!(accounts.root_account(&did).await.unwrap(), acct);
        assert_eq!(acct.account_key.len(), 64);
        let user = accounts.find_user("registry").await.unwrap().unwrap();
        assert_eq!(user.role, UserRole::StandardRegistry);
    }

    #[tokio::test]
    async fn test_user_without_did_has_no_account() {
        let accounts = MemoryAccounts::new();
        assert!(accounts.register("pending", None, UserRole::User).is_none());
        assert!(accounts.find_user("pending").await.unwrap().unwrap().did.is_none());
        assert_eq!(
            accounts.root_account(&Did::from("did:none")).await,
            Err(LedgerError::AccountNotFound("did:none".into()))
        );
    }

    #[test]
    fn test_debug_hides_key() {
        let acct = LedgerAccount {
            account_id: "0.0.1".into(),
            account_key: "secret".into(),
            did: Did::from("did:x"),
        };
        assert!(!format!("{acct:?}").contains("secret"));
    }
}
