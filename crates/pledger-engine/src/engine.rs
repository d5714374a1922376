//! # Policy Engine
//!
//! [`PolicyEngine`] owns its collaborators explicitly: store, ledger
//! gateway, topic provisioner, account resolver, credential issuer and
//! control bus are handed in at construction, and the worker registry and
//! readiness table are instances owned by the engine.
//!
//! The lifecycle operations live in sibling modules as `impl PolicyEngine`
//! blocks: `create` (create, clone, delete), `publish` (publish, dry run,
//! validate-and-publish, stop dry run), `worker` (generate, validate,
//! destroy, readiness), `import` (preview, import) and `multi`.

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use pledger_core::{Did, Namespace, PolicyId, TopicId};
use pledger_ledger::{
    AccountResolver, LedgerAccount, LedgerGateway, MessageSender, SendContext, TopicProvisioner,
    UserRole,
};
use pledger_state::PolicyStatus;
use pledger_store::{Policy, PolicyGroup, PolicyStore, Topic};
use pledger_vc::CredentialIssuer;

use crate::bus::ControlBus;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::registry::WorkerRegistry;
use crate::rendezvous::ReadyTable;

/// External services the engine drives.
#[derive(Clone)]
pub struct Collaborators {
    /// Persistence.
    pub store: Arc<dyn PolicyStore>,
    /// Message submission and reads.
    pub ledger: Arc<dyn LedgerGateway>,
    /// Topic creation and linking.
    pub topics: Arc<dyn TopicProvisioner>,
    /// Identity → paying account.
    pub accounts: Arc<dyn AccountResolver>,
    /// Credential minting.
    pub issuer: Arc<dyn CredentialIssuer>,
    /// Worker control events.
    pub bus: Arc<dyn ControlBus>,
}

/// A running policy instance as seen by workflow callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyInstance {
    /// Policy row id.
    pub policy_id: PolicyId,
    /// Whether the instance runs in its dry-run sandbox.
    pub dry_run: bool,
    /// Runtime topic.
    pub instance_topic_id: Option<TopicId>,
    /// Policy owner.
    pub owner: Did,
}

impl PolicyInstance {
    /// Instance view of a stored policy.
    pub fn of(policy: &Policy) -> Self {
        Self {
            policy_id: policy.id,
            dry_run: policy.status == PolicyStatus::DryRun,
            instance_topic_id: policy.instance_topic_id.clone(),
            owner: policy.owner.clone(),
        }
    }

    /// Namespace the instance reads and writes.
    pub fn namespace(&self) -> Namespace {
        Namespace::for_policy(self.policy_id, self.dry_run)
    }
}

/// The session user making a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    /// Login name.
    pub username: String,
    /// Session role.
    pub role: UserRole,
}

/// The identity a user acts as inside a policy instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyUser {
    /// Acting DID (the virtual user's in a dry run).
    pub did: Did,
    /// Display name.
    pub username: String,
    /// Whether the identity is a sandbox virtual user.
    pub is_virtual: bool,
    /// Current role binding, if any.
    pub group: Option<PolicyGroup>,
}

/// Policy lifecycle manager.
pub struct PolicyEngine {
    pub(crate) deps: Collaborators,
    pub(crate) config: EngineConfig,
    pub(crate) registry: WorkerRegistry,
    pub(crate) ready: ReadyTable,
}

impl PolicyEngine {
    /// Engine over `deps` with settings `config`.
    pub fn new(deps: Collaborators, config: EngineConfig) -> Self {
        let registry = WorkerRegistry::new(config.channel_prefix.clone());
        Self {
            deps,
            config,
            registry,
            ready: ReadyTable::new(),
        }
    }

    /// Active settings.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Worker channel registry.
    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }

    /// Regenerate worker models for every published and dry-running policy.
    /// Failures are logged; returns how many models came up.
    pub async fn init(&self) -> Result<usize, EngineError> {
        let policies = self
            .deps
            .store
            .get_policies_by_status(&[PolicyStatus::Publish, PolicyStatus::DryRun])
            .await?;
        tracing::info!(count = policies.len(), "starting policy workers");

        let results = join_all(policies.iter().map(|p| self.generate_model(&p.id))).await;
        let mut started = 0;
        for (policy, result) in policies.iter().zip(results) {
            match result {
                Ok(()) => started += 1,
                Err(e) => tracing::error!(policy_id = %policy.id, error = %e, "worker start failed"),
            }
        }
        Ok(started)
    }

    /// Resolve the identity `user` acts as inside `instance`.
    pub async fn get_user(
        &self,
        instance: &PolicyInstance,
        user: &AuthUser,
    ) -> Result<PolicyUser, EngineError> {
        let registered = self
            .deps
            .accounts
            .find_user(&user.username)
            .await?
            .ok_or(EngineError::Forbidden)?;
        let did = registered.did.ok_or(EngineError::Forbidden)?;

        let mut acting = if instance.dry_run {
            if user.role != UserRole::StandardRegistry {
                return Err(EngineError::Forbidden);
            }
            let virtual_user = self
                .deps
                .store
                .get_virtual_user(&instance.policy_id)
                .await?
                .ok_or(EngineError::NoVirtualUser(instance.policy_id))?;
            PolicyUser {
                did: virtual_user.did,
                username: virtual_user.username,
                is_virtual: true,
                group: None,
            }
        } else {
            PolicyUser {
                did,
                username: registered.username,
                is_virtual: false,
                group: None,
            }
        };

        acting.group = self
            .deps
            .store
            .get_active_groups(&instance.namespace(), &instance.policy_id, &acting.did)
            .await?
            .into_iter()
            .next();
        Ok(acting)
    }

    // ─── Shared helpers ─────────────────────────────────────────────

    pub(crate) async fn load_policy(&self, id: &PolicyId) -> Result<Policy, EngineError> {
        self.deps
            .store
            .get_policy(id)
            .await?
            .ok_or_else(|| EngineError::PolicyNotFound(id.to_string()))
    }

    pub(crate) async fn root_account(&self, owner: &Did) -> Result<LedgerAccount, EngineError> {
        Ok(self.deps.accounts.root_account(owner).await?)
    }

    /// The recorded definition topic of `policy`.
    pub(crate) async fn definition_topic(&self, policy: &Policy) -> Result<Topic, EngineError> {
        let topic_id = policy
            .topic_id
            .as_ref()
            .ok_or(EngineError::PolicyTopicMissing(policy.id))?;
        self.deps
            .store
            .get_topic(&Namespace::Production, topic_id)
            .await?
            .ok_or_else(|| EngineError::TopicNotFound(topic_id.clone()))
    }

    pub(crate) fn sender(&self, ctx: SendContext, topic: TopicId) -> MessageSender {
        MessageSender::bind(self.deps.ledger.clone(), ctx, topic)
    }
}

/// Body of a policy lifecycle message.
pub(crate) fn policy_message(policy: &Policy) -> Value {
    json!({
        "id": policy.id,
        "uuid": policy.uuid,
        "name": policy.name,
        "description": policy.description,
        "topicDescription": policy.topic_description,
        "policyTag": policy.policy_tag,
        "version": policy.version,
        "owner": policy.owner,
        "topicId": policy.topic_id,
        "instanceTopicId": policy.instance_topic_id,
        "synchronizationTopicId": policy.synchronization_topic_id,
    })
}
