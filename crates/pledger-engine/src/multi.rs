//! # Multi-Policy Bindings
//!
//! Instances of the same policy run by different registries coordinate
//! through the main instance's synchronization topic.

use uuid::Uuid;

use pledger_core::TopicId;
use pledger_ledger::{LedgerAccount, MessageAction, MessageDraft, MessageType, SendContext};
use pledger_store::{MultiPolicy, MultiPolicyRole};

use crate::engine::{PolicyEngine, PolicyInstance};
use crate::error::EngineError;

/// Topics a new binding joins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiPolicyRequest {
    /// Instance topic of the main policy.
    pub main_policy_topic_id: TopicId,
    /// Synchronization topic of the main policy.
    pub synchronization_topic_id: TopicId,
}

impl PolicyEngine {
    /// Bind `instance` into a multi-instance group for `user_account`. An
    /// existing binding for the same instance and account is returned as is.
    pub async fn create_multi_policy(
        &self,
        instance: &PolicyInstance,
        user_account: &LedgerAccount,
        root: &LedgerAccount,
        request: MultiPolicyRequest,
    ) -> Result<MultiPolicy, EngineError> {
        let instance_topic_id = instance
            .instance_topic_id
            .clone()
            .ok_or(EngineError::PolicyTopicMissing(instance.policy_id))?;
        if let Some(existing) = self
            .deps
            .store
            .get_multi_policy(&instance_topic_id, &user_account.account_id)
            .await?
        {
            return Ok(existing);
        }

        let role = if request.main_policy_topic_id == instance_topic_id {
            MultiPolicyRole::Main
        } else {
            MultiPolicyRole::Sub
        };
        let multi = MultiPolicy {
            uuid: Uuid::new_v4().to_string(),
            instance_topic_id,
            main_policy_topic_id: request.main_policy_topic_id,
            synchronization_topic_id: request.synchronization_topic_id.clone(),
            owner: user_account.did.clone(),
            user: user_account.account_id.clone(),
            policy_owner: root.account_id.clone(),
            role,
        };

        let ctx = SendContext::in_namespace(user_account.clone(), instance.namespace());
        self.sender(ctx, request.synchronization_topic_id)
            .send(MessageDraft::new(
                MessageType::Synchronization,
                MessageAction::CreateMultiPolicy,
                serde_json::to_value(&multi)?,
            ))
            .await?;
        self.deps.store.save_multi_policy(multi.clone()).await?;
        tracing::info!(policy_id = %instance.policy_id, ?role, "multi-policy binding created");
        Ok(multi)
    }
}
