//! # Topics

use serde::{Deserialize, Serialize};

use pledger_core::{Did, PolicyId, TopicId};

/// Role a topic plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TopicType {
    /// Root topic of an account holder.
    UserTopic,
    /// Definition topic of a policy (shared by all its versions).
    PolicyTopic,
    /// Runtime topic of one published policy instance.
    InstancePolicyTopic,
    /// Coordination topic between policy instances.
    SynchronizationTopic,
    /// Topic created by a running workflow.
    DynamicTopic,
}

/// Request for a new topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicSpec {
    /// Role of the topic.
    pub topic_type: TopicType,
    /// Display name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Owning account holder.
    pub owner: Did,
    /// Owning policy, if any.
    pub policy_id: Option<PolicyId>,
    /// Owning policy uuid, if any.
    pub policy_uuid: Option<String>,
    /// Restrict administration to the owner.
    pub need_admin_key: bool,
    /// Restrict submissions to the owner.
    pub need_submit_key: bool,
}

impl TopicSpec {
    /// A topic with both keys.
    pub fn new(topic_type: TopicType, name: impl Into<String>, owner: Did) -> Self {
        Self {
            topic_type,
            name: name.into(),
            description: String::new(),
            owner,
            policy_id: None,
            policy_uuid: None,
            need_admin_key: true,
            need_submit_key: true,
        }
    }

    /// Set the description.
    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Bind the topic to a policy.
    pub fn for_policy(mut self, policy_id: PolicyId, policy_uuid: impl Into<String>) -> Self {
        self.policy_id = Some(policy_id);
        self.policy_uuid = Some(policy_uuid.into());
        self
    }

    /// Choose which keys the topic carries.
    pub fn keys(mut self, admin: bool, submit: bool) -> Self {
        self.need_admin_key = admin;
        self.need_submit_key = submit;
        self
    }
}

/// Private keys of a provisioned topic (hex seeds).
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicKeys {
    /// Administration key.
    pub admin_key: Option<String>,
    /// Submission key.
    pub submit_key: Option<String>,
}

impl std::fmt::Debug for TopicKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicKeys")
            .field("admin_key", &self.admin_key.as_ref().map(|_| "<private>"))
            .field("submit_key", &self.submit_key.as_ref().map(|_| "<private>"))
            .finish()
    }
}

/// A freshly created topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedTopic {
    /// Ledger-assigned id.
    pub topic_id: TopicId,
    /// Keys to persist alongside the topic row.
    pub keys: TopicKeys,
}
