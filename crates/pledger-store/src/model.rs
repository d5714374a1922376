//! # Entity Model
//!
//! Rows persisted by the store. Field names serialize in camelCase to match
//! the documents exchanged with workflow workers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use pledger_core::{Did, MessageId, PolicyId, StateError, Timestamp, TopicId};
use pledger_ledger::{ProvisionedTopic, TopicKeys, TopicSpec, TopicType};
use pledger_state::{DocumentStatus, PolicyStatus, PolicyTransitionRecord, SchemaStatus};

// ─── Policy ─────────────────────────────────────────────────────────

/// A versioned, ledger-anchored workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    /// Row id.
    pub id: PolicyId,
    /// Stable identity shared by every version of the policy.
    pub uuid: String,
    /// Display name.
    pub name: String,
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Description of the definition topic.
    #[serde(default)]
    pub topic_description: String,
    /// Short machine tag.
    #[serde(default)]
    pub policy_tag: String,
    /// Published version.
    pub version: Option<String>,
    /// Version this row was derived from.
    pub previous_version: Option<String>,
    /// Lifecycle status.
    pub status: PolicyStatus,
    /// Definition topic; immutable once set.
    pub topic_id: Option<TopicId>,
    /// Runtime topic of the published instance.
    pub instance_topic_id: Option<TopicId>,
    /// Coordination topic of the published instance.
    pub synchronization_topic_id: Option<TopicId>,
    /// Current owner.
    pub owner: Did,
    /// Original author.
    pub creator: Did,
    /// Tree of block definitions.
    pub config: Value,
    /// Engine code version that produced the row.
    pub code_version: Option<String>,
    /// Publish message id.
    pub message_id: Option<MessageId>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Status history.
    #[serde(default)]
    pub status_history: Vec<PolicyTransitionRecord>,
}

impl Policy {
    /// A draft with a fresh row id and uuid.
    pub fn draft(name: impl Into<String>, owner: Did, config: Value) -> Self {
        Self {
            id: PolicyId::new(),
            uuid: Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
            topic_description: String::new(),
            policy_tag: String::new(),
            version: None,
            previous_version: None,
            status: PolicyStatus::Draft,
            topic_id: None,
            instance_topic_id: None,
            synchronization_topic_id: None,
            creator: owner.clone(),
            owner,
            config,
            code_version: None,
            message_id: None,
            created_at: Timestamp::now(),
            status_history: Vec::new(),
        }
    }

    /// Move to `to` through the validated transition table.
    pub fn transition(&mut self, to: PolicyStatus, reason: impl Into<String>) -> Result<(), StateError> {
        let record = self.status.transition(to, reason)?;
        self.status_history.push(record);
        self.status = to;
        Ok(())
    }

    /// Whether the config tree holds anything.
    pub fn has_config(&self) -> bool {
        match &self.config {
            Value::Null => false,
            Value::Object(map) => !map.is_empty(),
            _ => true,
        }
    }
}

// ─── Topic ──────────────────────────────────────────────────────────

/// A ledger topic as recorded locally, keys included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    /// Ledger id.
    pub topic_id: TopicId,
    /// Role.
    pub topic_type: TopicType,
    /// Display name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Owning account holder.
    pub owner: Did,
    /// Owning policy.
    pub policy_id: Option<PolicyId>,
    /// Owning policy uuid.
    pub policy_uuid: Option<String>,
    /// Parent topic.
    pub parent: Option<TopicId>,
    /// Private keys.
    pub keys: TopicKeys,
}

impl Topic {
    /// Record a freshly provisioned topic.
    pub fn provisioned(topic: ProvisionedTopic, spec: &TopicSpec, parent: Option<TopicId>) -> Self {
        Self {
            topic_id: topic.topic_id,
            topic_type: spec.topic_type,
            name: spec.name.clone(),
            description: spec.description.clone(),
            owner: spec.owner.clone(),
            policy_id: spec.policy_id,
            policy_uuid: spec.policy_uuid.clone(),
            parent,
            keys: topic.keys,
        }
    }
}

// ─── Artifact ───────────────────────────────────────────────────────

/// A binary file referenced from a policy config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Row id.
    pub id: Uuid,
    /// Blob key, referenced from the config tree.
    pub uuid: String,
    /// Owning policy.
    pub policy_id: Option<PolicyId>,
    /// Owner.
    pub owner: Did,
    /// File name.
    pub name: String,
    /// File extension.
    pub extension: String,
    /// Artifact kind.
    pub artifact_type: String,
}

// ─── Schema ─────────────────────────────────────────────────────────

/// What a schema describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemaEntity {
    /// Unclassified.
    None,
    /// Generic credential.
    Vc,
    /// Credential minted on policy publish.
    Policy,
    /// Account identity.
    StandardRegistry,
}

/// A document schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Row id.
    pub id: Uuid,
    /// Stable identity shared by every version.
    pub uuid: String,
    /// Reference used inside policy configs.
    pub iri: String,
    /// Display name.
    pub name: String,
    /// Published version.
    pub version: Option<String>,
    /// Publication status.
    pub status: SchemaStatus,
    /// What the schema describes.
    pub entity: SchemaEntity,
    /// Topic the schema belongs to.
    pub topic_id: Option<TopicId>,
    /// Owner.
    pub owner: Did,
    /// Copies of system schemas are read-only.
    pub readonly: bool,
    /// Template published into every new policy topic.
    pub system: bool,
    /// Whether a system template is in use.
    pub active: bool,
    /// JSON-LD context URL.
    pub context_url: Option<String>,
    /// Publish message id.
    pub message_id: Option<MessageId>,
    /// JSON schema body.
    pub document: Value,
}

impl Schema {
    /// A draft schema with a fresh uuid.
    pub fn draft(name: impl Into<String>, owner: Did, topic_id: Option<TopicId>) -> Self {
        let uuid = Uuid::new_v4().to_string();
        Self {
            id: Uuid::new_v4(),
            iri: Self::draft_iri(&uuid),
            uuid,
            name: name.into(),
            version: None,
            status: SchemaStatus::Draft,
            entity: SchemaEntity::None,
            topic_id,
            owner,
            readonly: false,
            system: false,
            active: false,
            context_url: None,
            message_id: None,
            document: Value::Null,
        }
    }

    /// IRI of an unpublished schema.
    pub fn draft_iri(uuid: &str) -> String {
        format!("#{uuid}")
    }

    /// IRI of a published schema version.
    pub fn published_iri(uuid: &str, version: &str) -> String {
        format!("#{uuid}&{version}")
    }
}

// ─── Token ──────────────────────────────────────────────────────────

/// A ledger token a policy may reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    /// Ledger token id.
    pub token_id: String,
    /// Display name.
    pub name: String,
    /// Ticker.
    pub symbol: String,
    /// Owner.
    pub owner: Did,
}

// ─── Multi-policy ───────────────────────────────────────────────────

/// Role of an instance in a multi-policy binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MultiPolicyRole {
    /// The instance owning the synchronization topic.
    Main,
    /// An instance joined to a main one.
    Sub,
}

/// Binding of a policy instance into a multi-instance group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiPolicy {
    /// Binding id.
    pub uuid: String,
    /// Instance topic of this policy.
    pub instance_topic_id: TopicId,
    /// Instance topic of the main policy.
    pub main_policy_topic_id: TopicId,
    /// Coordination topic.
    pub synchronization_topic_id: TopicId,
    /// Account that created the binding.
    pub owner: Did,
    /// Ledger account of the acting user.
    pub user: String,
    /// Ledger account of the policy owner.
    pub policy_owner: String,
    /// Main or sub.
    pub role: MultiPolicyRole,
}

// ─── Documents ──────────────────────────────────────────────────────

/// Kind of stored document. Lookups return kinds in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentKind {
    /// Verifiable credential.
    Vc,
    /// Verifiable presentation.
    Vp,
    /// DID document.
    Did,
}

/// Local mirror of a ledger-anchored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Row id.
    pub id: Uuid,
    /// Document kind.
    pub kind: DocumentKind,
    /// Credential hash.
    pub hash: Option<String>,
    /// Owner.
    pub owner: Did,
    /// Policy that produced the document.
    pub policy_id: Option<PolicyId>,
    /// Anchoring ledger message.
    pub message_id: Option<MessageId>,
    /// Topic of the anchoring message.
    pub topic_id: Option<TopicId>,
    /// Predecessor messages.
    #[serde(default)]
    pub relationships: Vec<MessageId>,
    /// Workflow status.
    pub status: Option<DocumentStatus>,
    /// Operator comment (set on revocation).
    pub comment: Option<String>,
    /// Entity type tag (e.g. `POLICY`).
    pub entity_type: Option<String>,
    /// Document body.
    pub document: Value,
    /// Creation time.
    pub created_at: Timestamp,
}

impl Document {
    /// A new document of `kind` with a fresh row id.
    pub fn new(kind: DocumentKind, owner: Did, document: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            hash: None,
            owner,
            policy_id: None,
            message_id: None,
            topic_id: None,
            relationships: Vec::new(),
            status: None,
            comment: None,
            entity_type: None,
            document,
            created_at: Timestamp::now(),
        }
    }
}

/// Audit entry for a document status overwrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentState {
    /// Document row id.
    pub document_id: Uuid,
    /// Status written.
    pub status: DocumentStatus,
    /// When.
    pub created_at: Timestamp,
}

// ─── Users ──────────────────────────────────────────────────────────

/// Role binding of a DID inside a policy instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyGroup {
    /// Policy instance.
    pub policy_id: PolicyId,
    /// Bound identity.
    pub did: Did,
    /// Role name.
    pub role: String,
    /// Group name.
    pub group_name: String,
    /// Whether this is the identity's current group.
    pub active: bool,
}

/// Synthetic identity operating a dry-run sandbox.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualUser {
    /// Sandboxed policy.
    pub policy_id: PolicyId,
    /// Display name.
    pub username: String,
    /// Identity.
    pub did: Did,
    /// Paying account id.
    pub account_id: String,
    /// Paying account key.
    pub account_key: String,
    /// Whether this is the sandbox's current identity.
    pub active: bool,
}

impl std::fmt::Debug for VirtualUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualUser")
            .field("policy_id", &self.policy_id)
            .field("username", &self.username)
            .field("did", &self.did)
            .field("account_id", &self.account_id)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}
