//! # Ledger Messages
//!
//! A [`MessageDraft`] is what callers submit; a [`LedgerMessage`] is what the
//! ledger returns once the draft has a consensus id and a topic.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use pledger_core::{MessageId, TopicId};

/// Kind of record carried by a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// Policy definition lifecycle.
    Policy,
    /// A published policy instance (carries the archive).
    InstancePolicy,
    /// Schema publication.
    Schema,
    /// Token announcement.
    Token,
    /// Topic creation and linking.
    Topic,
    /// Cross-instance coordination.
    Synchronization,
    /// Verifiable credential.
    VcDocument,
    /// Verifiable presentation.
    VpDocument,
    /// DID document.
    DidDocument,
}

/// What the message does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageAction {
    /// New policy registered under the owner's topic.
    CreatePolicy,
    /// Policy published (archive attached).
    PublishPolicy,
    /// Draft policy deleted.
    DeletePolicy,
    /// Schema published.
    PublishSchema,
    /// System schema published into a policy topic.
    PublishSystemSchema,
    /// Token referenced by a published policy.
    UseToken,
    /// Topic created or linked.
    CreateTopic,
    /// Multi-policy binding created.
    CreateMultiPolicy,
    /// Credential created.
    CreateVc,
    /// Presentation created.
    CreateVp,
    /// DID document created.
    CreateDid,
    /// Revocation record for an earlier message.
    RevokeDocument,
}

/// Revocation payload: which message is withdrawn, why, and through which
/// predecessors the revocation reached it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Revocation {
    /// The withdrawn message.
    pub target: MessageId,
    /// Operator comment.
    pub reason: String,
    /// Immediate predecessors on the revocation walk.
    pub parent_ids: Vec<MessageId>,
}

/// Off-ledger location of a message attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentLocator {
    /// Content identifier.
    pub cid: String,
    /// Retrieval URL.
    pub url: String,
}

/// A message prepared for submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDraft {
    /// Record kind.
    pub message_type: MessageType,
    /// Record action.
    pub action: MessageAction,
    /// Structured body.
    pub payload: Value,
    /// Messages this one derives from.
    #[serde(default)]
    pub relationships: Vec<MessageId>,
    /// Policy version, for policy messages.
    #[serde(default)]
    pub version: Option<String>,
    /// Binary attachment stored off-ledger.
    #[serde(default, skip_serializing)]
    pub attachment: Option<Vec<u8>>,
    /// Set on revocation records.
    #[serde(default)]
    pub revocation: Option<Revocation>,
}

impl MessageDraft {
    /// A draft with an empty relationship list and no attachment.
    pub fn new(message_type: MessageType, action: MessageAction, payload: Value) -> Self {
        Self {
            message_type,
            action,
            payload,
            relationships: Vec::new(),
            version: None,
            attachment: None,
            revocation: None,
        }
    }

    /// Attach a policy version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Attach binary content.
    pub fn with_attachment(mut self, bytes: Vec<u8>) -> Self {
        self.attachment = Some(bytes);
        self
    }

    /// Declare predecessor messages.
    pub fn with_relationships(mut self, relationships: Vec<MessageId>) -> Self {
        self.relationships = relationships;
        self
    }
}

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    /// Consensus id of the new message.
    pub message_id: MessageId,
    /// Where the attachment landed, if one was sent.
    pub locator: Option<ContentLocator>,
}

/// A message as read back from the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerMessage {
    /// Consensus id.
    pub id: MessageId,
    /// Topic the message lives on.
    pub topic_id: TopicId,
    /// Record kind.
    pub message_type: MessageType,
    /// Record action.
    pub action: MessageAction,
    /// Structured body.
    pub payload: Value,
    /// Messages this one derives from.
    #[serde(default)]
    pub relationships: Vec<MessageId>,
    /// Policy version, for policy messages.
    #[serde(default)]
    pub version: Option<String>,
    /// Attachment location.
    #[serde(default)]
    pub locator: Option<ContentLocator>,
    /// Attachment bytes, when the reader resolved them.
    #[serde(default, skip_serializing)]
    pub attachment: Option<Vec<u8>>,
    /// Set on revocation records.
    #[serde(default)]
    pub revocation: Option<Revocation>,
    /// Derived: a revocation record targeting this message exists.
    #[serde(default)]
    pub revoked: bool,
}

impl LedgerMessage {
    /// Whether this message is itself a revocation record.
    pub fn is_revocation_record(&self) -> bool {
        self.revocation.is_some()
    }

    /// Whether `other` is declared as a predecessor.
    pub fn relates_to(&self, other: &MessageId) -> bool {
        self.relationships.iter().any(|r| r == other)
    }

    /// Build the revocation record withdrawing this message.
    pub fn revoke(&self, reason: &str, parent_ids: Vec<MessageId>) -> MessageDraft {
        MessageDraft {
            message_type: self.message_type,
            action: MessageAction::RevokeDocument,
            payload: Value::Null,
            relationships: Vec::new(),
            version: self.version.clone(),
            attachment: None,
            revocation: Some(Revocation {
                target: self.id.clone(),
                reason: reason.to_string(),
                parent_ids,
            }),
        }
    }
}

/// Selection criteria for topic reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageFilter {
    /// Match this record kind only.
    pub message_type: Option<MessageType>,
    /// Match this action only.
    pub action: Option<MessageAction>,
}

impl MessageFilter {
    /// Every message on the topic.
    pub fn all() -> Self {
        Self::default()
    }

    /// Messages of one kind and action.
    pub fn of(message_type: MessageType, action: MessageAction) -> Self {
        Self {
            message_type: Some(message_type),
            action: Some(action),
        }
    }

    /// Whether `message` passes the filter.
    pub fn matches(&self, message: &LedgerMessage) -> bool {
        self.message_type.map_or(true, |t| t == message.message_type)
            && self.action.map_or(true, |a| a == message.action)
    }
}
