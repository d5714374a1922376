//! # Gateway Contracts
//!
//! `LedgerGateway` and `TopicProvisioner` are the only way the engine and
//! the revocation protocol touch the ledger. Both take a [`SendContext`]
//! naming the paying account and the namespace.

use std::sync::Arc;

use async_trait::async_trait;

use pledger_core::{MessageId, Namespace, PolicyId, TopicId};

use crate::account::LedgerAccount;
use crate::error::LedgerError;
use crate::message::{LedgerMessage, MessageDraft, MessageFilter, SubmitReceipt};
use crate::retry::retry_transient;
use crate::topic::{ProvisionedTopic, TopicSpec};

/// Who pays, and in which namespace the message lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendContext {
    /// Paying account.
    pub payer: LedgerAccount,
    /// Isolation scope.
    pub namespace: Namespace,
}

impl SendContext {
    /// Production context.
    pub fn production(payer: LedgerAccount) -> Self {
        Self {
            payer,
            namespace: Namespace::Production,
        }
    }

    /// Context in an explicit namespace.
    pub fn in_namespace(payer: LedgerAccount, namespace: Namespace) -> Self {
        Self { payer, namespace }
    }
}

/// Submit and read ledger messages.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Append `draft` to `topic`.
    async fn submit(
        &self,
        ctx: &SendContext,
        topic: &TopicId,
        draft: MessageDraft,
    ) -> Result<SubmitReceipt, LedgerError>;

    /// Fetch one message, attachment resolved.
    async fn get_message(
        &self,
        ctx: &SendContext,
        id: &MessageId,
    ) -> Result<LedgerMessage, LedgerError>;

    /// Fetch the messages of a topic in ledger order.
    async fn get_messages(
        &self,
        ctx: &SendContext,
        topic: &TopicId,
        filter: MessageFilter,
    ) -> Result<Vec<LedgerMessage>, LedgerError>;

    /// Drop every message and topic of a dry-run sandbox.
    async fn discard_sandbox(&self, policy_id: &PolicyId) -> Result<(), LedgerError>;
}

/// Create and cross-link topics.
#[async_trait]
pub trait TopicProvisioner: Send + Sync {
    /// Create a topic and return its id and keys.
    async fn create_topic(
        &self,
        ctx: &SendContext,
        spec: TopicSpec,
    ) -> Result<ProvisionedTopic, LedgerError>;

    /// Link `a` and `b` in both directions, anchored on `anchor`.
    async fn link_topics(
        &self,
        ctx: &SendContext,
        a: &TopicId,
        b: &TopicId,
        anchor: &MessageId,
    ) -> Result<(), LedgerError>;
}

/// A send context bound to one topic.
#[derive(Clone)]
pub struct MessageSender {
    gateway: Arc<dyn LedgerGateway>,
    ctx: SendContext,
    topic: TopicId,
}

impl MessageSender {
    /// Bind `ctx` to `topic`.
    pub fn bind(gateway: Arc<dyn LedgerGateway>, ctx: SendContext, topic: TopicId) -> Self {
        Self {
            gateway,
            ctx,
            topic,
        }
    }

    /// The bound topic.
    pub fn topic(&self) -> &TopicId {
        &self.topic
    }

    /// The bound context.
    pub fn context(&self) -> &SendContext {
        &self.ctx
    }

    /// Submit to the bound topic, retrying transient failures.
    pub async fn send(&self, draft: MessageDraft) -> Result<SubmitReceipt, LedgerError> {
        let receipt = retry_transient(|| {
            let draft = draft.clone();
            async move { self.gateway.submit(&self.ctx, &self.topic, draft).await }
        })
        .await?;
        tracing::debug!(
            topic_id = %self.topic,
            message_id = %receipt.message_id,
            namespace = %self.ctx.namespace,
            action = ?draft.action,
            "ledger message submitted"
        );
        Ok(receipt)
    }
}

impl std::fmt::Debug for MessageSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageSender")
            .field("topic", &self.topic)
            .field("namespace", &self.ctx.namespace)
            .finish()
    }
}
