//! # Import from the Ledger
//!
//! A published policy travels as the archive attached to its
//! `InstancePolicy` publish message. Previewing lists the newer versions
//! published on the same definition topic; importing recreates the policy
//! for the caller, optionally as a new version of one they already own.

use std::cmp::Ordering;

use pledger_core::{version_compare, Did, MessageId, TopicId};
use pledger_ledger::{LedgerMessage, MessageAction, MessageFilter, MessageType, SendContext};

use crate::archive::PolicyArchive;
use crate::create::{ImportResult, PolicyOverrides};
use crate::engine::PolicyEngine;
use crate::error::EngineError;

/// A later publication of the same policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRef {
    /// Publish message.
    pub message_id: MessageId,
    /// Published version.
    pub version: String,
}

/// What an import of a publish message would bring in.
#[derive(Debug, Clone)]
pub struct PolicyPreview {
    /// The decoded archive.
    pub archive: PolicyArchive,
    /// Definition topic the message was published on.
    pub topic_id: TopicId,
    /// Newer versions on that topic, newest first.
    pub new_versions: Vec<VersionRef>,
}

impl PolicyEngine {
    /// Decode the archive of `message_id` for `username` without creating
    /// anything.
    pub async fn prepare_preview(
        &self,
        message_id: &MessageId,
        username: &str,
    ) -> Result<PolicyPreview, EngineError> {
        let user = self
            .deps
            .accounts
            .find_user(username)
            .await?
            .ok_or(EngineError::Forbidden)?;
        let did = user.did.ok_or(EngineError::Forbidden)?;
        let ctx = SendContext::production(self.root_account(&did).await?);

        let (message, archive) = self.load_publication(&ctx, message_id).await?;
        let current = message.version.clone().unwrap_or_default();
        let mut new_versions: Vec<VersionRef> = self
            .deps
            .ledger
            .get_messages(
                &ctx,
                &message.topic_id,
                MessageFilter::of(MessageType::InstancePolicy, MessageAction::PublishPolicy),
            )
            .await?
            .into_iter()
            .filter(|m| !m.revoked)
            .filter_map(|m| {
                let version = m.version?;
                (version_compare(&version, &current) == Ordering::Greater).then_some(VersionRef {
                    message_id: m.id,
                    version,
                })
            })
            .collect();
        new_versions.reverse();

        Ok(PolicyPreview {
            archive,
            topic_id: message.topic_id,
            new_versions,
        })
    }

    /// Create a policy for `owner` from the archive of `message_id`. With
    /// `version_of`, the import becomes a new version of the policy whose
    /// definition topic that is.
    pub async fn import_from_message(
        &self,
        message_id: &MessageId,
        owner: &Did,
        version_of: Option<TopicId>,
        overrides: PolicyOverrides,
    ) -> Result<ImportResult, EngineError> {
        let ctx = SendContext::production(self.root_account(owner).await?);
        let (_, archive) = self.load_publication(&ctx, message_id).await?;
        tracing::info!(message_id = %message_id, as_version = version_of.is_some(), "importing policy");
        self.import_archive(archive, owner, version_of, overrides).await
    }

    async fn load_publication(
        &self,
        ctx: &SendContext,
        message_id: &MessageId,
    ) -> Result<(LedgerMessage, PolicyArchive), EngineError> {
        let mut message = self.deps.ledger.get_message(ctx, message_id).await?;
        if message.message_type != MessageType::InstancePolicy {
            return Err(EngineError::InvalidMessage("Invalid Message Type".into()));
        }
        let bytes = message
            .attachment
            .take()
            .filter(|b| !b.is_empty())
            .ok_or_else(|| EngineError::InvalidMessage("file in body is empty".into()))?;
        let archive = PolicyArchive::decode(&bytes)?;
        Ok((message, archive))
    }
}
