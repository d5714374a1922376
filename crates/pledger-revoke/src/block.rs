//! # Revoke Block
//!
//! Workflow block that withdraws a document and its dependants. Options are
//! authored as block JSON:
//!
//! ```json
//! { "uiMetaData": { "updatePrevDoc": true, "prevDocStatus": "Rejected" } }
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use pledger_core::{Did, MessageId, Namespace, PolicyId, Timestamp, ValidationResultsContainer};
use pledger_ledger::{AccountResolver, LedgerGateway, MessageFilter, MessageSender, SendContext};
use pledger_state::DocumentStatus;
use pledger_store::{Document, DocumentState, PolicyStore};

use crate::error::RevokeError;
use crate::events::{BlockEvent, BlockEventSink};
use crate::graph::{MessageGraph, RevocationPlan};

const UI_META_DATA_NOT_SET: &str = "Option \"uiMetaData\" does not set";
const STATUS_VALUE_NOT_SET: &str = "Option \"Status Value\" does not set";

// ─── Options ────────────────────────────────────────────────────────

/// Display-side block options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiMetaData {
    /// Overwrite the status of the trigger's preceding document.
    #[serde(default)]
    pub update_prev_doc: bool,
    /// Status written to the preceding document.
    #[serde(default)]
    pub prev_doc_status: Option<String>,
}

/// Parsed and checked revoke-block options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevokeOptions {
    /// Options as authored.
    pub ui_meta_data: UiMetaData,
    prev_doc_status: Option<DocumentStatus>,
}

impl RevokeOptions {
    /// Parse block options.
    pub fn parse(options: &Value) -> Result<Self, RevokeError> {
        let ui = match options.get("uiMetaData") {
            Some(ui) if ui.is_object() => ui.clone(),
            _ => return Err(RevokeError::InvalidOptions(UI_META_DATA_NOT_SET.into())),
        };
        let ui_meta_data: UiMetaData = serde_json::from_value(ui)
            .map_err(|e| RevokeError::InvalidOptions(format!("Option \"uiMetaData\" is malformed: {e}")))?;

        let prev_doc_status = if ui_meta_data.update_prev_doc {
            let name = ui_meta_data
                .prev_doc_status
                .as_deref()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| RevokeError::InvalidOptions(STATUS_VALUE_NOT_SET.into()))?;
            let status = DocumentStatus::parse(name)
                .map_err(|e| RevokeError::InvalidOptions(format!("Option \"Status Value\": {e}")))?;
            Some(status)
        } else {
            None
        };

        Ok(Self {
            ui_meta_data,
            prev_doc_status,
        })
    }

    /// Author-time check. Problems are recorded against `block_id`.
    pub fn validate(block_id: &str, options: &Value, results: &mut ValidationResultsContainer) {
        if let Err(err) = Self::parse(options) {
            results.add_block_error(block_id, err.to_string());
        }
    }

    /// Status for the preceding document, when an update is requested.
    pub fn prev_doc_status(&self) -> Option<DocumentStatus> {
        self.prev_doc_status
    }
}

// ─── Block ──────────────────────────────────────────────────────────

/// What one run revoked and updated.
#[derive(Debug, Clone, PartialEq)]
pub struct RevocationOutcome {
    /// The executed plan.
    pub plan: RevocationPlan,
    /// Local documents marked `Revoked`.
    pub documents: Vec<Document>,
    /// Preceding document whose status was overwritten.
    pub previous: Option<Document>,
}

/// Collaborators of a revoke block.
#[derive(Clone)]
pub struct BlockServices {
    pub ledger: Arc<dyn LedgerGateway>,
    pub accounts: Arc<dyn AccountResolver>,
    pub store: Arc<dyn PolicyStore>,
    pub events: Arc<dyn BlockEventSink>,
}

/// A configured revoke block inside one policy instance.
pub struct RevokeBlock {
    tag: String,
    policy_id: PolicyId,
    namespace: Namespace,
    options: RevokeOptions,
    services: BlockServices,
}

impl RevokeBlock {
    /// A block operating on production data.
    pub fn new(
        tag: impl Into<String>,
        policy_id: PolicyId,
        options: RevokeOptions,
        services: BlockServices,
    ) -> Self {
        Self {
            tag: tag.into(),
            policy_id,
            namespace: Namespace::Production,
            options,
            services,
        }
    }

    /// Operate in `namespace` instead (a dry-run sandbox).
    pub fn in_namespace(mut self, namespace: Namespace) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Revoke `trigger` and every message derived from it, paid for by
    /// `user`. The trigger's `comment` is the revocation reason.
    pub async fn run_action(
        &self,
        user: &Did,
        trigger: &Document,
    ) -> Result<RevocationOutcome, RevokeError> {
        let trigger_id = trigger
            .message_id
            .clone()
            .ok_or_else(|| RevokeError::NotAnchored(trigger.id.to_string()))?;
        let comment = trigger.comment.clone().unwrap_or_default();

        let payer = self.services.accounts.user_account(user).await?;
        let ctx = SendContext::in_namespace(payer, self.namespace);

        let graph = self.snapshot(&ctx).await?;
        let plan = graph.plan(&trigger_id)?;
        info!(
            policy_id = %self.policy_id,
            message_id = %trigger_id,
            planned = plan.len(),
            skipped = plan.skipped.len(),
            "revocation planned"
        );

        let mut revoked: Vec<MessageId> = Vec::with_capacity(plan.len());
        let mut failure = None;
        for entry in &plan.entries {
            let Some(message) = graph.get(&entry.message_id) else {
                continue;
            };
            let sender = MessageSender::bind(
                self.services.ledger.clone(),
                ctx.clone(),
                entry.topic_id.clone(),
            );
            match sender.send(message.revoke(&comment, entry.parent_ids.clone())).await {
                Ok(_) => revoked.push(entry.message_id.clone()),
                Err(source) => {
                    failure = Some(source);
                    break;
                }
            }
        }

        let documents = self.mark_revoked(&revoked, &comment).await?;

        if let Some(source) = failure {
            warn!(
                policy_id = %self.policy_id,
                revoked = revoked.len(),
                total = plan.len(),
                error = %source,
                "revocation stopped part way"
            );
            return Err(RevokeError::Partial {
                revoked: revoked.len(),
                total: plan.len(),
                source,
            });
        }

        let previous = match self.options.prev_doc_status() {
            Some(status) => self.update_previous(trigger, status).await?,
            None => None,
        };

        self.notify(user, &documents).await;
        info!(
            policy_id = %self.policy_id,
            message_id = %trigger_id,
            revoked = revoked.len(),
            documents = documents.len(),
            "revocation complete"
        );

        Ok(RevocationOutcome {
            plan,
            documents,
            previous,
        })
    }

    /// Every message on the policy's topics, in consensus order.
    async fn snapshot(&self, ctx: &SendContext) -> Result<MessageGraph, RevokeError> {
        let topics = self
            .services
            .store
            .get_policy_topics(&self.namespace, &self.policy_id)
            .await?;
        let mut messages = Vec::new();
        for topic in &topics {
            messages.extend(
                self.services
                    .ledger
                    .get_messages(ctx, &topic.topic_id, MessageFilter::all())
                    .await?,
            );
        }
        messages.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(MessageGraph::new(messages))
    }

    async fn mark_revoked(
        &self,
        message_ids: &[MessageId],
        comment: &str,
    ) -> Result<Vec<Document>, RevokeError> {
        if message_ids.is_empty() {
            return Ok(Vec::new());
        }
        let store = &self.services.store;
        let found = store
            .get_documents_by_message_ids(&self.namespace, message_ids)
            .await?;

        let mut updated = Vec::with_capacity(found.len());
        for mut doc in found {
            if let Err(err) = DocumentStatus::check_overwrite(doc.status, DocumentStatus::Revoked) {
                warn!(document_id = %doc.id, error = %err, "document left as is");
                continue;
            }
            doc.status = Some(DocumentStatus::Revoked);
            doc.comment = Some(comment.to_string());
            store.save_document(&self.namespace, doc.clone()).await?;
            updated.push(doc);
        }
        Ok(updated)
    }

    /// Overwrite the status of the most recently anchored document among
    /// the trigger's declared predecessors.
    async fn update_previous(
        &self,
        trigger: &Document,
        status: DocumentStatus,
    ) -> Result<Option<Document>, RevokeError> {
        if trigger.relationships.is_empty() {
            return Ok(None);
        }
        let store = &self.services.store;
        let candidates = store
            .get_documents_by_message_ids(&self.namespace, &trigger.relationships)
            .await?;
        let Some(mut previous) = candidates
            .into_iter()
            .max_by(|a, b| a.message_id.cmp(&b.message_id))
        else {
            return Ok(None);
        };

        if let Err(err) = DocumentStatus::check_overwrite(previous.status, status) {
            warn!(document_id = %previous.id, error = %err, "preceding document left as is");
            return Ok(None);
        }
        previous.status = Some(status);
        store.save_document(&self.namespace, previous.clone()).await?;
        store
            .save_document_state(
                &self.namespace,
                DocumentState {
                    document_id: previous.id,
                    status,
                    created_at: Timestamp::now(),
                },
            )
            .await?;
        Ok(Some(previous))
    }

    async fn notify(&self, user: &Did, documents: &[Document]) {
        let events = &self.services.events;
        events
            .emit(BlockEvent::Run {
                block_tag: self.tag.clone(),
                user: user.clone(),
                documents: documents.to_vec(),
            })
            .await;
        events
            .emit(BlockEvent::Release {
                block_tag: self.tag.clone(),
                user: user.clone(),
            })
            .await;
        events
            .emit(BlockEvent::External {
                block_tag: self.tag.clone(),
                user: user.clone(),
                documents: documents.to_vec(),
            })
            .await;
    }
}
