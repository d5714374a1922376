//! # In-Memory Ledger
//!
//! A process-local ledger honouring namespaces, append-only topics, and
//! derived revocation flags. Fault injection hooks let tests fail a chosen
//! submission or topic creation to exercise recovery paths.
//!
//! A sandbox namespace sees production topics: the first touch of a
//! production topic from `DryRun(p)` mirrors its record (without links) into
//! the sandbox, and everything written there stays in the sandbox.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use pledger_core::{MessageId, Namespace, PolicyId, TopicId};
use pledger_crypto::Ed25519KeyPair;

use crate::error::LedgerError;
use crate::gateway::{LedgerGateway, SendContext, TopicProvisioner};
use crate::message::{
    ContentLocator, LedgerMessage, MessageAction, MessageDraft, MessageFilter, SubmitReceipt,
};
use crate::topic::{ProvisionedTopic, TopicKeys, TopicSpec, TopicType};

/// Consensus-second prefix of generated message ids.
const EPOCH_PREFIX: u64 = 1_706_000_000;

/// A topic as the in-memory ledger stores it.
#[derive(Debug, Clone)]
pub struct TopicRecord {
    /// Creation request.
    pub spec: TopicSpec,
    /// Links to other topics, with their anchoring message.
    pub links: Vec<(TopicId, MessageId)>,
}

#[derive(Debug, Default)]
struct Space {
    topics: BTreeMap<TopicId, TopicRecord>,
    messages: Vec<LedgerMessage>,
    blobs: HashMap<String, Vec<u8>>,
}

#[derive(Debug)]
struct FailRule {
    action: MessageAction,
    remaining_successes: usize,
}

#[derive(Debug, Default)]
struct LedgerState {
    next_topic: u64,
    next_seq: u64,
    spaces: HashMap<Namespace, Space>,
    fail_submissions: Vec<FailRule>,
    fail_topic_types: Vec<TopicType>,
}

/// Process-local ledger.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
}

impl MemoryLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the submission of `action` after `successes` successful ones.
    /// The rule fires once.
    pub fn fail_submission(&self, action: MessageAction, successes: usize) {
        self.state.lock().fail_submissions.push(FailRule {
            action,
            remaining_successes: successes,
        });
    }

    /// Fail the next creation of a topic of type `topic_type`.
    pub fn fail_topic_creation(&self, topic_type: TopicType) {
        self.state.lock().fail_topic_types.push(topic_type);
    }

    /// Topics of one type in a namespace.
    pub fn topics_of_type(&self, namespace: &Namespace, topic_type: TopicType) -> Vec<TopicId> {
        let state = self.state.lock();
        state
            .spaces
            .get(namespace)
            .map(|s| {
                s.topics
                    .iter()
                    .filter(|(_, r)| r.spec.topic_type == topic_type)
                    .map(|(id, _)| id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// A stored topic.
    pub fn topic(&self, namespace: &Namespace, topic_id: &TopicId) -> Option<TopicRecord> {
        let state = self.state.lock();
        state.spaces.get(namespace)?.topics.get(topic_id).cloned()
    }

    /// Every message in a namespace carrying `action`, in ledger order.
    pub fn messages_with_action(
        &self,
        namespace: &Namespace,
        action: MessageAction,
    ) -> Vec<LedgerMessage> {
        let state = self.state.lock();
        state
            .spaces
            .get(namespace)
            .map(|s| {
                s.messages
                    .iter()
                    .filter(|m| m.action == action)
                    .map(|m| with_revoked_flag(s, m.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether any data exists for `namespace`.
    pub fn has_namespace(&self, namespace: &Namespace) -> bool {
        self.state.lock().spaces.contains_key(namespace)
    }

    /// Create a topic directly, bypassing fault injection. Used to seed
    /// account root topics.
    pub fn seed_topic(&self, namespace: Namespace, spec: TopicSpec) -> TopicId {
        let mut state = self.state.lock();
        let id = next_topic_id(&mut state);
        state.spaces.entry(namespace).or_default().topics.insert(
            id.clone(),
            TopicRecord {
                spec,
                links: Vec::new(),
            },
        );
        id
    }

    /// Append a message directly, bypassing fault injection.
    pub fn seed_message(
        &self,
        namespace: Namespace,
        topic: &TopicId,
        draft: MessageDraft,
    ) -> Result<MessageId, LedgerError> {
        let mut state = self.state.lock();
        append(&mut state, namespace, topic, draft).map(|r| r.message_id)
    }
}

impl LedgerState {
    fn space_with_topic(
        &mut self,
        namespace: Namespace,
        topic: &TopicId,
    ) -> Result<&mut Space, LedgerError> {
        if namespace.is_dry_run() {
            let mirrored = self
                .spaces
                .get(&Namespace::Production)
                .and_then(|p| p.topics.get(topic))
                .map(|r| TopicRecord {
                    spec: r.spec.clone(),
                    links: Vec::new(),
                });
            if let Some(record) = mirrored {
                self.spaces
                    .entry(namespace)
                    .or_default()
                    .topics
                    .entry(topic.clone())
                    .or_insert(record);
            }
        }
        self.spaces
            .get_mut(&namespace)
            .filter(|s| s.topics.contains_key(topic))
            .ok_or_else(|| LedgerError::TopicNotFound(topic.clone()))
    }
}

fn next_topic_id(state: &mut LedgerState) -> TopicId {
    state.next_topic += 1;
    TopicId(format!("0.0.{}", 1000 + state.next_topic))
}

fn with_revoked_flag(space: &Space, mut msg: LedgerMessage) -> LedgerMessage {
    msg.revoked = space
        .messages
        .iter()
        .any(|m| m.revocation.as_ref().is_some_and(|r| r.target == msg.id));
    msg
}

fn append(
    state: &mut LedgerState,
    namespace: Namespace,
    topic: &TopicId,
    draft: MessageDraft,
) -> Result<SubmitReceipt, LedgerError> {
    state.next_seq += 1;
    let seq = state.next_seq;
    let space = state.space_with_topic(namespace, topic)?;

    let id = MessageId(format!("{EPOCH_PREFIX}.{seq:09}"));
    let locator = draft.attachment.as_ref().map(|bytes| {
        let cid: String = Sha256::digest(bytes)
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        space.blobs.insert(cid.clone(), bytes.clone());
        ContentLocator {
            url: format!("ipfs://{cid}"),
            cid,
        }
    });

    space.messages.push(LedgerMessage {
        id: id.clone(),
        topic_id: topic.clone(),
        message_type: draft.message_type,
        action: draft.action,
        payload: draft.payload,
        relationships: draft.relationships,
        version: draft.version,
        locator: locator.clone(),
        attachment: None,
        revocation: draft.revocation,
        revoked: false,
    });
    Ok(SubmitReceipt {
        message_id: id,
        locator,
    })
}

#[async_trait]
impl LedgerGateway for MemoryLedger {
    async fn submit(
        &self,
        ctx: &SendContext,
        topic: &TopicId,
        draft: MessageDraft,
    ) -> Result<SubmitReceipt, LedgerError> {
        let mut state = self.state.lock();

        let mut fail = false;
        if let Some(pos) = state
            .fail_submissions
            .iter()
            .position(|r| r.action == draft.action)
        {
            if state.fail_submissions[pos].remaining_successes == 0 {
                state.fail_submissions.remove(pos);
                fail = true;
            } else {
                state.fail_submissions[pos].remaining_successes -= 1;
            }
        }
        if fail {
            return Err(LedgerError::SubmissionFailed {
                topic: topic.clone(),
                reason: format!("injected failure for {:?}", draft.action),
            });
        }

        append(&mut state, ctx.namespace, topic, draft)
    }

    async fn get_message(
        &self,
        ctx: &SendContext,
        id: &MessageId,
    ) -> Result<LedgerMessage, LedgerError> {
        let state = self.state.lock();
        let space = state
            .spaces
            .get(&ctx.namespace)
            .ok_or_else(|| LedgerError::MessageNotFound(id.clone()))?;
        let msg = space
            .messages
            .iter()
            .find(|m| &m.id == id)
            .cloned()
            .ok_or_else(|| LedgerError::MessageNotFound(id.clone()))?;
        let mut msg = with_revoked_flag(space, msg);
        msg.attachment = msg
            .locator
            .as_ref()
            .and_then(|l| space.blobs.get(&l.cid).cloned());
        Ok(msg)
    }

    async fn get_messages(
        &self,
        ctx: &SendContext,
        topic: &TopicId,
        filter: MessageFilter,
    ) -> Result<Vec<LedgerMessage>, LedgerError> {
        let mut state = self.state.lock();
        let space = state.space_with_topic(ctx.namespace, topic)?;
        let space = &*space;
        Ok(space
            .messages
            .iter()
            .filter(|m| &m.topic_id == topic && filter.matches(m))
            .map(|m| with_revoked_flag(space, m.clone()))
            .collect())
    }

    async fn discard_sandbox(&self, policy_id: &PolicyId) -> Result<(), LedgerError> {
        let removed = self
            .state
            .lock()
            .spaces
            .remove(&Namespace::DryRun(*policy_id))
            .is_some();
        tracing::debug!(policy_id = %policy_id, removed, "sandbox ledger discarded");
        Ok(())
    }
}

#[async_trait]
impl TopicProvisioner for MemoryLedger {
    async fn create_topic(
        &self,
        ctx: &SendContext,
        spec: TopicSpec,
    ) -> Result<ProvisionedTopic, LedgerError> {
        let mut state = self.state.lock();
        if let Some(pos) = state
            .fail_topic_types
            .iter()
            .position(|t| *t == spec.topic_type)
        {
            state.fail_topic_types.remove(pos);
            return Err(LedgerError::Provisioning(format!(
                "injected failure for {:?}",
                spec.topic_type
            )));
        }

        let keys = TopicKeys {
            admin_key: spec
                .need_admin_key
                .then(|| Ed25519KeyPair::generate().seed_hex()),
            submit_key: spec
                .need_submit_key
                .then(|| Ed25519KeyPair::generate().seed_hex()),
        };
        let topic_id = next_topic_id(&mut state);
        state.spaces.entry(ctx.namespace).or_default().topics.insert(
            topic_id.clone(),
            TopicRecord {
                spec,
                links: Vec::new(),
            },
        );
        Ok(ProvisionedTopic { topic_id, keys })
    }

    async fn link_topics(
        &self,
        ctx: &SendContext,
        a: &TopicId,
        b: &TopicId,
        anchor: &MessageId,
    ) -> Result<(), LedgerError> {
        let mut state = self.state.lock();
        state.space_with_topic(ctx.namespace, a)?;
        let space = state.space_with_topic(ctx.namespace, b)?;
        for (from, to) in [(a, b), (b, a)] {
            let record = space
                .topics
                .get_mut(from)
                .ok_or_else(|| LedgerError::TopicNotFound(from.clone()))?;
            record.links.push((to.clone(), anchor.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::LedgerAccount;
    use crate::message::MessageType;
    use pledger_core::Did;
    use serde_json::json;

    fn payer() -> LedgerAccount {
        LedgerAccount {
            account_id: "0.0.5001".into(),
            account_key: "00".repeat(32),
            did: Did::from("did:test:owner"),
        }
    }

    fn vc_draft() -> MessageDraft {
        MessageDraft::new(MessageType::VcDocument, MessageAction::CreateVc, json!({"n": 1}))
    }

    async fn make_topic(ledger: &MemoryLedger, ctx: &SendContext) -> TopicId {
        ledger
            .create_topic(
                ctx,
                TopicSpec::new(TopicType::PolicyTopic, "p", Did::from("did:test:owner")),
            )
            .await
            .unwrap()
            .topic_id
    }

    #[tokio::test]
    async fn test_submit_and_read_in_order() {
        let ledger = MemoryLedger::new();
        let ctx = SendContext::production(payer());
        let topic = make_topic(&ledger, &ctx).await;
        let a = ledger.submit(&ctx, &topic, vc_draft()).await.unwrap();
        let b = ledger.submit(&ctx, &topic, vc_draft()).await.unwrap();
        assert!(a.message_id < b.message_id);
        let msgs = ledger
            .get_messages(&ctx, &topic, MessageFilter::all())
            .await
            .unwrap();
        assert_eq!(
            msgs.iter().map(|m| m.id.clone()).collect::<Vec<_>>(),
            vec![a.message_id, b.message_id]
        );
    }

    #[tokio::test]
    async fn test_attachment_gets_locator() {
        let ledger = MemoryLedger::new();
        let ctx = SendContext::production(payer());
        let topic = make_topic(&ledger, &ctx).await;
        let receipt = ledger
            .submit(&ctx, &topic, vc_draft().with_attachment(vec![1, 2, 3]))
            .await
            .unwrap();
        let locator = receipt.locator.unwrap();
        assert_eq!(locator.url, format!("ipfs://{}", locator.cid));
        let msg = ledger.get_message(&ctx, &receipt.message_id).await.unwrap();
        assert_eq!(msg.attachment, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_revocation_flag_derived() {
        let ledger = MemoryLedger::new();
        let ctx = SendContext::production(payer());
        let topic = make_topic(&ledger, &ctx).await;
        let receipt = ledger.submit(&ctx, &topic, vc_draft()).await.unwrap();
        let original = ledger.get_message(&ctx, &receipt.message_id).await.unwrap();
        assert!(!original.revoked);
        ledger
            .submit(&ctx, &topic, original.revoke("bad data", vec![]))
            .await
            .unwrap();
        let reread = ledger.get_message(&ctx, &receipt.message_id).await.unwrap();
        assert!(reread.revoked);
    }

    #[tokio::test]
    async fn test_namespaces_isolated() {
        let ledger = MemoryLedger::new();
        let policy = PolicyId::new();
        let prod = SendContext::production(payer());
        let sandbox = SendContext::in_namespace(payer(), Namespace::DryRun(policy));
        let topic = make_topic(&ledger, &sandbox).await;
        let receipt = ledger.submit(&sandbox, &topic, vc_draft()).await.unwrap();

        assert!(ledger.get_message(&prod, &receipt.message_id).await.is_err());
        assert!(ledger.submit(&prod, &topic, vc_draft()).await.is_err());

        ledger.discard_sandbox(&policy).await.unwrap();
        assert!(!ledger.has_namespace(&Namespace::DryRun(policy)));
    }

    #[tokio::test]
    async fn test_sandbox_mirrors_production_topic() {
        let ledger = MemoryLedger::new();
        let policy = PolicyId::new();
        let prod = SendContext::production(payer());
        let sandbox = SendContext::in_namespace(payer(), Namespace::DryRun(policy));
        let topic = make_topic(&ledger, &prod).await;

        let receipt = ledger.submit(&sandbox, &topic, vc_draft()).await.unwrap();
        assert!(ledger.get_message(&prod, &receipt.message_id).await.is_err());
        assert!(ledger
            .get_messages(&prod, &topic, MessageFilter::all())
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            ledger
                .get_messages(&sandbox, &topic, MessageFilter::all())
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_injected_submission_failure_fires_once() {
        let ledger = MemoryLedger::new();
        let ctx = SendContext::production(payer());
        let topic = make_topic(&ledger, &ctx).await;
        ledger.fail_submission(MessageAction::CreateVc, 1);
        assert!(ledger.submit(&ctx, &topic, vc_draft()).await.is_ok());
        assert!(matches!(
            ledger.submit(&ctx, &topic, vc_draft()).await,
            Err(LedgerError::SubmissionFailed { .. })
        ));
        assert!(ledger.submit(&ctx, &topic, vc_draft()).await.is_ok());
    }

    #[tokio::test]
    async fn test_link_both_directions() {
        let ledger = MemoryLedger::new();
        let ctx = SendContext::production(payer());
        let a = make_topic(&ledger, &ctx).await;
        let b = make_topic(&ledger, &ctx).await;
        let anchor = MessageId::from("1706000000.000000001");
        ledger.link_topics(&ctx, &a, &b, &anchor).await.unwrap();
        let ns = Namespace::Production;
        assert_eq!(ledger.topic(&ns, &a).unwrap().links, vec![(b.clone(), anchor.clone())]);
        assert_eq!(ledger.topic(&ns, &b).unwrap().links, vec![(a, anchor)]);
    }
}
