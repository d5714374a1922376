//! # Publish and Dry Run
//!
//! Publication runs one sequential pipeline inside a single failure
//! boundary. The same pipeline drives a dry run, bound to the policy's
//! sandbox namespace:
//!
//! | Step | Publish | Dry run |
//! |------|---------|---------|
//! | schemas | published, IRIs pinned | pushed to the sandbox, left DRAFT |
//! | block ids | regenerated | regenerated |
//! | archive | encoded | encoded |
//! | tokens | `UseToken` per referenced token | skipped |
//! | instance topic | created, or reused after `PUBLISH_ERROR` | created in the sandbox |
//! | synchronization topic | created, or reused after `PUBLISH_ERROR` | skipped |
//! | publish message | definition topic | sandbox copy of the definition topic |
//! | topic link | instance ↔ definition | instance ↔ definition (sandbox) |
//! | credential | production document | sandbox document |
//!
//! Before a production run the store reserves `(uuid, version)` for the
//! row; a dry-running row whose version is taken keeps its sandbox.
//! `validate_and_publish` also requires the version to exceed every version
//! already published under the uuid. A failed run demotes the row to
//! `PUBLISH_ERROR` with its version cleared; a failed dry run discards the
//! sandbox and leaves the row as it was.

use std::cmp::Ordering;

use serde_json::{json, Value};

use pledger_core::{
    check_version_format, version_compare, Did, MessageId, Namespace, PolicyId, TopicId,
    ValidationReport,
};
use pledger_ledger::{
    LedgerAccount, MessageAction, MessageDraft, MessageType, SendContext, TopicSpec, TopicType,
};
use pledger_state::PolicyStatus;
use pledger_store::{Document, DocumentKind, Policy, StoreError, Topic, VirtualUser};
use pledger_vc::with_schema_context;

use crate::archive::PolicyArchive;
use crate::engine::{policy_message, PolicyEngine};
use crate::error::EngineError;
use crate::schema::{dry_run_schemas, publish_schemas};
use crate::tree::{find_all_entities, regenerate_ids, TOKEN_FIELDS};
use crate::worker::ModelTarget;

/// Username of the sandbox identity created by a dry run.
pub const DRY_RUN_ADMINISTRATOR: &str = "Administrator";

/// Outcome of [`PolicyEngine::validate_and_publish`].
#[derive(Debug, Clone)]
pub struct PublishResult {
    /// The policy row after the call.
    pub policy: Policy,
    /// Whether every block validated.
    pub is_valid: bool,
    /// The worker's validation report.
    pub errors: ValidationReport,
}

impl PolicyEngine {
    /// Check the preconditions, validate the blocks through a worker, and
    /// publish if they pass. An invalid report is returned without touching
    /// the ledger or the row.
    pub async fn validate_and_publish(
        &self,
        policy_id: &PolicyId,
        version: &str,
        owner: &Did,
    ) -> Result<PublishResult, EngineError> {
        let policy = self.load_policy(policy_id).await?;
        if !policy.has_config() {
            return Err(EngineError::EmptyConfig);
        }
        if policy.status == PolicyStatus::Publish {
            return Err(EngineError::AlreadyPublished);
        }
        check_version_format(version)
            .map_err(|_| EngineError::InvalidVersionFormat(version.to_string()))?;
        let previous = highest_version(
            policy.previous_version.clone(),
            self.highest_published_version(&policy.uuid).await?,
        )
        .unwrap_or_default();
        if version_compare(version, &previous) != Ordering::Greater {
            return Err(EngineError::VersionNotGreater {
                version: version.to_string(),
                previous,
            });
        }

        self.check_version_free(&policy, version).await?;

        let report = self.validate_model(ModelTarget::Stored(*policy_id)).await?;
        if !report.is_valid() {
            tracing::info!(
                policy_id = %policy_id,
                invalid_blocks = report.invalid_blocks().count(),
                "policy failed block validation"
            );
            return Ok(PublishResult {
                policy,
                is_valid: false,
                errors: report,
            });
        }

        let policy = self.publish(policy_id, owner, version).await?;
        if let Err(e) = self.generate_model(&policy.id).await {
            tracing::warn!(policy_id = %policy_id, error = %e, "published policy worker did not start");
        }
        Ok(PublishResult {
            policy,
            is_valid: true,
            errors: report,
        })
    }

    /// Fail with `DuplicateVersion` if another row holds `(uuid, version)`.
    async fn check_version_free(&self, policy: &Policy, version: &str) -> Result<(), EngineError> {
        let mut taken = self
            .deps
            .store
            .count_policies_with_version(&policy.uuid, version)
            .await?;
        // A dry run records its version on the row without reserving it.
        if policy.status == PolicyStatus::DryRun && policy.version.as_deref() == Some(version) {
            taken = taken.saturating_sub(1);
        }
        if taken > 0 {
            return Err(EngineError::DuplicateVersion {
                uuid: policy.uuid.clone(),
                version: version.to_string(),
            });
        }
        Ok(())
    }

    /// Highest version any row sharing `uuid` has published.
    pub(crate) async fn highest_published_version(
        &self,
        uuid: &str,
    ) -> Result<Option<String>, EngineError> {
        let rows = self.deps.store.get_policies_by_uuid(uuid).await?;
        Ok(rows
            .into_iter()
            .filter(|p| p.status == PolicyStatus::Publish)
            .filter_map(|p| p.version)
            .fold(None, |best, v| highest_version(best, Some(v))))
    }

    /// Publish `policy_id` as `version`. A dry-running policy leaves its
    /// sandbox first.
    pub async fn publish(
        &self,
        policy_id: &PolicyId,
        owner: &Did,
        version: &str,
    ) -> Result<Policy, EngineError> {
        let mut policy = self.load_policy(policy_id).await?;
        if policy.status == PolicyStatus::Publish {
            return Err(EngineError::AlreadyPublished);
        }
        if &policy.owner != owner {
            return Err(EngineError::PermissionDenied { action: "publish" });
        }
        if policy.status == PolicyStatus::DryRun {
            // The sandbox stays intact when the version is already taken.
            self.check_version_free(&policy, version).await?;
            self.leave_sandbox(&mut policy).await?;
            policy = self.deps.store.update_policy(policy).await?;
        }

        let reserved = self
            .deps
            .store
            .reserve_policy_version(&policy.id, &policy.uuid, version)
            .await;
        if let Err(e) = reserved {
            if policy.status == PolicyStatus::DryRun {
                // Lost the race after the sandbox was torn down.
                policy.transition(PolicyStatus::Draft, format!("version {version} taken"))?;
                self.deps.store.update_policy(policy).await?;
            }
            return Err(match e {
                StoreError::DuplicateVersion { uuid, version } => {
                    EngineError::DuplicateVersion { uuid, version }
                }
                other => other.into(),
            });
        }
        policy.version = Some(version.to_string());
        tracing::info!(policy_id = %policy_id, version, "publishing policy");

        match self.run_pipeline(&mut policy, Namespace::Production).await {
            Ok(()) => {
                policy.transition(PolicyStatus::Publish, format!("published version {version}"))?;
                let policy = self.deps.store.update_policy(policy).await?;
                tracing::info!(
                    policy_id = %policy_id,
                    version,
                    instance_topic_id = ?policy.instance_topic_id,
                    "policy published"
                );
                Ok(policy)
            }
            Err(e) => {
                tracing::error!(policy_id = %policy_id, version, error = %e, "policy publish failed");
                policy.transition(PolicyStatus::PublishError, e.to_string())?;
                policy.version = None;
                self.deps.store.update_policy(policy).await?;
                Err(e)
            }
        }
    }

    /// Run the publication pipeline in the policy's sandbox, mark it
    /// `DRY_RUN`, and start its sandbox worker.
    pub async fn dry_run(
        &self,
        policy_id: &PolicyId,
        owner: &Did,
        version: &str,
    ) -> Result<Policy, EngineError> {
        let mut policy = self.load_policy(policy_id).await?;
        if &policy.owner != owner {
            return Err(EngineError::PermissionDenied { action: "dry run" });
        }
        if !policy.has_config() {
            return Err(EngineError::EmptyConfig);
        }
        check_version_format(version)
            .map_err(|_| EngineError::InvalidVersionFormat(version.to_string()))?;
        if !policy.status.can_transition_to(PolicyStatus::DryRun) {
            return Err(EngineError::InvalidStatus(format!(
                "Policy in status {} cannot start a dry run",
                policy.status
            )));
        }

        let namespace = Namespace::DryRun(policy.id);
        policy.version = Some(version.to_string());
        tracing::info!(policy_id = %policy_id, version, "starting dry run");

        match self.run_dry_run(&mut policy, namespace, version).await {
            Ok(policy) => {
                tracing::info!(policy_id = %policy_id, "dry run started");
                if let Err(e) = self.generate_model(&policy.id).await {
                    tracing::warn!(policy_id = %policy_id, error = %e, "sandbox worker did not start");
                }
                Ok(policy)
            }
            Err(e) => {
                tracing::error!(policy_id = %policy_id, error = %e, "dry run failed, discarding sandbox");
                if let Err(cleanup) = self.discard_sandbox(&policy.id).await {
                    tracing::warn!(policy_id = %policy_id, error = %cleanup, "sandbox cleanup failed");
                }
                Err(e)
            }
        }
    }

    /// Return a dry-running policy to `DRAFT`, dropping its sandbox.
    pub async fn stop_dry_run(&self, policy_id: &PolicyId, owner: &Did) -> Result<Policy, EngineError> {
        let mut policy = self.load_policy(policy_id).await?;
        if &policy.owner != owner {
            return Err(EngineError::PermissionDenied { action: "stop" });
        }
        if policy.status != PolicyStatus::DryRun {
            return Err(EngineError::InvalidStatus("Policy is not in dry run".into()));
        }
        self.leave_sandbox(&mut policy).await?;
        policy.transition(PolicyStatus::Draft, "dry run stopped")?;
        let policy = self.deps.store.update_policy(policy).await?;
        tracing::info!(policy_id = %policy_id, "dry run stopped");
        Ok(policy)
    }

    // ─── Internals ──────────────────────────────────────────────────

    /// Stop the sandbox worker, drop the sandbox, and forget what the dry
    /// run recorded on the row. The row is not persisted.
    async fn leave_sandbox(&self, policy: &mut Policy) -> Result<(), EngineError> {
        self.destroy_model(&policy.id).await?;
        self.discard_sandbox(&policy.id).await?;
        policy.version = None;
        policy.instance_topic_id = None;
        policy.message_id = None;
        Ok(())
    }

    async fn run_dry_run(
        &self,
        policy: &mut Policy,
        namespace: Namespace,
        version: &str,
    ) -> Result<Policy, EngineError> {
        self.run_pipeline(policy, namespace).await?;
        self.create_sandbox_administrator(policy).await?;
        policy.transition(PolicyStatus::DryRun, format!("dry run of version {version}"))?;
        Ok(self.deps.store.update_policy(policy.clone()).await?)
    }

    async fn discard_sandbox(&self, policy_id: &PolicyId) -> Result<(), EngineError> {
        self.deps.store.clear_dry_run(policy_id).await?;
        self.deps.ledger.discard_sandbox(policy_id).await?;
        Ok(())
    }

    async fn create_sandbox_administrator(&self, policy: &Policy) -> Result<(), EngineError> {
        let root = self.root_account(&policy.owner).await?;
        self.deps
            .store
            .create_virtual_user(VirtualUser {
                policy_id: policy.id,
                username: DRY_RUN_ADMINISTRATOR.to_string(),
                did: root.did,
                account_id: root.account_id,
                account_key: root.account_key,
                active: true,
            })
            .await?;
        Ok(())
    }

    async fn run_pipeline(&self, policy: &mut Policy, namespace: Namespace) -> Result<(), EngineError> {
        let production = namespace == Namespace::Production;
        let store = self.deps.store.as_ref();
        let root = self.root_account(&policy.owner).await?;
        let definition = self.definition_topic(policy).await?;
        let ctx = SendContext::in_namespace(root.clone(), namespace);
        let definition_sender = self.sender(ctx.clone(), definition.topic_id.clone());

        if production {
            let summary =
                publish_schemas(store, &definition_sender, &mut policy.config, &definition.topic_id)
                    .await?;
            tracing::info!(
                policy_id = %policy.id,
                published = summary.published,
                skipped = summary.skipped,
                "policy schemas published"
            );
        } else {
            let sent = dry_run_schemas(store, &definition_sender, &definition.topic_id).await?;
            tracing::debug!(policy_id = %policy.id, sent, "sandbox schemas pushed");
        }
        regenerate_ids(&mut policy.config);

        let token_ids = find_all_entities(&policy.config, TOKEN_FIELDS);
        let tokens = store.get_tokens(&token_ids, &policy.owner).await?;
        let archive = PolicyArchive {
            policy: policy.clone(),
            schemas: store.get_schemas_by_topic(&definition.topic_id).await?,
            tokens: tokens.clone(),
            artifacts: self.load_artifacts(&policy.id).await?,
        }
        .encode(self.config.archive_compression_level)?;

        if production {
            for token in &tokens {
                definition_sender
                    .send(MessageDraft::new(
                        MessageType::Token,
                        MessageAction::UseToken,
                        json!({
                            "tokenId": token.token_id,
                            "name": token.name,
                            "symbol": token.symbol,
                            "owner": token.owner,
                        }),
                    ))
                    .await?;
            }
        }

        let reuse = policy.status == PolicyStatus::PublishError;
        let instance = self
            .instance_topic(
                &ctx,
                policy,
                TopicType::InstancePolicyTopic,
                policy.instance_topic_id.clone().filter(|_| reuse),
                definition.topic_id.clone(),
            )
            .await?;
        policy.instance_topic_id = Some(instance.topic_id.clone());
        if production {
            let sync = self
                .instance_topic(
                    &ctx,
                    policy,
                    TopicType::SynchronizationTopic,
                    policy.synchronization_topic_id.clone().filter(|_| reuse),
                    instance.topic_id.clone(),
                )
                .await?;
            policy.synchronization_topic_id = Some(sync.topic_id);
        }

        let version = policy.version.clone().unwrap_or_default();
        let receipt = definition_sender
            .send(
                MessageDraft::new(
                    MessageType::InstancePolicy,
                    MessageAction::PublishPolicy,
                    policy_message(policy),
                )
                .with_version(version.clone())
                .with_attachment(archive),
            )
            .await?;
        let locator = receipt
            .locator
            .ok_or_else(|| EngineError::InvalidMessage("publish message has no content locator".into()))?;
        policy.message_id = Some(receipt.message_id.clone());
        self.deps
            .topics
            .link_topics(&ctx, &instance.topic_id, &definition.topic_id, &receipt.message_id)
            .await?;

        let mut subject = json!({
            "id": receipt.message_id,
            "name": policy.name,
            "description": policy.description,
            "topicDescription": policy.topic_description,
            "version": version,
            "policyTag": policy.policy_tag,
            "owner": policy.owner,
            "cid": locator.cid,
            "url": locator.url,
            "uuid": policy.uuid,
            "operation": "PUBLISH",
        });
        if let Some(schema) = store.get_policy_schema(&definition.topic_id).await? {
            if let Some(context_url) = &schema.context_url {
                subject = with_schema_context(subject, context_url, schema.iri.trim_start_matches('#'));
            }
        }
        self.record_credential(&root, policy, namespace, subject, &definition.topic_id, &receipt.message_id)
            .await
    }

    async fn instance_topic(
        &self,
        ctx: &SendContext,
        policy: &Policy,
        topic_type: TopicType,
        existing: Option<TopicId>,
        parent: TopicId,
    ) -> Result<Topic, EngineError> {
        if let Some(id) = existing {
            if let Some(topic) = self.deps.store.get_topic(&ctx.namespace, &id).await? {
                tracing::info!(policy_id = %policy.id, topic_id = %id, ?topic_type, "reusing topic");
                return Ok(topic);
            }
            tracing::warn!(policy_id = %policy.id, topic_id = %id, "recorded topic does not resolve");
        }
        let spec = TopicSpec::new(topic_type, policy.name.clone(), policy.owner.clone())
            .described(policy.topic_description.clone())
            .for_policy(policy.id, policy.uuid.clone())
            .keys(true, false);
        let provisioned = self.deps.topics.create_topic(ctx, spec.clone()).await?;
        let topic = Topic::provisioned(provisioned, &spec, Some(parent));
        self.deps.store.save_topic(&ctx.namespace, topic.clone()).await?;
        tracing::info!(policy_id = %policy.id, topic_id = %topic.topic_id, ?topic_type, "topic created");
        Ok(topic)
    }

    async fn record_credential(
        &self,
        root: &LedgerAccount,
        policy: &Policy,
        namespace: Namespace,
        subject: Value,
        topic_id: &TopicId,
        message_id: &MessageId,
    ) -> Result<(), EngineError> {
        let vc = self
            .deps
            .issuer
            .issue(&root.did, &root.account_key, subject)
            .await?;
        let mut document = Document::new(DocumentKind::Vc, policy.owner.clone(), vc.to_json_tree()?);
        document.hash = Some(vc.credential_hash()?);
        document.policy_id = Some(policy.id);
        document.message_id = Some(message_id.clone());
        document.topic_id = Some(topic_id.clone());
        document.entity_type = Some("POLICY".to_string());
        self.deps.store.save_document(&namespace, document).await?;
        Ok(())
    }
}

/// The greater of two optional versions under [`version_compare`].
pub(crate) fn highest_version(a: Option<String>, b: Option<String>) -> Option<String> {
    match (a, b) {
        (Some(a), Some(b)) if version_compare(&b, &a) == Ordering::Greater => Some(b),
        (Some(a), _) => Some(a),
        (None, b) => b,
    }
}
