//! # Create, Clone, Delete
//!
//! A new policy gets its own definition topic under the owner's user topic:
//!
//! 1. create the `POLICY_TOPIC` and record its keys,
//! 2. announce `CreatePolicy` on the user topic,
//! 3. link both topics through that message,
//! 4. publish the system schemas into the new topic.
//!
//! A new version of an existing policy reuses the definition topic.

use std::collections::HashMap;

use serde_json::Value;
use uuid::Uuid;

use pledger_core::{Did, Namespace, PolicyId, TopicId};
use pledger_ledger::{
    LedgerAccount, MessageAction, MessageDraft, MessageType, SendContext, TopicSpec, TopicType,
};
use pledger_state::SchemaStatus;
use pledger_store::{Artifact, Policy, Schema, Topic};

use crate::archive::{ArchivedArtifact, PolicyArchive};
use crate::engine::{policy_message, PolicyEngine};
use crate::error::EngineError;
use crate::publish::highest_version;
use crate::schema::publish_system_schemas;
use crate::tree::{find_all_entities, replace_all_entities, replace_artifact_uuids, SCHEMA_FIELDS, TOKEN_FIELDS};

/// Input of [`PolicyEngine::create`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyDraft {
    /// Set when the draft is a new version of an existing policy.
    pub uuid: Option<String>,
    /// Display name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Description of the definition topic.
    pub topic_description: String,
    /// Short machine tag.
    pub policy_tag: String,
    /// Block tree.
    pub config: Value,
    /// Claimed author; must be the owner for new versions.
    pub creator: Option<Did>,
    /// Definition topic of the existing policy, for new versions.
    pub topic_id: Option<TopicId>,
    /// Version the new one derives from.
    pub previous_version: Option<String>,
}

impl PolicyDraft {
    /// A fresh policy.
    pub fn new(name: impl Into<String>, config: Value) -> Self {
        Self {
            name: name.into(),
            config,
            ..Self::default()
        }
    }
}

/// Fields a clone or import may override.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyOverrides {
    /// New name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New topic description.
    pub topic_description: Option<String>,
    /// New tag.
    pub policy_tag: Option<String>,
}

/// A created policy and the problems that did not stop its creation.
#[derive(Debug, Clone)]
pub struct ImportResult {
    /// The new policy row.
    pub policy: Policy,
    /// Non-fatal errors.
    pub errors: Vec<String>,
}

impl PolicyEngine {
    /// Create a draft policy owned by `owner`.
    pub async fn create(&self, draft: PolicyDraft, owner: &Did) -> Result<Policy, EngineError> {
        let artifacts = match &draft.uuid {
            Some(uuid) => {
                let old = self.check_new_version(uuid, draft.creator.as_ref(), owner).await?;
                self.load_artifacts(&old.id).await?
            }
            None => Vec::new(),
        };
        self.create_with_artifacts(draft, owner, artifacts).await
    }

    /// Copy a policy into a brand-new one (fresh uuid, fresh topic), with
    /// its editable schemas and its artifacts.
    pub async fn clone_policy(
        &self,
        policy_id: &PolicyId,
        overrides: PolicyOverrides,
        owner: &Did,
    ) -> Result<ImportResult, EngineError> {
        let source = self.load_policy(policy_id).await?;
        if &source.creator != owner {
            return Err(EngineError::InvalidOwner);
        }
        tracing::info!(policy_id = %policy_id, "cloning policy");

        let schemas = match &source.topic_id {
            Some(topic) => self
                .deps
                .store
                .get_schemas_by_topic(topic)
                .await?
                .into_iter()
                .filter(|s| !s.readonly)
                .collect(),
            None => Vec::new(),
        };
        let token_ids = find_all_entities(&source.config, TOKEN_FIELDS);
        let tokens = self.deps.store.get_tokens(&token_ids, &source.owner).await?;
        let artifacts = self.load_artifacts(&source.id).await?;

        let archive = PolicyArchive {
            policy: source,
            schemas,
            tokens,
            artifacts,
        };
        self.import_archive(archive, owner, None, overrides).await
    }

    /// Delete a draft policy with its draft schemas and artifacts.
    pub async fn delete(&self, policy_id: &PolicyId, requester: &Did) -> Result<(), EngineError> {
        let policy = self.load_policy(policy_id).await?;
        if &policy.owner != requester {
            return Err(EngineError::PermissionDenied { action: "delete" });
        }
        if !policy.status.is_deletable() {
            return Err(EngineError::InvalidStatus(
                "Policy is not in draft status".into(),
            ));
        }
        let topic = self.definition_topic(&policy).await?;
        let store = &self.deps.store;

        for schema in store.get_schemas_by_topic(&topic.topic_id).await? {
            if !schema.readonly && schema.status == SchemaStatus::Draft {
                store.delete_schema(&schema.id).await?;
            }
        }
        for artifact in store.get_artifacts(&policy.id).await? {
            store.remove_artifact(&artifact).await?;
        }

        let root = self.root_account(&policy.owner).await?;
        self.sender(SendContext::production(root), topic.topic_id.clone())
            .send(MessageDraft::new(
                MessageType::Policy,
                MessageAction::DeletePolicy,
                policy_message(&policy),
            ))
            .await?;

        store.delete_policy(&policy.id).await?;
        tracing::info!(policy_id = %policy_id, "policy deleted");
        Ok(())
    }

    // ─── Internals ──────────────────────────────────────────────────

    /// Owner checks for a new version of `uuid`; returns the latest row.
    pub(crate) async fn check_new_version(
        &self,
        uuid: &str,
        claimed_creator: Option<&Did>,
        owner: &Did,
    ) -> Result<Policy, EngineError> {
        let old = self
            .deps
            .store
            .get_policy_by_uuid(uuid)
            .await?
            .ok_or_else(|| EngineError::PolicyNotFound(uuid.to_string()))?;
        if claimed_creator != Some(owner) || &old.creator != owner {
            return Err(EngineError::InvalidOwner);
        }
        Ok(old)
    }

    pub(crate) async fn load_artifacts(&self, policy_id: &PolicyId) -> Result<Vec<ArchivedArtifact>, EngineError> {
        let store = &self.deps.store;
        let mut out = Vec::new();
        for artifact in store.get_artifacts(policy_id).await? {
            let data = store.get_artifact_file(&artifact.uuid).await?.unwrap_or_default();
            out.push(ArchivedArtifact { artifact, data });
        }
        Ok(out)
    }

    pub(crate) async fn create_with_artifacts(
        &self,
        draft: PolicyDraft,
        owner: &Did,
        artifacts: Vec<ArchivedArtifact>,
    ) -> Result<Policy, EngineError> {
        tracing::info!(name = %draft.name, new_version = draft.uuid.is_some(), "creating policy");
        let mut policy = Policy::draft(draft.name, owner.clone(), draft.config);
        policy.description = draft.description;
        policy.topic_description = draft.topic_description;
        policy.policy_tag = draft.policy_tag;
        if let Some(uuid) = draft.uuid {
            policy.uuid = uuid;
            policy.topic_id = draft.topic_id;
            let published = self.highest_published_version(&policy.uuid).await?;
            policy.previous_version = highest_version(draft.previous_version, published);
        }

        let root = self.root_account(owner).await?;
        let new_topic = match policy.topic_id {
            Some(_) => None,
            None => Some(self.create_policy_topic(&mut policy, &root).await?),
        };

        let store = &self.deps.store;
        let mut uuid_map = HashMap::new();
        let mut added = Vec::new();
        for ArchivedArtifact { artifact, data } in artifacts {
            let uuid = Uuid::new_v4().to_string();
            uuid_map.insert(artifact.uuid.clone(), uuid.clone());
            let copy = Artifact {
                id: Uuid::new_v4(),
                uuid,
                policy_id: None,
                owner: owner.clone(),
                ..artifact
            };
            store.save_artifact(copy.clone(), data).await?;
            added.push(copy);
        }
        replace_artifact_uuids(&mut policy.config, &uuid_map);

        policy.code_version = Some(self.config.code_version.clone());
        let policy = store.insert_policy(policy).await?;

        if let Some(mut topic) = new_topic {
            topic.policy_id = Some(policy.id);
            topic.policy_uuid = Some(policy.uuid.clone());
            store.save_topic(&Namespace::Production, topic).await?;
        }
        for mut artifact in added {
            artifact.policy_id = Some(policy.id);
            store.update_artifact(artifact).await?;
        }

        tracing::info!(policy_id = %policy.id, uuid = %policy.uuid, "policy created");
        Ok(policy)
    }

    async fn create_policy_topic(
        &self,
        policy: &mut Policy,
        root: &LedgerAccount,
    ) -> Result<Topic, EngineError> {
        let owner = &policy.owner;
        let parent = self
            .deps
            .store
            .get_user_topic(owner)
            .await?
            .ok_or_else(|| EngineError::UserTopicNotFound(owner.clone()))?;
        let ctx = SendContext::production(root.clone());

        let spec = TopicSpec::new(
            TopicType::PolicyTopic,
            non_empty_or(&policy.name, "POLICY_TOPIC"),
            owner.clone(),
        )
        .described(non_empty_or(&policy.topic_description, "POLICY_TOPIC"));
        let provisioned = self.deps.topics.create_topic(&ctx, spec.clone()).await?;
        let topic = Topic::provisioned(provisioned, &spec, Some(parent.topic_id.clone()));
        self.deps
            .store
            .save_topic(&Namespace::Production, topic.clone())
            .await?;
        policy.topic_id = Some(topic.topic_id.clone());
        tracing::info!(topic_id = %topic.topic_id, "policy topic created");

        let receipt = self
            .sender(ctx.clone(), parent.topic_id.clone())
            .send(MessageDraft::new(
                MessageType::Policy,
                MessageAction::CreatePolicy,
                policy_message(policy),
            ))
            .await?;
        self.deps
            .topics
            .link_topics(&ctx, &topic.topic_id, &parent.topic_id, &receipt.message_id)
            .await?;

        let sender = self.sender(ctx, topic.topic_id.clone());
        publish_system_schemas(self.deps.store.as_ref(), &sender, owner).await?;
        Ok(topic)
    }

    /// Recreate an archived policy for `owner`, optionally as a new version
    /// of the policy whose definition topic is `version_of`.
    pub(crate) async fn import_archive(
        &self,
        archive: PolicyArchive,
        owner: &Did,
        version_of: Option<TopicId>,
        overrides: PolicyOverrides,
    ) -> Result<ImportResult, EngineError> {
        let PolicyArchive {
            policy: source,
            schemas,
            tokens,
            artifacts,
        } = archive;
        let mut errors = Vec::new();

        let mut draft = PolicyDraft {
            name: overrides.name.unwrap_or(source.name),
            description: overrides.description.unwrap_or(source.description),
            topic_description: overrides.topic_description.unwrap_or(source.topic_description),
            policy_tag: overrides.policy_tag.unwrap_or(source.policy_tag),
            config: source.config,
            ..PolicyDraft::default()
        };
        if let Some(topic_id) = version_of {
            let latest = self
                .deps
                .store
                .get_policies_by_topic(&topic_id)
                .await?
                .into_iter()
                .last()
                .ok_or_else(|| EngineError::PolicyNotFound(topic_id.to_string()))?;
            self.check_new_version(&latest.uuid, Some(owner), owner).await?;
            draft.uuid = Some(latest.uuid);
            draft.creator = Some(owner.clone());
            draft.topic_id = Some(topic_id);
            draft.previous_version = latest.version;
        }

        for token in &tokens {
            let local = self
                .deps
                .store
                .get_tokens(std::slice::from_ref(&token.token_id), owner)
                .await?;
            if local.is_empty() {
                errors.push(format!("Token {} is not available to {}", token.token_id, owner));
            }
        }

        let mut policy = self.create_with_artifacts(draft, owner, artifacts).await?;
        let topic_id = policy
            .topic_id
            .clone()
            .ok_or(EngineError::PolicyTopicMissing(policy.id))?;

        let mut rewritten = false;
        for schema in schemas {
            let uuid = Uuid::new_v4().to_string();
            let old_iri = schema.iri.clone();
            let copy = Schema {
                id: Uuid::new_v4(),
                iri: Schema::draft_iri(&uuid),
                uuid,
                version: None,
                status: SchemaStatus::Draft,
                topic_id: Some(topic_id.clone()),
                owner: owner.clone(),
                readonly: false,
                system: false,
                active: false,
                message_id: None,
                ..schema
            };
            let new_iri = copy.iri.clone();
            let name = copy.name.clone();
            match self.deps.store.save_schema(copy).await {
                Ok(()) => {
                    rewritten |=
                        replace_all_entities(&mut policy.config, SCHEMA_FIELDS, &old_iri, &new_iri) > 0;
                }
                Err(e) => errors.push(format!("Schema {name} could not be saved: {e}")),
            }
        }
        if rewritten {
            policy = self.deps.store.update_policy(policy).await?;
        }

        if !errors.is_empty() {
            tracing::warn!(policy_id = %policy.id, errors = errors.len(), "policy imported with errors");
        }
        Ok(ImportResult { policy, errors })
    }
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}
