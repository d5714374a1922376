//! # In-Memory Store
//!
//! `RwLock`-guarded tables. Namespaced entities live in one [`Tables`] per
//! namespace; `clear_dry_run` drops a whole sandbox table set at once.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use pledger_core::{Did, MessageId, Namespace, PolicyId, TopicId};
use pledger_state::PolicyStatus;

use crate::error::StoreError;
use crate::model::{
    Artifact, Document, DocumentState, MultiPolicy, Policy, PolicyGroup, Schema, SchemaEntity,
    Token, Topic, VirtualUser,
};
use crate::store::PolicyStore;

#[derive(Debug, Default)]
struct Tables {
    topics: HashMap<TopicId, Topic>,
    documents: Vec<Document>,
    document_states: Vec<DocumentState>,
    groups: Vec<PolicyGroup>,
    virtual_users: Vec<VirtualUser>,
}

#[derive(Debug, Default)]
struct StoreState {
    policies: Vec<Policy>,
    schemas: Vec<Schema>,
    artifacts: Vec<Artifact>,
    blobs: HashMap<String, Vec<u8>>,
    tokens: Vec<Token>,
    multi_policies: Vec<MultiPolicy>,
    spaces: HashMap<Namespace, Tables>,
}

impl StoreState {
    fn space(&self, ns: &Namespace) -> Option<&Tables> {
        self.spaces.get(ns)
    }

    fn space_mut(&mut self, ns: &Namespace) -> &mut Tables {
        self.spaces.entry(*ns).or_default()
    }

    fn version_taken(&self, uuid: &str, version: &str, except: Option<&PolicyId>) -> bool {
        self.policies.iter().any(|p| {
            p.uuid == uuid
                && p.version.as_deref() == Some(version)
                && except.map_or(true, |id| &p.id != id)
        })
    }
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any data exists for `ns`.
    pub fn has_namespace(&self, ns: &Namespace) -> bool {
        self.state.read().spaces.contains_key(ns)
    }

    /// Number of stored policy rows.
    pub fn policy_count(&self) -> usize {
        self.state.read().policies.len()
    }
}

fn duplicate(uuid: &str, version: &str) -> StoreError {
    StoreError::DuplicateVersion {
        uuid: uuid.to_string(),
        version: version.to_string(),
    }
}

#[async_trait]
impl PolicyStore for MemoryStore {
    async fn get_policy(&self, id: &PolicyId) -> Result<Option<Policy>, StoreError> {
        Ok(self.state.read().policies.iter().find(|p| &p.id == id).cloned())
    }

    async fn get_policy_by_uuid(&self, uuid: &str) -> Result<Option<Policy>, StoreError> {
        Ok(self
            .state
            .read()
            .policies
            .iter()
            .rev()
            .find(|p| p.uuid == uuid)
            .cloned())
    }

    async fn get_policies_by_uuid(&self, uuid: &str) -> Result<Vec<Policy>, StoreError> {
        Ok(self
            .state
            .read()
            .policies
            .iter()
            .filter(|p| p.uuid == uuid)
            .cloned()
            .collect())
    }

    async fn get_policies_by_topic(&self, topic_id: &TopicId) -> Result<Vec<Policy>, StoreError> {
        Ok(self
            .state
            .read()
            .policies
            .iter()
            .filter(|p| p.topic_id.as_ref() == Some(topic_id))
            .cloned()
            .collect())
    }

    async fn get_policies_by_status(
        &self,
        statuses: &[PolicyStatus],
    ) -> Result<Vec<Policy>, StoreError> {
        Ok(self
            .state
            .read()
            .policies
            .iter()
            .filter(|p| statuses.contains(&p.status))
            .cloned()
            .collect())
    }

    async fn count_policies_with_version(
        &self,
        uuid: &str,
        version: &str,
    ) -> Result<usize, StoreError> {
        Ok(self
            .state
            .read()
            .policies
            .iter()
            .filter(|p| p.uuid == uuid && p.version.as_deref() == Some(version))
            .count())
    }

    async fn insert_policy(&self, policy: Policy) -> Result<Policy, StoreError> {
        let mut state = self.state.write();
        if let Some(v) = &policy.version {
            if state.version_taken(&policy.uuid, v, None) {
                return Err(duplicate(&policy.uuid, v));
            }
        }
        state.policies.push(policy.clone());
        Ok(policy)
    }

    async fn update_policy(&self, policy: Policy) -> Result<Policy, StoreError> {
        let mut state = self.state.write();
        if let Some(v) = &policy.version {
            if state.version_taken(&policy.uuid, v, Some(&policy.id)) {
                return Err(duplicate(&policy.uuid, v));
            }
        }
        let row = state
            .policies
            .iter_mut()
            .find(|p| p.id == policy.id)
            .ok_or_else(|| StoreError::not_found("policy", policy.id))?;
        *row = policy.clone();
        Ok(policy)
    }

    async fn reserve_policy_version(
        &self,
        id: &PolicyId,
        uuid: &str,
        version: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write();
        if state.version_taken(uuid, version, None) {
            return Err(duplicate(uuid, version));
        }
        let row = state
            .policies
            .iter_mut()
            .find(|p| &p.id == id)
            .ok_or_else(|| StoreError::not_found("policy", id))?;
        row.version = Some(version.to_string());
        tracing::debug!(policy_id = %id, uuid, version, "policy version reserved");
        Ok(())
    }

    async fn delete_policy(&self, id: &PolicyId) -> Result<(), StoreError> {
        let mut state = self.state.write();
        let before = state.policies.len();
        state.policies.retain(|p| &p.id != id);
        if state.policies.len() == before {
            return Err(StoreError::not_found("policy", id));
        }
        Ok(())
    }

    // ─── Topics ─────────────────────────────────────────────────────

    async fn save_topic(&self, ns: &Namespace, topic: Topic) -> Result<(), StoreError> {
        self.state
            .write()
            .space_mut(ns)
            .topics
            .insert(topic.topic_id.clone(), topic);
        Ok(())
    }

    async fn get_topic(
        &self,
        ns: &Namespace,
        topic_id: &TopicId,
    ) -> Result<Option<Topic>, StoreError> {
        Ok(self
            .state
            .read()
            .space(ns)
            .and_then(|s| s.topics.get(topic_id).cloned()))
    }

    async fn get_user_topic(&self, owner: &Did) -> Result<Option<Topic>, StoreError> {
        Ok(self.state.read().space(&Namespace::Production).and_then(|s| {
            s.topics
                .values()
                .find(|t| {
                    t.owner == *owner && t.topic_type == pledger_ledger::TopicType::UserTopic
                })
                .cloned()
        }))
    }

    async fn get_policy_topics(
        &self,
        ns: &Namespace,
        policy_id: &PolicyId,
    ) -> Result<Vec<Topic>, StoreError> {
        let state = self.state.read();
        let mut topics: Vec<Topic> = state
            .space(ns)
            .map(|s| {
                s.topics
                    .values()
                    .filter(|t| t.policy_id.as_ref() == Some(policy_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        topics.sort_by(|a, b| a.topic_id.cmp(&b.topic_id));
        Ok(topics)
    }

    // ─── Schemas ────────────────────────────────────────────────────

    async fn get_schemas_by_topic(&self, topic_id: &TopicId) -> Result<Vec<Schema>, StoreError> {
        Ok(self
            .state
            .read()
            .schemas
            .iter()
            .filter(|s| s.topic_id.as_ref() == Some(topic_id))
            .cloned()
            .collect())
    }

    async fn get_schema_by_iri(&self, iri: &str) -> Result<Option<Schema>, StoreError> {
        Ok(self.state.read().schemas.iter().find(|s| s.iri == iri).cloned())
    }

    async fn get_schemas_by_uuid(&self, uuid: &str) -> Result<Vec<Schema>, StoreError> {
        Ok(self
            .state
            .read()
            .schemas
            .iter()
            .filter(|s| s.uuid == uuid)
            .cloned()
            .collect())
    }

    async fn get_policy_schema(&self, topic_id: &TopicId) -> Result<Option<Schema>, StoreError> {
        let state = self.state.read();
        let in_topic = state
            .schemas
            .iter()
            .find(|s| s.entity == SchemaEntity::Policy && s.topic_id.as_ref() == Some(topic_id));
        let system = || {
            state
                .schemas
                .iter()
                .find(|s| s.entity == SchemaEntity::Policy && s.system && s.active)
        };
        Ok(in_topic.or_else(system).cloned())
    }

    async fn get_system_schemas(&self) -> Result<Vec<Schema>, StoreError> {
        Ok(self
            .state
            .read()
            .schemas
            .iter()
            .filter(|s| s.system && s.active)
            .cloned()
            .collect())
    }

    async fn save_schema(&self, schema: Schema) -> Result<(), StoreError> {
        let mut state = self.state.write();
        match state.schemas.iter_mut().find(|s| s.id == schema.id) {
            Some(row) => *row = schema,
            None => state.schemas.push(schema),
        }
        Ok(())
    }

    async fn delete_schema(&self, id: &Uuid) -> Result<(), StoreError> {
        self.state.write().schemas.retain(|s| &s.id != id);
        Ok(())
    }

    // ─── Artifacts ──────────────────────────────────────────────────

    async fn get_artifacts(&self, policy_id: &PolicyId) -> Result<Vec<Artifact>, StoreError> {
        Ok(self
            .state
            .read()
            .artifacts
            .iter()
            .filter(|a| a.policy_id.as_ref() == Some(policy_id))
            .cloned()
            .collect())
    }

    async fn save_artifact(&self, artifact: Artifact, data: Vec<u8>) -> Result<(), StoreError> {
        let mut state = self.state.write();
        state.blobs.insert(artifact.uuid.clone(), data);
        state.artifacts.push(artifact);
        Ok(())
    }

    async fn update_artifact(&self, artifact: Artifact) -> Result<(), StoreError> {
        let mut state = self.state.write();
        let row = state
            .artifacts
            .iter_mut()
            .find(|a| a.id == artifact.id)
            .ok_or_else(|| StoreError::not_found("artifact", artifact.id))?;
        *row = artifact;
        Ok(())
    }

    async fn get_artifact_file(&self, uuid: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.state.read().blobs.get(uuid).cloned())
    }

    async fn remove_artifact(&self, artifact: &Artifact) -> Result<(), StoreError> {
        let mut state = self.state.write();
        state.artifacts.retain(|a| a.id != artifact.id);
        state.blobs.remove(&artifact.uuid);
        Ok(())
    }

    // ─── Tokens ─────────────────────────────────────────────────────

    async fn save_token(&self, token: Token) -> Result<(), StoreError> {
        let mut state = self.state.write();
        state
            .tokens
            .retain(|t| !(t.token_id == token.token_id && t.owner == token.owner));
        state.tokens.push(token);
        Ok(())
    }

    async fn get_tokens(&self, token_ids: &[String], owner: &Did) -> Result<Vec<Token>, StoreError> {
        Ok(self
            .state
            .read()
            .tokens
            .iter()
            .filter(|t| &t.owner == owner && token_ids.contains(&t.token_id))
            .cloned()
            .collect())
    }

    // ─── Documents ──────────────────────────────────────────────────

    async fn save_document(&self, ns: &Namespace, document: Document) -> Result<(), StoreError> {
        let mut state = self.state.write();
        let docs = &mut state.space_mut(ns).documents;
        match docs.iter_mut().find(|d| d.id == document.id) {
            Some(row) => *row = document,
            None => docs.push(document),
        }
        Ok(())
    }

    async fn get_documents_by_message_ids(
        &self,
        ns: &Namespace,
        message_ids: &[MessageId],
    ) -> Result<Vec<Document>, StoreError> {
        let state = self.state.read();
        let mut docs: Vec<Document> = state
            .space(ns)
            .map(|s| {
                s.documents
                    .iter()
                    .filter(|d| d.message_id.as_ref().is_some_and(|m| message_ids.contains(m)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        docs.sort_by(|a, b| (a.kind, &a.message_id).cmp(&(b.kind, &b.message_id)));
        Ok(docs)
    }

    async fn get_policy_documents(
        &self,
        ns: &Namespace,
        policy_id: &PolicyId,
    ) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .state
            .read()
            .space(ns)
            .map(|s| {
                s.documents
                    .iter()
                    .filter(|d| d.policy_id.as_ref() == Some(policy_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn save_document_state(
        &self,
        ns: &Namespace,
        state: DocumentState,
    ) -> Result<(), StoreError> {
        self.state.write().space_mut(ns).document_states.push(state);
        Ok(())
    }

    async fn get_document_states(
        &self,
        ns: &Namespace,
        document_id: &Uuid,
    ) -> Result<Vec<DocumentState>, StoreError> {
        Ok(self
            .state
            .read()
            .space(ns)
            .map(|s| {
                s.document_states
                    .iter()
                    .filter(|d| &d.document_id == document_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    // ─── Users ──────────────────────────────────────────────────────

    async fn save_group(&self, ns: &Namespace, group: PolicyGroup) -> Result<(), StoreError> {
        self.state.write().space_mut(ns).groups.push(group);
        Ok(())
    }

    async fn get_active_groups(
        &self,
        ns: &Namespace,
        policy_id: &PolicyId,
        did: &Did,
    ) -> Result<Vec<PolicyGroup>, StoreError> {
        Ok(self
            .state
            .read()
            .space(ns)
            .map(|s| {
                s.groups
                    .iter()
                    .filter(|g| g.active && &g.policy_id == policy_id && &g.did == did)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create_virtual_user(&self, user: VirtualUser) -> Result<(), StoreError> {
        let ns = Namespace::DryRun(user.policy_id);
        let mut state = self.state.write();
        let users = &mut state.space_mut(&ns).virtual_users;
        if user.active {
            for u in users.iter_mut() {
                u.active = false;
            }
        }
        users.push(user);
        Ok(())
    }

    async fn get_virtual_user(
        &self,
        policy_id: &PolicyId,
    ) -> Result<Option<VirtualUser>, StoreError> {
        Ok(self
            .state
            .read()
            .space(&Namespace::DryRun(*policy_id))
            .and_then(|s| s.virtual_users.iter().find(|u| u.active).cloned()))
    }

    // ─── Multi-policy ───────────────────────────────────────────────

    async fn save_multi_policy(&self, multi: MultiPolicy) -> Result<(), StoreError> {
        self.state.write().multi_policies.push(multi);
        Ok(())
    }

    async fn get_multi_policy(
        &self,
        instance_topic_id: &TopicId,
        user: &str,
    ) -> Result<Option<MultiPolicy>, StoreError> {
        Ok(self
            .state
            .read()
            .multi_policies
            .iter()
            .find(|m| &m.instance_topic_id == instance_topic_id && m.user == user)
            .cloned())
    }

    // ─── Sandbox ────────────────────────────────────────────────────

    async fn clear_dry_run(&self, policy_id: &PolicyId) -> Result<(), StoreError> {
        let removed = self
            .state
            .write()
            .spaces
            .remove(&Namespace::DryRun(*policy_id))
            .is_some();
        tracing::debug!(policy_id = %policy_id, removed, "sandbox store cleared");
        Ok(())
    }
}
