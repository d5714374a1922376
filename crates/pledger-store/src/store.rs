//! # Store Contract

use async_trait::async_trait;
use uuid::Uuid;

use pledger_core::{Did, MessageId, Namespace, PolicyId, TopicId};
use pledger_state::PolicyStatus;

use crate::error::StoreError;
use crate::model::{
    Artifact, Document, DocumentState, MultiPolicy, Policy, PolicyGroup, Schema, Token, Topic,
    VirtualUser,
};

/// Query/command contract over every persisted entity.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    // ─── Policies ───────────────────────────────────────────────────

    /// Point lookup by row id.
    async fn get_policy(&self, id: &PolicyId) -> Result<Option<Policy>, StoreError>;

    /// Most recently created row carrying `uuid`.
    async fn get_policy_by_uuid(&self, uuid: &str) -> Result<Option<Policy>, StoreError>;

    /// Every row carrying `uuid`, oldest first.
    async fn get_policies_by_uuid(&self, uuid: &str) -> Result<Vec<Policy>, StoreError>;

    /// Rows whose definition topic is `topic_id`.
    async fn get_policies_by_topic(&self, topic_id: &TopicId) -> Result<Vec<Policy>, StoreError>;

    /// Rows in any of `statuses`.
    async fn get_policies_by_status(
        &self,
        statuses: &[PolicyStatus],
    ) -> Result<Vec<Policy>, StoreError>;

    /// Number of rows holding `(uuid, version)`.
    async fn count_policies_with_version(
        &self,
        uuid: &str,
        version: &str,
    ) -> Result<usize, StoreError>;

    /// Insert a new row. Fails if its `(uuid, version)` is taken.
    async fn insert_policy(&self, policy: Policy) -> Result<Policy, StoreError>;

    /// Replace an existing row. Fails if its `(uuid, version)` is held by
    /// another row.
    async fn update_policy(&self, policy: Policy) -> Result<Policy, StoreError>;

    /// Atomically claim `(uuid, version)` for row `id`, writing `version`
    /// into the row. Fails with `DuplicateVersion` if any row, including
    /// `id` itself, already holds the pair.
    async fn reserve_policy_version(
        &self,
        id: &PolicyId,
        uuid: &str,
        version: &str,
    ) -> Result<(), StoreError>;

    /// Remove a row.
    async fn delete_policy(&self, id: &PolicyId) -> Result<(), StoreError>;

    // ─── Topics ─────────────────────────────────────────────────────

    /// Insert or replace a topic.
    async fn save_topic(&self, ns: &Namespace, topic: Topic) -> Result<(), StoreError>;

    /// Point lookup.
    async fn get_topic(&self, ns: &Namespace, topic_id: &TopicId)
        -> Result<Option<Topic>, StoreError>;

    /// The owner's root topic.
    async fn get_user_topic(&self, owner: &Did) -> Result<Option<Topic>, StoreError>;

    /// Every topic owned by a policy.
    async fn get_policy_topics(
        &self,
        ns: &Namespace,
        policy_id: &PolicyId,
    ) -> Result<Vec<Topic>, StoreError>;

    // ─── Schemas ────────────────────────────────────────────────────

    /// Schemas belonging to a topic.
    async fn get_schemas_by_topic(&self, topic_id: &TopicId) -> Result<Vec<Schema>, StoreError>;

    /// Point lookup by IRI.
    async fn get_schema_by_iri(&self, iri: &str) -> Result<Option<Schema>, StoreError>;

    /// Every version of a schema.
    async fn get_schemas_by_uuid(&self, uuid: &str) -> Result<Vec<Schema>, StoreError>;

    /// The credential schema for policy publication in a topic.
    async fn get_policy_schema(&self, topic_id: &TopicId) -> Result<Option<Schema>, StoreError>;

    /// Active system schema templates.
    async fn get_system_schemas(&self) -> Result<Vec<Schema>, StoreError>;

    /// Insert or replace a schema.
    async fn save_schema(&self, schema: Schema) -> Result<(), StoreError>;

    /// Remove a schema.
    async fn delete_schema(&self, id: &Uuid) -> Result<(), StoreError>;

    // ─── Artifacts ──────────────────────────────────────────────────

    /// Artifacts of a policy.
    async fn get_artifacts(&self, policy_id: &PolicyId) -> Result<Vec<Artifact>, StoreError>;

    /// Insert an artifact row and its blob.
    async fn save_artifact(&self, artifact: Artifact, data: Vec<u8>) -> Result<(), StoreError>;

    /// Replace an artifact row.
    async fn update_artifact(&self, artifact: Artifact) -> Result<(), StoreError>;

    /// Blob of an artifact.
    async fn get_artifact_file(&self, uuid: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Remove an artifact row and its blob.
    async fn remove_artifact(&self, artifact: &Artifact) -> Result<(), StoreError>;

    // ─── Tokens ─────────────────────────────────────────────────────

    /// Insert or replace a token (keyed by token id and owner).
    async fn save_token(&self, token: Token) -> Result<(), StoreError>;

    /// Tokens among `token_ids` owned by `owner`.
    async fn get_tokens(&self, token_ids: &[String], owner: &Did) -> Result<Vec<Token>, StoreError>;

    // ─── Documents ──────────────────────────────────────────────────

    /// Insert or replace a document.
    async fn save_document(&self, ns: &Namespace, document: Document) -> Result<(), StoreError>;

    /// Documents anchored by any of `message_ids`, grouped by kind and
    /// ordered by message id ascending within each kind.
    async fn get_documents_by_message_ids(
        &self,
        ns: &Namespace,
        message_ids: &[MessageId],
    ) -> Result<Vec<Document>, StoreError>;

    /// Documents produced by a policy.
    async fn get_policy_documents(
        &self,
        ns: &Namespace,
        policy_id: &PolicyId,
    ) -> Result<Vec<Document>, StoreError>;

    /// Append a status audit entry.
    async fn save_document_state(&self, ns: &Namespace, state: DocumentState)
        -> Result<(), StoreError>;

    /// Status audit entries of a document, oldest first.
    async fn get_document_states(
        &self,
        ns: &Namespace,
        document_id: &Uuid,
    ) -> Result<Vec<DocumentState>, StoreError>;

    // ─── Users ──────────────────────────────────────────────────────

    /// Insert a role binding.
    async fn save_group(&self, ns: &Namespace, group: PolicyGroup) -> Result<(), StoreError>;

    /// Active role bindings of `did` in a policy.
    async fn get_active_groups(
        &self,
        ns: &Namespace,
        policy_id: &PolicyId,
        did: &Did,
    ) -> Result<Vec<PolicyGroup>, StoreError>;

    /// Insert a sandbox identity into the policy's dry-run namespace.
    async fn create_virtual_user(&self, user: VirtualUser) -> Result<(), StoreError>;

    /// The active sandbox identity of a dry-running policy.
    async fn get_virtual_user(&self, policy_id: &PolicyId)
        -> Result<Option<VirtualUser>, StoreError>;

    // ─── Multi-policy ───────────────────────────────────────────────

    /// Insert a multi-policy binding.
    async fn save_multi_policy(&self, multi: MultiPolicy) -> Result<(), StoreError>;

    /// Binding of an instance for a user account.
    async fn get_multi_policy(
        &self,
        instance_topic_id: &TopicId,
        user: &str,
    ) -> Result<Option<MultiPolicy>, StoreError>;

    // ─── Sandbox ────────────────────────────────────────────────────

    /// Drop everything stored in `Namespace::DryRun(policy_id)`.
    async fn clear_dry_run(&self, policy_id: &PolicyId) -> Result<(), StoreError>;
}
