//! # Schema Publication
//!
//! Schemas of a policy topic are published ahead of the policy itself so
//! the published config can reference pinned `#<uuid>&<version>` IRIs.

use serde_json::{json, Value};
use uuid::Uuid;

use pledger_core::{version_compare, Did, TopicId};
use pledger_ledger::{MessageAction, MessageDraft, MessageSender, MessageType};
use pledger_state::SchemaStatus;
use pledger_store::{PolicyStore, Schema};

use crate::error::EngineError;
use crate::tree::{replace_all_entities, SCHEMA_FIELDS};

/// Outcome of publishing a topic's schemas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchemaPublishSummary {
    /// Newly published.
    pub published: usize,
    /// Already published, not re-sent.
    pub skipped: usize,
}

/// Next version for a schema uuid: minor bump of the highest existing
/// version, `1.0.0` if none.
pub fn next_schema_version(existing: &[Schema]) -> String {
    let highest = existing
        .iter()
        .filter_map(|s| s.version.as_deref())
        .max_by(|a, b| version_compare(a, b));
    let Some(highest) = highest else {
        return "1.0.0".to_string();
    };
    let mut parts = highest
        .split('.')
        .map(|p| p.parse::<u64>().unwrap_or(0))
        .chain(std::iter::repeat(0))
        .take(3);
    let major = parts.next().unwrap_or(0);
    let minor = parts.next().unwrap_or(0);
    format!("{major}.{}.0", minor + 1)
}

fn schema_message(schema: &Schema) -> Value {
    json!({
        "uuid": schema.uuid,
        "iri": schema.iri,
        "name": schema.name,
        "version": schema.version,
        "entity": schema.entity,
        "owner": schema.owner,
        "contextUrl": schema.context_url,
        "document": schema.document,
    })
}

/// Copy every active system schema into the sender's topic as a read-only
/// published schema and announce each copy.
pub async fn publish_system_schemas(
    store: &dyn PolicyStore,
    sender: &MessageSender,
    owner: &Did,
) -> Result<usize, EngineError> {
    let templates = store.get_system_schemas().await?;
    let count = templates.len();
    for template in templates {
        let uuid = Uuid::new_v4().to_string();
        let mut copy = Schema {
            id: Uuid::new_v4(),
            iri: Schema::draft_iri(&uuid),
            uuid,
            status: SchemaStatus::Published,
            topic_id: Some(sender.topic().clone()),
            owner: owner.clone(),
            readonly: true,
            system: false,
            active: false,
            message_id: None,
            ..template
        };
        let receipt = sender
            .send(MessageDraft::new(
                MessageType::Schema,
                MessageAction::PublishSystemSchema,
                schema_message(&copy),
            ))
            .await?;
        copy.message_id = Some(receipt.message_id);
        store.save_schema(copy).await?;
    }
    tracing::debug!(topic_id = %sender.topic(), count, "system schemas published");
    Ok(count)
}

/// Publish every draft schema of `topic_id` and rewrite `config` to the
/// published IRIs.
pub async fn publish_schemas(
    store: &dyn PolicyStore,
    sender: &MessageSender,
    config: &mut Value,
    topic_id: &TopicId,
) -> Result<SchemaPublishSummary, EngineError> {
    let mut summary = SchemaPublishSummary::default();
    for mut schema in store.get_schemas_by_topic(topic_id).await? {
        if schema.status == SchemaStatus::Published {
            summary.skipped += 1;
            continue;
        }
        schema.status.check_transition(SchemaStatus::Published)?;

        let siblings = store.get_schemas_by_uuid(&schema.uuid).await?;
        let version = next_schema_version(&siblings);
        let old_iri = schema.iri.clone();
        schema.iri = Schema::published_iri(&schema.uuid, &version);
        schema.version = Some(version.clone());
        schema.status = SchemaStatus::Published;

        let receipt = sender
            .send(
                MessageDraft::new(
                    MessageType::Schema,
                    MessageAction::PublishSchema,
                    schema_message(&schema),
                )
                .with_version(version),
            )
            .await?;
        schema.message_id = Some(receipt.message_id);

        replace_all_entities(config, SCHEMA_FIELDS, &old_iri, &schema.iri);
        tracing::info!(
            topic_id = %topic_id,
            schema = %schema.name,
            iri = %schema.iri,
            "schema published"
        );
        store.save_schema(schema).await?;
        summary.published += 1;
    }
    if summary.skipped > 0 {
        tracing::info!(topic_id = %topic_id, skipped = summary.skipped, "skipped published schemas");
    }
    Ok(summary)
}

/// Push every draft schema of `topic_id` through a sandbox sender. The
/// schemas stay `DRAFT` and their IRIs are unchanged.
pub async fn dry_run_schemas(
    store: &dyn PolicyStore,
    sender: &MessageSender,
    topic_id: &TopicId,
) -> Result<usize, EngineError> {
    let mut sent = 0;
    for schema in store.get_schemas_by_topic(topic_id).await? {
        if schema.status != SchemaStatus::Draft {
            continue;
        }
        sender
            .send(MessageDraft::new(
                MessageType::Schema,
                MessageAction::PublishSchema,
                schema_message(&schema),
            ))
            .await?;
        sent += 1;
    }
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_versions(versions: &[&str]) -> Vec<Schema> {
        versions
            .iter()
            .map(|v| {
                let mut s = Schema::draft("s", Did::from("did:o"), None);
                s.version = Some(v.to_string());
                s
            })
            .collect()
    }

    #[test]
    fn test_first_version() {
        assert_eq!(next_schema_version(&[]), "1.0.0");
        assert_eq!(next_schema_version(&[Schema::draft("s", Did::from("did:o"), None)]), "1.0.0");
    }

    #[test]
    fn test_bumps_highest_minor() {
        assert_eq!(next_schema_version(&with_versions(&["1.2.0", "1.10.0", "1.9.3"])), "1.11.0");
        assert_eq!(next_schema_version(&with_versions(&["2"])), "2.1.0");
    }
}
