//! Integration tests: create, publish, delete, clone, import and
//! multi-policy bindings against the in-memory collaborators.

mod common;

use std::sync::Arc;

use serde_json::json;
use tokio::sync::Barrier;
use uuid::Uuid;

use common::{Harness, WorkerMode, TOKEN_ID};
use pledger_core::{Did, Namespace};
use pledger_engine::{
    EngineConfig, EngineError, MultiPolicyRequest, PolicyDraft, PolicyInstance, PolicyOverrides,
};
use pledger_ledger::{MessageAction, TopicType};
use pledger_state::{PolicyStatus, SchemaStatus};
use pledger_store::{Artifact, DocumentKind, MultiPolicyRole, PolicyStore, Schema};

// ─── Create ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_provisions_policy_topic() {
    let h = Harness::new().await;
    let policy = h
        .engine
        .create(PolicyDraft::new("Carbon", json!({"id": "root"})), &h.owner)
        .await
        .unwrap();

    assert_eq!(policy.status, PolicyStatus::Draft);
    assert_eq!(policy.code_version.as_deref(), Some("1.0.0"));
    let topic_id = policy.topic_id.clone().unwrap();
    assert_eq!(h.production_topics(TopicType::PolicyTopic), vec![topic_id.clone()]);
    assert_eq!(
        h.ledger
            .messages_with_action(&Namespace::Production, MessageAction::CreatePolicy)
            .len(),
        1
    );

    let topic = h
        .store
        .get_topic(&Namespace::Production, &topic_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(topic.policy_id, Some(policy.id));
    assert_eq!(topic.policy_uuid.as_deref(), Some(policy.uuid.as_str()));
    assert!(topic.parent.is_some());
}

#[tokio::test]
async fn test_create_without_user_topic_fails() {
    let h = Harness::new().await;
    let stranger = Did::from("did:test:stranger");
    let err = h
        .engine
        .create(PolicyDraft::new("Carbon", json!({})), &stranger)
        .await
        .unwrap_err();
    // The stranger has no ledger account either; whichever lookup runs
    // first must reject.
    assert!(matches!(
        err,
        EngineError::Ledger(_) | EngineError::UserTopicNotFound(_)
    ));
    assert_eq!(h.store.policy_count(), 0);
}

#[tokio::test]
async fn test_new_version_requires_creator() {
    let h = Harness::new().await;
    let (first, _) = h.draft_with_schema("Carbon").await;

    let draft = PolicyDraft {
        uuid: Some(first.uuid.clone()),
        creator: Some(Did::from("did:test:someone-else")),
        topic_id: first.topic_id.clone(),
        ..PolicyDraft::new("Carbon v2", json!({"id": "root"}))
    };
    let err = h.engine.create(draft, &h.owner).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidOwner));
}

#[tokio::test]
async fn test_new_version_copies_artifacts() {
    let h = Harness::new().await;
    let (first, _) = h.draft_with_schema("Carbon").await;
    h.store
        .save_artifact(
            Artifact {
                id: Uuid::new_v4(),
                uuid: "art-1".into(),
                policy_id: Some(first.id),
                owner: h.owner.clone(),
                name: "calc".into(),
                extension: "js".into(),
                artifact_type: "executableCode".into(),
            },
            b"return 1;".to_vec(),
        )
        .await
        .unwrap();

    let draft = PolicyDraft {
        uuid: Some(first.uuid.clone()),
        creator: Some(h.owner.clone()),
        topic_id: first.topic_id.clone(),
        previous_version: Some("1.0.0".into()),
        ..PolicyDraft::new(
            "Carbon v2",
            json!({"id": "root", "artifacts": [{"uuid": "art-1"}]}),
        )
    };
    let second = h.engine.create(draft, &h.owner).await.unwrap();

    assert_eq!(second.uuid, first.uuid);
    assert_eq!(second.topic_id, first.topic_id);
    assert_eq!(h.production_topics(TopicType::PolicyTopic).len(), 1);
    let copied = h.store.get_artifacts(&second.id).await.unwrap();
    assert_eq!(copied.len(), 1);
    assert_ne!(copied[0].uuid, "art-1");
    assert_eq!(second.config["artifacts"][0]["uuid"], copied[0].uuid.as_str());
    assert_eq!(
        h.store.get_artifact_file(&copied[0].uuid).await.unwrap(),
        Some(b"return 1;".to_vec())
    );
}

// ─── Publish ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_validate_and_publish() {
    let h = Harness::new().await;
    let (policy, schema) = h.draft_with_schema("Carbon").await;

    let result = h
        .engine
        .validate_and_publish(&policy.id, "1.0.0", &h.owner)
        .await
        .unwrap();
    assert!(result.is_valid);

    let published = h.store.get_policy(&policy.id).await.unwrap().unwrap();
    assert_eq!(published.status, PolicyStatus::Publish);
    assert_eq!(published.version.as_deref(), Some("1.0.0"));
    assert!(published.instance_topic_id.is_some());
    assert!(published.synchronization_topic_id.is_some());
    assert!(published.message_id.is_some());

    let pinned = Schema::published_iri(&schema.uuid, "1.0.0");
    let stored = h.store.get_schema_by_iri(&pinned).await.unwrap().unwrap();
    assert_eq!(stored.status, SchemaStatus::Published);
    assert_eq!(published.config["children"][0]["schema"], pinned.as_str());
    // Block ids are regenerated.
    assert_ne!(published.config["id"], "root");

    let use_token = h
        .ledger
        .messages_with_action(&Namespace::Production, MessageAction::UseToken);
    assert_eq!(use_token.len(), 1);
    assert_eq!(use_token[0].payload["tokenId"], TOKEN_ID);

    let publish = h
        .ledger
        .messages_with_action(&Namespace::Production, MessageAction::PublishPolicy);
    assert_eq!(publish.len(), 1);
    assert_eq!(publish[0].version.as_deref(), Some("1.0.0"));
    assert!(publish[0].locator.is_some());

    let documents = h
        .store
        .get_policy_documents(&Namespace::Production, &policy.id)
        .await
        .unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].kind, DocumentKind::Vc);
    assert_eq!(documents[0].entity_type.as_deref(), Some("POLICY"));
    assert!(documents[0].hash.is_some());
    assert_eq!(documents[0].document["credentialSubject"]["operation"], "PUBLISH");

    // The production worker was started after publishing.
    assert!(h.engine.registry().get(&policy.id).is_some());
}

#[tokio::test]
async fn test_invalid_report_leaves_policy_untouched() {
    let h = Harness::with(EngineConfig::default(), WorkerMode::Invalid).await;
    let (policy, _) = h.draft_with_schema("Carbon").await;

    let result = h
        .engine
        .validate_and_publish(&policy.id, "1.0.0", &h.owner)
        .await
        .unwrap();
    assert!(!result.is_valid);
    assert_eq!(result.errors.invalid_blocks().count(), 1);

    let stored = h.store.get_policy(&policy.id).await.unwrap().unwrap();
    assert_eq!(stored, policy);
    assert!(h
        .ledger
        .messages_with_action(&Namespace::Production, MessageAction::PublishPolicy)
        .is_empty());
    // The validation worker was torn down.
    assert!(h.engine.registry().is_empty());
}

#[tokio::test]
async fn test_publish_preconditions() {
    let h = Harness::new().await;
    let (policy, _) = h.draft_with_schema("Carbon").await;

    let err = h
        .engine
        .validate_and_publish(&policy.id, "1.a", &h.owner)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidVersionFormat(_)));

    let empty = h
        .engine
        .create(PolicyDraft::new("Empty", json!({})), &h.owner)
        .await
        .unwrap();
    let err = h
        .engine
        .validate_and_publish(&empty.id, "1.0.0", &h.owner)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::EmptyConfig));

    let missing = pledger_core::PolicyId::new();
    let err = h
        .engine
        .validate_and_publish(&missing, "1.0.0", &h.owner)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::PolicyNotFound(_)));

    h.engine
        .validate_and_publish(&policy.id, "1.0.0", &h.owner)
        .await
        .unwrap();
    let err = h
        .engine
        .validate_and_publish(&policy.id, "2.0.0", &h.owner)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AlreadyPublished));
}

#[tokio::test]
async fn test_version_must_exceed_previous() {
    let h = Harness::new().await;
    let (first, _) = h.draft_with_schema("Carbon").await;

    let draft = PolicyDraft {
        uuid: Some(first.uuid.clone()),
        creator: Some(h.owner.clone()),
        topic_id: first.topic_id.clone(),
        previous_version: Some("1.2.0".into()),
        ..PolicyDraft::new("Carbon", first.config.clone())
    };
    let next = h.engine.create(draft, &h.owner).await.unwrap();

    for version in ["1.2.0", "1.1.9", "1.2"] {
        let err = h
            .engine
            .validate_and_publish(&next.id, version, &h.owner)
            .await
            .unwrap_err();
        assert!(
            matches!(err, EngineError::VersionNotGreater { .. }),
            "{version} accepted"
        );
    }
    let result = h
        .engine
        .validate_and_publish(&next.id, "1.10.0", &h.owner)
        .await
        .unwrap();
    assert_eq!(result.policy.version.as_deref(), Some("1.10.0"));
}

#[tokio::test]
async fn test_version_must_exceed_published_sibling() {
    let h = Harness::new().await;
    let (first, _) = h.draft_with_schema("Carbon").await;
    let first = h.engine.publish(&first.id, &h.owner, "2.0.0").await.unwrap();

    let draft = PolicyDraft {
        uuid: Some(first.uuid.clone()),
        creator: Some(h.owner.clone()),
        topic_id: first.topic_id.clone(),
        ..PolicyDraft::new("Carbon", first.config.clone())
    };
    let second = h.engine.create(draft, &h.owner).await.unwrap();
    assert_eq!(second.previous_version.as_deref(), Some("2.0.0"));

    // The published sibling still bounds a row whose previous version is lost.
    let mut stale = second.clone();
    stale.previous_version = None;
    h.store.update_policy(stale).await.unwrap();

    for version in ["0.1.0", "2.0.0", "1.99.99"] {
        let err = h
            .engine
            .validate_and_publish(&second.id, version, &h.owner)
            .await
            .unwrap_err();
        assert!(
            matches!(err, EngineError::VersionNotGreater { ref previous, .. } if previous == "2.0.0"),
            "{version} accepted"
        );
    }
    let result = h
        .engine
        .validate_and_publish(&second.id, "2.0.1", &h.owner)
        .await
        .unwrap();
    assert!(result.is_valid);
    assert_eq!(result.policy.version.as_deref(), Some("2.0.1"));
}

#[tokio::test]
async fn test_stale_previous_version_raised_on_create() {
    let h = Harness::new().await;
    let (first, _) = h.draft_with_schema("Carbon").await;
    let first = h.engine.publish(&first.id, &h.owner, "3.1.0").await.unwrap();

    let draft = PolicyDraft {
        uuid: Some(first.uuid.clone()),
        creator: Some(h.owner.clone()),
        topic_id: first.topic_id.clone(),
        previous_version: Some("1.0.0".into()),
        ..PolicyDraft::new("Carbon", first.config.clone())
    };
    let second = h.engine.create(draft, &h.owner).await.unwrap();
    assert_eq!(second.previous_version.as_deref(), Some("3.1.0"));
}

#[tokio::test]
async fn test_publish_error_reuses_instance_topic() {
    let h = Harness::new().await;
    let (policy, _) = h.draft_with_schema("Carbon").await;
    h.ledger.fail_submission(MessageAction::PublishPolicy, 0);

    let err = h.engine.publish(&policy.id, &h.owner, "1.0.0").await.unwrap_err();
    assert!(matches!(err, EngineError::Ledger(_)));

    let failed = h.store.get_policy(&policy.id).await.unwrap().unwrap();
    assert_eq!(failed.status, PolicyStatus::PublishError);
    assert_eq!(failed.version, None);
    let instance = failed.instance_topic_id.clone().unwrap();
    let sync = failed.synchronization_topic_id.clone().unwrap();

    let published = h.engine.publish(&policy.id, &h.owner, "1.0.0").await.unwrap();
    assert_eq!(published.status, PolicyStatus::Publish);
    assert_eq!(published.instance_topic_id, Some(instance));
    assert_eq!(published.synchronization_topic_id, Some(sync));
    assert_eq!(h.production_topics(TopicType::InstancePolicyTopic).len(), 1);
    assert_eq!(h.production_topics(TopicType::SynchronizationTopic).len(), 1);
}

#[tokio::test]
async fn test_failed_topic_creation_demotes_policy() {
    let h = Harness::new().await;
    let (policy, _) = h.draft_with_schema("Carbon").await;
    h.ledger.fail_topic_creation(TopicType::InstancePolicyTopic);

    let err = h.engine.publish(&policy.id, &h.owner, "1.0.0").await.unwrap_err();
    assert!(matches!(err, EngineError::Ledger(_)));
    let failed = h.store.get_policy(&policy.id).await.unwrap().unwrap();
    assert_eq!(failed.status, PolicyStatus::PublishError);
    assert_eq!(failed.instance_topic_id, None);
    assert_eq!(
        h.store
            .count_policies_with_version(&policy.uuid, "1.0.0")
            .await
            .unwrap(),
        0
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_publish_of_same_version() {
    let h = Harness::new().await;
    let (first, _) = h.draft_with_schema("Carbon").await;
    let draft = PolicyDraft {
        uuid: Some(first.uuid.clone()),
        creator: Some(h.owner.clone()),
        topic_id: first.topic_id.clone(),
        ..PolicyDraft::new("Carbon", first.config.clone())
    };
    let second = h.engine.create(draft, &h.owner).await.unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = [first.id, second.id]
        .into_iter()
        .map(|id| {
            let engine = Arc::clone(&h.engine);
            let owner = h.owner.clone();
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                engine.publish(&id, &owner, "1.0.0").await
            })
        })
        .collect();

    let mut published = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(policy) => {
                assert_eq!(policy.version.as_deref(), Some("1.0.0"));
                published += 1;
            }
            Err(EngineError::DuplicateVersion { version, .. }) => {
                assert_eq!(version, "1.0.0");
                duplicates += 1;
            }
            Err(other) => panic!("unexpected error {other}"),
        }
    }
    assert_eq!((published, duplicates), (1, 1));
    assert_eq!(
        h.store
            .count_policies_with_version(&first.uuid, "1.0.0")
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        h.ledger
            .messages_with_action(&Namespace::Production, MessageAction::PublishPolicy)
            .len(),
        1
    );
}

#[tokio::test]
async fn test_duplicate_version_across_rows() {
    let h = Harness::new().await;
    let (first, _) = h.draft_with_schema("Carbon").await;
    h.engine.publish(&first.id, &h.owner, "1.0.0").await.unwrap();

    let draft = PolicyDraft {
        uuid: Some(first.uuid.clone()),
        creator: Some(h.owner.clone()),
        topic_id: first.topic_id.clone(),
        ..PolicyDraft::new("Carbon", first.config.clone())
    };
    let second = h.engine.create(draft, &h.owner).await.unwrap();

    let err = h
        .engine
        .validate_and_publish(&second.id, "1.0.0", &h.owner)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::DuplicateVersion { .. }));

    let err = h.engine.publish(&second.id, &h.owner, "1.0.0").await.unwrap_err();
    assert!(matches!(err, EngineError::DuplicateVersion { .. }));
    let untouched = h.store.get_policy(&second.id).await.unwrap().unwrap();
    assert_eq!(untouched.status, PolicyStatus::Draft);
    assert_eq!(untouched.version, None);
}

// ─── Delete ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_delete_rules() {
    let h = Harness::new().await;
    let (published, _) = h.draft_with_schema("Published").await;
    h.engine.publish(&published.id, &h.owner, "1.0.0").await.unwrap();

    let err = h.engine.delete(&published.id, &h.owner).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidStatus(_)));

    let (draft, _) = h.draft_with_schema("Draft").await;
    let err = h
        .engine
        .delete(&draft.id, &Did::from("did:test:intruder"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::PermissionDenied { action: "delete" }));
    assert_eq!(
        err.to_string(),
        "Insufficient permissions to delete the policy"
    );
}

#[tokio::test]
async fn test_delete_draft_removes_schemas_and_artifacts() {
    let h = Harness::new().await;
    let (policy, _) = h.draft_with_schema("Carbon").await;
    let topic_id = policy.topic_id.clone().unwrap();
    h.store
        .save_artifact(
            Artifact {
                id: Uuid::new_v4(),
                uuid: "art-1".into(),
                policy_id: Some(policy.id),
                owner: h.owner.clone(),
                name: "calc".into(),
                extension: "js".into(),
                artifact_type: "executableCode".into(),
            },
            b"return 1;".to_vec(),
        )
        .await
        .unwrap();

    h.engine.delete(&policy.id, &h.owner).await.unwrap();

    assert!(h.store.get_policy(&policy.id).await.unwrap().is_none());
    assert!(h.store.get_schemas_by_topic(&topic_id).await.unwrap().is_empty());
    assert!(h.store.get_artifacts(&policy.id).await.unwrap().is_empty());
    assert!(h.store.get_artifact_file("art-1").await.unwrap().is_none());
    assert_eq!(
        h.ledger
            .messages_with_action(&Namespace::Production, MessageAction::DeletePolicy)
            .len(),
        1
    );
}

// ─── Clone and import ───────────────────────────────────────────────

#[tokio::test]
async fn test_clone_copies_schemas_into_new_topic() {
    let h = Harness::new().await;
    let (source, schema) = h.draft_with_schema("Carbon").await;

    let result = h
        .engine
        .clone_policy(
            &source.id,
            PolicyOverrides {
                name: Some("Carbon copy".into()),
                ..PolicyOverrides::default()
            },
            &h.owner,
        )
        .await
        .unwrap();
    assert!(result.errors.is_empty());

    let clone = result.policy;
    assert_eq!(clone.name, "Carbon copy");
    assert_ne!(clone.uuid, source.uuid);
    assert_ne!(clone.topic_id, source.topic_id);

    let schemas = h
        .store
        .get_schemas_by_topic(clone.topic_id.as_ref().unwrap())
        .await
        .unwrap();
    assert_eq!(schemas.len(), 1);
    assert_eq!(schemas[0].status, SchemaStatus::Draft);
    assert_ne!(schemas[0].iri, schema.iri);
    assert_eq!(clone.config["children"][0]["schema"], schemas[0].iri.as_str());

    // The source is untouched.
    let source_schemas = h
        .store
        .get_schemas_by_topic(source.topic_id.as_ref().unwrap())
        .await
        .unwrap();
    assert_eq!(source_schemas, vec![schema]);
}

#[tokio::test]
async fn test_clone_requires_creator() {
    let h = Harness::new().await;
    let (source, _) = h.draft_with_schema("Carbon").await;
    let err = h
        .engine
        .clone_policy(&source.id, PolicyOverrides::default(), &Did::from("did:test:other"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidOwner));
}

#[tokio::test]
async fn test_import_from_publish_message() {
    let h = Harness::new().await;
    let (policy, _) = h.draft_with_schema("Carbon").await;
    let published = h.engine.publish(&policy.id, &h.owner, "1.0.0").await.unwrap();
    let message_id = published.message_id.clone().unwrap();

    let preview = h.engine.prepare_preview(&message_id, "registry").await.unwrap();
    assert_eq!(preview.archive.policy.name, "Carbon");
    assert_eq!(preview.archive.tokens.len(), 1);
    assert!(preview.new_versions.is_empty());

    let importer = h.add_registry("importer", "did:test:importer").await;
    let result = h
        .engine
        .import_from_message(&message_id, &importer.did, None, PolicyOverrides::default())
        .await
        .unwrap();
    let imported = result.policy;
    assert_eq!(imported.owner, importer.did);
    assert_eq!(imported.status, PolicyStatus::Draft);
    assert_ne!(imported.uuid, published.uuid);
    // The importer does not hold the referenced token.
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains(TOKEN_ID));

    let schemas = h
        .store
        .get_schemas_by_topic(imported.topic_id.as_ref().unwrap())
        .await
        .unwrap();
    let copied: Vec<_> = schemas.iter().filter(|s| !s.readonly).collect();
    assert_eq!(copied.len(), 1);
    assert_eq!(imported.config["children"][0]["schema"], copied[0].iri.as_str());
}

#[tokio::test]
async fn test_preview_lists_newer_versions() {
    let h = Harness::new().await;
    let (first, _) = h.draft_with_schema("Carbon").await;
    let first = h.engine.publish(&first.id, &h.owner, "1.0.0").await.unwrap();

    let result = h
        .engine
        .import_from_message(
            first.message_id.as_ref().unwrap(),
            &h.owner,
            first.topic_id.clone(),
            PolicyOverrides::default(),
        )
        .await
        .unwrap();
    let second = result.policy;
    assert_eq!(second.uuid, first.uuid);
    assert_eq!(second.previous_version.as_deref(), Some("1.0.0"));
    h.engine.publish(&second.id, &h.owner, "2.0.0").await.unwrap();

    let preview = h
        .engine
        .prepare_preview(first.message_id.as_ref().unwrap(), "registry")
        .await
        .unwrap();
    let versions: Vec<_> = preview.new_versions.iter().map(|v| v.version.as_str()).collect();
    assert_eq!(versions, vec!["2.0.0"]);
}

#[tokio::test]
async fn test_preview_rejects_other_messages() {
    let h = Harness::new().await;
    let (policy, _) = h.draft_with_schema("Carbon").await;
    let create = h
        .ledger
        .messages_with_action(&Namespace::Production, MessageAction::CreatePolicy);
    let err = h
        .engine
        .prepare_preview(&create[0].id, "registry")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidMessage(m) if m == "Invalid Message Type"));

    let published = h.engine.publish(&policy.id, &h.owner, "1.0.0").await.unwrap();
    let err = h
        .engine
        .prepare_preview(published.message_id.as_ref().unwrap(), "nobody")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden));
}

// ─── Multi-policy ───────────────────────────────────────────────────

#[tokio::test]
async fn test_multi_policy_binding() {
    let h = Harness::new().await;
    let (policy, _) = h.draft_with_schema("Carbon").await;
    let published = h.engine.publish(&policy.id, &h.owner, "1.0.0").await.unwrap();
    let instance = PolicyInstance::of(&published);
    let request = MultiPolicyRequest {
        main_policy_topic_id: published.instance_topic_id.clone().unwrap(),
        synchronization_topic_id: published.synchronization_topic_id.clone().unwrap(),
    };

    let multi = h
        .engine
        .create_multi_policy(&instance, &h.root, &h.root, request.clone())
        .await
        .unwrap();
    assert_eq!(multi.role, MultiPolicyRole::Main);

    let again = h
        .engine
        .create_multi_policy(&instance, &h.root, &h.root, request)
        .await
        .unwrap();
    assert_eq!(again, multi);
    assert_eq!(
        h.ledger
            .messages_with_action(&Namespace::Production, MessageAction::CreateMultiPolicy)
            .len(),
        1
    );
}
