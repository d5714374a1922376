//! Shared harness: an engine over the in-memory store, ledger and accounts,
//! with a simulated worker answering control events.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, Weak};

use serde_json::{json, Value};
use tokio::sync::mpsc;

use pledger_core::{Did, Namespace, TopicId};
use pledger_engine::{
    ChannelControlBus, Collaborators, EngineConfig, PolicyDraft, PolicyEngine, PolicyEvent,
};
use pledger_ledger::{
    LedgerAccount, MemoryAccounts, MemoryLedger, ProvisionedTopic, TopicKeys, TopicSpec,
    TopicType, UserRole,
};
use pledger_store::{MemoryStore, Policy, PolicyStore, Schema, Token, Topic};
use pledger_vc::Ed25519Issuer;

pub const TOKEN_ID: &str = "0.0.900";

/// How the simulated worker answers `GeneratePolicy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerMode {
    /// Ready with a clean validation report.
    Valid,
    /// Ready with one invalid block.
    Invalid,
    /// Never ready.
    Silent,
}

pub struct Harness {
    pub engine: Arc<PolicyEngine>,
    pub store: Arc<MemoryStore>,
    pub ledger: Arc<MemoryLedger>,
    pub accounts: Arc<MemoryAccounts>,
    pub owner: Did,
    pub root: LedgerAccount,
    pub events: Arc<Mutex<Vec<PolicyEvent>>>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with(EngineConfig::default(), WorkerMode::Valid).await
    }

    pub async fn with(config: EngineConfig, mode: WorkerMode) -> Self {
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(MemoryLedger::new());
        let accounts = Arc::new(MemoryAccounts::new());
        let (bus, rx) = ChannelControlBus::new(64);

        let engine = Arc::new(PolicyEngine::new(
            Collaborators {
                store: store.clone(),
                ledger: ledger.clone(),
                topics: ledger.clone(),
                accounts: accounts.clone(),
                issuer: Arc::new(Ed25519Issuer),
                bus: Arc::new(bus),
            },
            config,
        ));
        let events = Arc::new(Mutex::new(Vec::new()));
        spawn_worker(Arc::downgrade(&engine), rx, mode, events.clone());

        let mut harness = Self {
            engine,
            store,
            ledger,
            accounts,
            owner: Did::from("did:test:registry"),
            root: LedgerAccount {
                account_id: String::new(),
                account_key: String::new(),
                did: Did::from("did:test:registry"),
            },
            events,
        };
        harness.root = harness.add_registry("registry", "did:test:registry").await;
        harness
    }

    /// Register a Standard Registry with a root account and user topic.
    pub async fn add_registry(&self, username: &str, did: &str) -> LedgerAccount {
        let did = Did::from(did);
        let account = self
            .accounts
            .register(username, Some(did.clone()), UserRole::StandardRegistry)
            .unwrap();
        let spec = TopicSpec::new(TopicType::UserTopic, username, did);
        let topic_id = self.ledger.seed_topic(Namespace::Production, spec.clone());
        let topic = Topic::provisioned(
            ProvisionedTopic {
                topic_id,
                keys: TopicKeys::default(),
            },
            &spec,
            None,
        );
        self.store.save_topic(&Namespace::Production, topic).await.unwrap();
        account
    }

    /// A draft with one draft schema in its topic and a config referencing
    /// it and an owned token.
    pub async fn draft_with_schema(&self, name: &str) -> (Policy, Schema) {
        let policy = self
            .engine
            .create(PolicyDraft::new(name, json!({"id": "root", "children": []})), &self.owner)
            .await
            .unwrap();
        let schema = Schema::draft("Project", self.owner.clone(), policy.topic_id.clone());
        self.store.save_schema(schema.clone()).await.unwrap();
        self.store
            .save_token(Token {
                token_id: TOKEN_ID.into(),
                name: "Carbon Credit".into(),
                symbol: "CC".into(),
                owner: self.owner.clone(),
            })
            .await
            .unwrap();

        let mut policy = policy;
        policy.config = sample_config(&schema.iri);
        let policy = self.store.update_policy(policy).await.unwrap();
        (policy, schema)
    }

    /// Control events seen by the worker so far.
    pub fn events(&self) -> Vec<PolicyEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn delete_events(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, PolicyEvent::DeletePolicy { .. }))
            .count()
    }

    pub fn production_topics(&self, topic_type: TopicType) -> Vec<TopicId> {
        self.ledger.topics_of_type(&Namespace::Production, topic_type)
    }
}

pub fn sample_config(schema_iri: &str) -> Value {
    json!({
        "id": "root",
        "blockType": "interfaceContainerBlock",
        "children": [
            {"id": "request", "blockType": "requestVcDocumentBlock", "schema": schema_iri},
            {"id": "mint", "blockType": "mintDocumentBlock", "tokenId": TOKEN_ID}
        ]
    })
}

fn spawn_worker(
    engine: Weak<PolicyEngine>,
    mut rx: mpsc::Receiver<PolicyEvent>,
    mode: WorkerMode,
    events: Arc<Mutex<Vec<PolicyEvent>>>,
) {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            events.lock().unwrap().push(event.clone());
            let PolicyEvent::GeneratePolicy { policy_id, .. } = event else {
                continue;
            };
            let payload = match mode {
                WorkerMode::Valid => json!({"blocks": [], "commonErrors": []}),
                WorkerMode::Invalid => json!({
                    "blocks": [{"id": "request", "isValid": false, "errors": ["Schema is not set"]}],
                    "commonErrors": []
                }),
                WorkerMode::Silent => continue,
            };
            let Some(engine) = engine.upgrade() else {
                break;
            };
            engine.run_ready_event(&policy_id, payload);
        }
    });
}
