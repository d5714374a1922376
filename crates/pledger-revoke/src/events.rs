//! # Block Events
//!
//! What the revoke block hands downstream once documents are updated.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;

use pledger_core::Did;
use pledger_store::Document;

/// Event emitted by a workflow block.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BlockEvent {
    /// Pass documents to the blocks wired after this one.
    #[serde(rename_all = "camelCase")]
    Run {
        /// Emitting block.
        block_tag: String,
        /// Acting user.
        user: Did,
        /// Updated documents.
        documents: Vec<Document>,
    },
    /// Release the blocks waiting on this one.
    #[serde(rename_all = "camelCase")]
    Release {
        /// Emitting block.
        block_tag: String,
        /// Acting user.
        user: Did,
    },
    /// Read-only notification for consumers outside the workflow.
    #[serde(rename_all = "camelCase")]
    External {
        /// Emitting block.
        block_tag: String,
        /// Acting user.
        user: Did,
        /// Snapshot of the updated documents.
        documents: Vec<Document>,
    },
}

impl BlockEvent {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Run { .. } => "run",
            Self::Release { .. } => "release",
            Self::External { .. } => "external",
        }
    }
}

/// Receiver of block events.
#[async_trait]
pub trait BlockEventSink: Send + Sync {
    /// Deliver one event.
    async fn emit(&self, event: BlockEvent);
}

/// Sink that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<BlockEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far, oldest first.
    pub fn events(&self) -> Vec<BlockEvent> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl BlockEventSink for RecordingSink {
    async fn emit(&self, event: BlockEvent) {
        tracing::debug!(kind = event.kind(), "block event");
        self.events.lock().push(event);
    }
}
