//! # Control Bus
//!
//! Out-of-process workflow workers are driven by two control events. The
//! engine only publishes; workers report back through
//! [`PolicyEngine::run_ready_event`](crate::PolicyEngine::run_ready_event).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use pledger_core::PolicyId;
use pledger_store::Policy;

use crate::error::BusError;

/// Control event addressed to a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyEvent {
    /// Build the policy's block model and report readiness.
    #[serde(rename_all = "camelCase")]
    GeneratePolicy {
        /// Policy to build.
        policy_id: PolicyId,
        /// Row snapshot the worker builds from.
        policy: Box<Policy>,
        /// Execution channel name.
        channel: String,
        /// Skip block registration (validation runs).
        skip_registration: bool,
    },
    /// Tear the policy's model down.
    #[serde(rename_all = "camelCase")]
    DeletePolicy {
        /// Policy to tear down.
        policy_id: PolicyId,
        /// Execution channel name.
        channel: String,
    },
}

impl PolicyEvent {
    /// Target policy.
    pub fn policy_id(&self) -> PolicyId {
        match self {
            Self::GeneratePolicy { policy_id, .. } | Self::DeletePolicy { policy_id, .. } => {
                *policy_id
            }
        }
    }
}

/// Publishes control events.
#[async_trait]
pub trait ControlBus: Send + Sync {
    /// Publish one event.
    async fn publish(&self, event: PolicyEvent) -> Result<(), BusError>;
}

/// In-process bus over a bounded `mpsc` channel.
#[derive(Debug, Clone)]
pub struct ChannelControlBus {
    tx: mpsc::Sender<PolicyEvent>,
}

impl ChannelControlBus {
    /// A bus and the receiving end workers subscribe to.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<PolicyEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ControlBus for ChannelControlBus {
    async fn publish(&self, event: PolicyEvent) -> Result<(), BusError> {
        tracing::debug!(policy_id = %event.policy_id(), ?event, "control event");
        self.tx.send(event).await.map_err(|_| BusError::Closed)
    }
}
