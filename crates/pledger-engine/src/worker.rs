//! # Worker Bridge
//!
//! Every model request follows the same handshake: resolve the execution
//! channel, register a readiness waiter, publish `GeneratePolicy`, wait with
//! the configured timeout. A timed-out worker is torn down.

use serde_json::Value;

use pledger_core::{PolicyId, ValidationReport};
use pledger_store::Policy;

use crate::bus::PolicyEvent;
use crate::engine::PolicyEngine;
use crate::error::EngineError;

/// What to build a model from.
#[derive(Debug, Clone)]
pub enum ModelTarget {
    /// A stored policy row.
    Stored(PolicyId),
    /// A policy that has not been saved. It is validated under a transient
    /// id so it cannot collide with a running worker.
    Unsaved(Box<Policy>),
}

impl PolicyEngine {
    /// Start (or restart) the worker of a stored policy and wait until it
    /// reports ready.
    pub async fn generate_model(&self, policy_id: &PolicyId) -> Result<(), EngineError> {
        let policy = self.load_policy(policy_id).await?;
        self.start_worker(policy).await?;
        tracing::info!(policy_id = %policy_id, "policy model ready");
        Ok(())
    }

    /// Build a throwaway model, collect its block validation report, and
    /// tear it down.
    pub async fn validate_model(&self, target: ModelTarget) -> Result<ValidationReport, EngineError> {
        let policy = match target {
            ModelTarget::Stored(id) => self.load_policy(&id).await?,
            ModelTarget::Unsaved(mut policy) => {
                policy.id = PolicyId::new();
                *policy
            }
        };
        let policy_id = policy.id;
        let outcome = self.start_worker(policy).await;
        if !matches!(outcome, Err(EngineError::WorkerTimeout { .. })) {
            self.destroy_model(&policy_id).await?;
        }
        let payload = outcome?;
        let report: ValidationReport = serde_json::from_value(payload)
            .map_err(|e| EngineError::InvalidReadyPayload(e.to_string()))?;
        tracing::debug!(
            policy_id = %policy_id,
            valid = report.is_valid(),
            invalid_blocks = report.invalid_blocks().count(),
            "policy model validated"
        );
        Ok(report)
    }

    /// Unregister the policy's channel and tell its worker to stop. A
    /// policy without a channel is left alone.
    pub async fn destroy_model(&self, policy_id: &PolicyId) -> Result<(), EngineError> {
        let Some(channel) = self.registry.remove(policy_id) else {
            tracing::debug!(policy_id = %policy_id, "no worker channel to destroy");
            return Ok(());
        };
        self.deps
            .bus
            .publish(PolicyEvent::DeletePolicy {
                policy_id: *policy_id,
                channel: channel.name,
            })
            .await?;
        Ok(())
    }

    /// Readiness callback from a worker. Returns whether a caller was
    /// waiting for it.
    pub fn run_ready_event(&self, policy_id: &PolicyId, payload: Value) -> bool {
        let delivered = self.ready.complete(policy_id, payload);
        tracing::info!(policy_id = %policy_id, delivered, "policy ready");
        delivered
    }

    async fn start_worker(&self, policy: Policy) -> Result<Value, EngineError> {
        let policy_id = policy.id;
        let channel = self.registry.get_or_create(&policy_id);
        let ticket = self.ready.register(policy_id);

        let event = PolicyEvent::GeneratePolicy {
            policy_id,
            policy: Box::new(policy),
            channel: channel.name,
            skip_registration: false,
        };
        if let Err(e) = self.deps.bus.publish(event).await {
            self.ready.cancel(ticket);
            return Err(e.into());
        }

        match self.ready.wait(ticket, self.config.ready_timeout()).await {
            Err(e @ EngineError::WorkerTimeout { .. }) => {
                tracing::warn!(policy_id = %policy_id, "worker not ready in time, tearing down");
                self.destroy_model(&policy_id).await?;
                Err(e)
            }
            other => other,
        }
    }
}
