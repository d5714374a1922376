//! # Readiness Rendezvous
//!
//! One one-shot slot per policy id. A waiter registers *before* the
//! control event goes out, so a fast worker cannot report readiness into an
//! empty table.
//!
//! - `complete` hands the payload to the current waiter, if any.
//! - A second `register` for the same id drops the older sender; the older
//!   waiter wakes with `WorkerCancelled`.
//! - On timeout the waiter removes its own slot (and only its own).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;

use pledger_core::PolicyId;

use crate::error::EngineError;

/// A registered waiter.
#[derive(Debug)]
pub struct ReadyTicket {
    policy_id: PolicyId,
    seq: u64,
    rx: oneshot::Receiver<Value>,
}

impl ReadyTicket {
    /// Policy the ticket waits for.
    pub fn policy_id(&self) -> PolicyId {
        self.policy_id
    }
}

/// Policy id → pending readiness waiter.
#[derive(Debug, Default)]
pub struct ReadyTable {
    next_seq: AtomicU64,
    waiters: DashMap<PolicyId, (u64, oneshot::Sender<Value>)>,
}

impl ReadyTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for `policy_id`, superseding any earlier one.
    pub fn register(&self, policy_id: PolicyId) -> ReadyTicket {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        if self.waiters.insert(policy_id, (seq, tx)).is_some() {
            tracing::debug!(policy_id = %policy_id, "readiness waiter superseded");
        }
        ReadyTicket { policy_id, seq, rx }
    }

    /// Deliver `payload` to the waiter of `policy_id`. Returns whether one
    /// was waiting.
    pub fn complete(&self, policy_id: &PolicyId, payload: Value) -> bool {
        match self.waiters.remove(policy_id) {
            Some((_, (_, tx))) => tx.send(payload).is_ok(),
            None => false,
        }
    }

    /// Withdraw a ticket that will never be awaited.
    pub fn cancel(&self, ticket: ReadyTicket) {
        self.waiters
            .remove_if(&ticket.policy_id, |_, (seq, _)| *seq == ticket.seq);
    }

    /// Wait for the ticket's payload for at most `timeout`.
    pub async fn wait(&self, ticket: ReadyTicket, timeout: Duration) -> Result<Value, EngineError> {
        let ReadyTicket { policy_id, seq, rx } = ticket;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(_)) => Err(EngineError::WorkerCancelled(policy_id)),
            Err(_) => {
                self.waiters.remove_if(&policy_id, |_, (s, _)| *s == seq);
                Err(EngineError::WorkerTimeout {
                    policy_id,
                    secs: timeout.as_secs(),
                })
            }
        }
    }

    /// Number of pending waiters.
    pub fn pending(&self) -> usize {
        self.waiters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_complete_wakes_waiter() {
        let table = Arc::new(ReadyTable::new());
        let id = PolicyId::new();
        let ticket = table.register(id);
        let t = table.clone();
        tokio::spawn(async move {
            assert!(t.complete(&id, json!({"ok": true})));
        });
        let payload = table.wait(ticket, Duration::from_secs(5)).await.unwrap();
        assert_eq!(payload, json!({"ok": true}));
        assert_eq!(table.pending(), 0);
    }

    #[tokio::test]
    async fn test_complete_without_waiter() {
        let table = ReadyTable::new();
        assert!(!table.complete(&PolicyId::new(), Value::Null));
    }

    #[tokio::test]
    async fn test_timeout_removes_own_slot() {
        let table = ReadyTable::new();
        let id = PolicyId::new();
        let ticket = table.register(id);
        let err = table.wait(ticket, Duration::from_millis(20)).await.unwrap_err();
        assert!(matches!(err, EngineError::WorkerTimeout { policy_id, .. } if policy_id == id));
        assert_eq!(table.pending(), 0);
    }

    #[tokio::test]
    async fn test_newer_registration_cancels_older() {
        let table = ReadyTable::new();
        let id = PolicyId::new();
        let older = table.register(id);
        let newer = table.register(id);
        let err = table.wait(older, Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, EngineError::WorkerCancelled(p) if p == id));

        // The older waiter's expiry must not evict the newer slot.
        assert_eq!(table.pending(), 1);
        assert!(table.complete(&id, json!(1)));
        assert_eq!(table.wait(newer, Duration::from_secs(5)).await.unwrap(), json!(1));
    }

    #[tokio::test]
    async fn test_cancel_only_removes_matching_ticket() {
        let table = ReadyTable::new();
        let id = PolicyId::new();
        let older = table.register(id);
        let _newer = table.register(id);
        table.cancel(older);
        assert_eq!(table.pending(), 1);
    }
}
