//! # Worker Registry
//!
//! Maps a policy id to the named execution channel its worker listens on.
//! The registry is owned by one engine; nothing here is process-global.

use dashmap::DashMap;
use uuid::Uuid;

use pledger_core::PolicyId;

/// A worker's execution channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerChannel {
    /// Channel name, unique per registration.
    pub name: String,
}

/// Policy id → execution channel.
#[derive(Debug)]
pub struct WorkerRegistry {
    prefix: String,
    channels: DashMap<PolicyId, WorkerChannel>,
}

impl WorkerRegistry {
    /// Empty registry naming channels `<prefix>-<policy>-<suffix>`.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            channels: DashMap::new(),
        }
    }

    /// The channel of `policy_id`, registering a new one if absent.
    pub fn get_or_create(&self, policy_id: &PolicyId) -> WorkerChannel {
        self.channels
            .entry(*policy_id)
            .or_insert_with(|| WorkerChannel {
                name: self.channel_name(policy_id),
            })
            .clone()
    }

    /// The channel of `policy_id`, if registered.
    pub fn get(&self, policy_id: &PolicyId) -> Option<WorkerChannel> {
        self.channels.get(policy_id).map(|c| c.clone())
    }

    /// Unregister and return the channel of `policy_id`.
    pub fn remove(&self, policy_id: &PolicyId) -> Option<WorkerChannel> {
        self.channels.remove(policy_id).map(|(_, c)| c)
    }

    /// Number of registered channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether no channel is registered.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    fn channel_name(&self, policy_id: &PolicyId) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!("{}-{}-{}", self.prefix, policy_id, &suffix[..8])
    }
}
