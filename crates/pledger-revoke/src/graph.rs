//! # Message Dependency Graph
//!
//! Message B depends on message A when A's id is among B's relationships.
//! The graph is built once from a snapshot of the policy's topics; revocation
//! records are not nodes.
//!
//! The walk is an iterative depth-first search with an explicit visited set,
//! so cycles and diamonds terminate and every reachable message is reported
//! exactly once. Predecessors are collected per edge, not per visit: a
//! message reached along two paths lists both predecessors regardless of the
//! order the walk took.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use pledger_core::{MessageId, TopicId};
use pledger_ledger::LedgerMessage;

use crate::error::GraphError;

/// One message to revoke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationEntry {
    /// Message to withdraw.
    pub message_id: MessageId,
    /// Topic the message lives on; the revocation record goes there too.
    pub topic_id: TopicId,
    /// Declared predecessors the walk passed through. Sorted, no duplicates.
    pub parent_ids: Vec<MessageId>,
}

/// Output of [`MessageGraph::plan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationPlan {
    /// Walk origin.
    pub trigger: MessageId,
    /// Messages to revoke, in ledger order.
    pub entries: Vec<RevocationEntry>,
    /// Reached messages that were already revoked.
    pub skipped: Vec<MessageId>,
}

impl RevocationPlan {
    /// Number of revocation records the plan submits.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is left to revoke.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids of the planned entries, in submission order.
    pub fn message_ids(&self) -> Vec<MessageId> {
        self.entries.iter().map(|e| e.message_id.clone()).collect()
    }
}

/// Snapshot of a policy's ledger messages indexed for the dependency walk.
#[derive(Debug, Clone, Default)]
pub struct MessageGraph {
    messages: Vec<LedgerMessage>,
    index: HashMap<MessageId, usize>,
    dependants: HashMap<MessageId, Vec<usize>>,
}

impl MessageGraph {
    /// Build from messages in ledger order. Revocation records are dropped;
    /// a repeated id keeps its first occurrence.
    pub fn new(messages: impl IntoIterator<Item = LedgerMessage>) -> Self {
        let mut graph = Self::default();
        for message in messages {
            if message.is_revocation_record() || graph.index.contains_key(&message.id) {
                continue;
            }
            let pos = graph.messages.len();
            for predecessor in &message.relationships {
                graph
                    .dependants
                    .entry(predecessor.clone())
                    .or_default()
                    .push(pos);
            }
            graph.index.insert(message.id.clone(), pos);
            graph.messages.push(message);
        }
        graph
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Look a node up by id.
    pub fn get(&self, id: &MessageId) -> Option<&LedgerMessage> {
        self.index.get(id).map(|&pos| &self.messages[pos])
    }

    /// Messages that declare `id` as a predecessor.
    pub fn dependants<'a>(&'a self, id: &MessageId) -> impl Iterator<Item = &'a LedgerMessage> + 'a {
        self.dependants
            .get(id)
            .into_iter()
            .flatten()
            .map(move |&pos| &self.messages[pos])
    }

    /// Everything reachable from `trigger` through dependants.
    ///
    /// Already-revoked messages are walked through, so their descendants stay
    /// reachable, but they are listed in `skipped` instead of `entries`. The
    /// trigger itself carries no parent ids.
    pub fn plan(&self, trigger: &MessageId) -> Result<RevocationPlan, GraphError> {
        let start = *self
            .index
            .get(trigger)
            .ok_or_else(|| GraphError::TriggerNotFound(trigger.clone()))?;

        let mut visited: HashSet<usize> = HashSet::new();
        let mut parents: HashMap<usize, BTreeSet<MessageId>> = HashMap::new();
        let mut stack = vec![start];

        while let Some(pos) = stack.pop() {
            if !visited.insert(pos) {
                continue;
            }
            let id = &self.messages[pos].id;
            for &child in self.dependants.get(id).into_iter().flatten() {
                if child != start {
                    parents.entry(child).or_default().insert(id.clone());
                }
                if !visited.contains(&child) {
                    stack.push(child);
                }
            }
        }

        let mut reached: Vec<usize> = visited.into_iter().collect();
        reached.sort_unstable();

        let mut entries = Vec::with_capacity(reached.len());
        let mut skipped = Vec::new();
        for pos in reached {
            let message = &self.messages[pos];
            if message.revoked {
                skipped.push(message.id.clone());
                continue;
            }
            entries.push(RevocationEntry {
                message_id: message.id.clone(),
                topic_id: message.topic_id.clone(),
                parent_ids: parents
                    .remove(&pos)
                    .map(|p| p.into_iter().collect())
                    .unwrap_or_default(),
            });
        }

        Ok(RevocationPlan {
            trigger: trigger.clone(),
            entries,
            skipped,
        })
    }
}
