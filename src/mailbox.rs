//! Per-group mailboxes
//!
//! Messages wait here, in arrival order, until some client asks for the
//! group they were addressed to.

use std::collections::{HashMap, VecDeque};

use crate::types::GroupId;

/// A message waiting for retrieval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    /// Group that sent it
    pub origin: GroupId,
    /// Message text
    pub body: String,
}

impl PendingMessage {
    pub fn new(origin: GroupId, body: String) -> Self {
        Self { origin, body }
    }

    /// Reply text for GETMSGS: `From <origin>: <body>`
    pub fn render(&self) -> String {
        format!("From {}: {}", self.origin, self.body)
    }
}

/// Group → FIFO of pending messages
///
/// An empty queue and a missing entry mean the same thing; queues are
/// created on first enqueue and removed when drained.
#[derive(Debug, Default)]
pub struct MailboxStore {
    queues: HashMap<GroupId, VecDeque<PendingMessage>>,
}

impl MailboxStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to `dest`'s queue
    pub fn enqueue(&mut self, dest: GroupId, origin: GroupId, body: String) {
        self.queues
            .entry(dest)
            .or_default()
            .push_back(PendingMessage::new(origin, body));
    }

    /// Take every queued message for `group`, oldest first
    pub fn drain_all(&mut self, group: &GroupId) -> Vec<PendingMessage> {
        self.queues
            .remove(group)
            .map(Vec::from)
            .unwrap_or_default()
    }

    /// Number of messages waiting for `group`
    pub fn count(&self, group: &GroupId) -> usize {
        self.queues.get(group).map_or(0, VecDeque::len)
    }

    /// Number of groups with at least one pending message
    pub fn group_count(&self) -> usize {
        self.queues.len()
    }

    /// Total pending messages across all groups
    pub fn total_pending(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }
}
