//! Live table of every node that has registered with or pinged this process.

use crate::types::{unix_now, HostEntry, Node, Timestamp};
use parking_lot::RwLock;
use tracing::debug;

/// In-memory node registry.
///
/// Entries are keyed by hostname. Readers always get a copy of the table, so
/// no caller ever iterates while a writer holds the lock.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    entries: RwLock<Vec<HostEntry>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh a node, stamping its last ping with the current time.
    pub fn upsert(&self, node: Node) {
        self.upsert_at(node, unix_now());
    }

    /// Insert or refresh a node with an explicit ping time.
    ///
    /// Existing entries take the new address and port, a newer startup time,
    /// and a last ping that never moves backwards.
    pub fn upsert_at(&self, node: Node, now: Timestamp) {
        let mut entries = self.entries.write();

        if let Some(entry) = entries.iter_mut().find(|e| e.node.hostname == node.hostname) {
            entry.node.address = node.address;
            entry.node.port = node.port;
            entry.node.protocol = node.protocol;
            entry.node.user = node.user;
            entry.node.password = node.password;
            entry.node.failover_strategy = node.failover_strategy;
            entry.node.failover_time = node.failover_time;
            entry.node.backup_node = node.backup_node;
            if node.startup_time > entry.node.startup_time {
                entry.node.startup_time = node.startup_time;
            }
            entry.last_ping = entry.last_ping.max(now);
            return;
        }

        debug!(host = %node.hostname, "New node added to registry");
        entries.push(HostEntry::new(node, now));
    }

    /// Remove a node by hostname. Returns whether an entry was removed.
    pub fn remove(&self, hostname: &str) -> bool {
        let mut entries = self.entries.write();
        match entries.iter().position(|e| e.node.hostname == hostname) {
            Some(index) => {
                entries.swap_remove(index);
                true
            }
            None => false,
        }
    }

    /// Copy of the whole table.
    pub fn snapshot(&self) -> Vec<HostEntry> {
        self.entries.read().clone()
    }

    pub fn get(&self, hostname: &str) -> Option<HostEntry> {
        self.entries
            .read()
            .iter()
            .find(|e| e.node.hostname == hostname)
            .cloned()
    }

    pub fn contains(&self, hostname: &str) -> bool {
        self.entries.read().iter().any(|e| e.node.hostname == hostname)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
