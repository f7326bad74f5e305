//! Offline detection from registry ageing.
//!
//! This signal is independent of the heartbeat failure counter: a node that
//! stops pinging us is caught here even if we never tried to ping it. Every
//! candidate runs the detector; only the manager's failover acts.

use super::coordinator::ClusterCoordinator;
use super::failover::{failover, FailoverReport};
use crate::observability;
use crate::types::{unix_now, HostEntry, Timestamp};
use std::sync::Arc;
use tracing::{debug, warn};

/// Entries whose last ping is older than their own failover timeout.
pub fn offline_hosts(entries: &[HostEntry], now: Timestamp) -> Vec<HostEntry> {
    entries
        .iter()
        .filter(|e| e.is_offline_at(now))
        .cloned()
        .collect()
}

/// Fail over and forget every node offline at `now`.
///
/// The local node is never declared offline by itself.
pub async fn detect_offline_at(coordinator: &ClusterCoordinator, now: Timestamp) -> Vec<FailoverReport> {
    let snapshot = coordinator.registry().snapshot();
    let mut reports = Vec::new();

    for entry in offline_hosts(&snapshot, now) {
        if entry.hostname() == coordinator.hostname() {
            continue;
        }

        warn!(
            host = %entry.node.hostname,
            last_ping = entry.last_ping,
            failover_time = entry.node.failover_time,
            "Node is offline"
        );
        observability::record_node_offline(&entry.node.hostname);

        let report = failover(coordinator, &entry).await;
        coordinator.registry().remove(&entry.node.hostname);
        reports.push(report);
    }

    reports
}

/// Fail over and forget every node offline now.
pub async fn detect_offline(coordinator: &ClusterCoordinator) -> Vec<FailoverReport> {
    detect_offline_at(coordinator, unix_now()).await
}

/// Run the offline detector forever. Only candidates detect; on a worker
/// this parks without returning.
pub async fn run_offline_detector(coordinator: Arc<ClusterCoordinator>) {
    if !coordinator.node_type().is_candidate() {
        debug!("Worker node, offline detection disabled");
        return std::future::pending().await;
    }

    let interval = coordinator.config().timing.offline_check_interval;
    loop {
        detect_offline(&coordinator).await;
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::super::coordinator::test_support::{harness, harness_with};
    use super::*;
    use crate::types::{Node, NodeType};
    use std::time::Duration;

    #[test]
    fn test_only_expired_hosts_flagged() {
        let now = 1_000;
        let entries = vec![
            HostEntry::new(Node::new("A", "", 1).with_failover_time(60), now - 100),
            HostEntry::new(Node::new("B", "", 1).with_failover_time(60), now - 10),
        ];
        let offline = offline_hosts(&entries, now);
        assert_eq!(offline.len(), 1);
        assert_eq!(offline[0].node.hostname, "A");
    }

    #[tokio::test]
    async fn test_offline_node_removed_even_when_not_manager() {
        let h = harness("a", &["a", "b", "c"]);
        let registry = h.coordinator.registry();
        registry.upsert_at(Node::new("a", "", 1).with_failover_time(60), 900);
        registry.upsert_at(Node::new("b", "", 1).with_failover_time(60), 990);
        registry.upsert_at(Node::new("c", "", 1).with_failover_time(60), 800);

        let reports = detect_offline_at(&h.coordinator, 1_000).await;

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].dead_host, "c");
        assert!(reports[0].not_manager);
        assert!(!registry.contains("c"));
        // local entry is never failed over
        assert!(registry.contains("a"));
        assert!(registry.contains("b"));
    }

    #[tokio::test]
    async fn test_worker_detector_parks_instead_of_returning() {
        let h = harness_with("w1", &["a", "b"], |config| {
            config.node.node_type = NodeType::Worker;
        });
        h.coordinator
            .registry()
            .upsert_at(Node::new("a", "", 1).with_failover_time(1), 0);

        let run = run_offline_detector(Arc::clone(&h.coordinator));
        let outcome = tokio::time::timeout(Duration::from_millis(100), run).await;

        assert!(outcome.is_err());
        assert!(h.coordinator.registry().contains("a"));
    }
}
