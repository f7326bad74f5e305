// Test fixtures for integration tests

use super::cluster_sim::NodeDecl;
use hoster_ha::config::{CandidateConfig, HaConfig};
use hoster_ha::types::{FailoverStrategy, Workload};
use std::path::Path;
use std::time::Duration;

pub const HA_USER: &str = "ha";
pub const HA_PASSWORD: &str = "pw";

/// Candidate list entry for a simulated node.
pub fn candidate_entry(decl: &NodeDecl) -> CandidateConfig {
    CandidateConfig {
        hostname: decl.hostname.clone(),
        protocol: "http".to_string(),
        address: decl.hostname.clone(),
        port: 3000,
        user: HA_USER.to_string(),
        password: HA_PASSWORD.to_string(),
        failover_strategy: FailoverStrategy::CiReset,
        failover_time: decl.failover_time,
        backup_node: decl.backup_node,
    }
}

/// Configuration for a simulated node, with runtime files under `dir`.
pub fn node_config(decl: &NodeDecl, dir: &Path) -> HaConfig {
    let mut config = HaConfig::development();
    config.node.hostname = Some(decl.hostname.clone());
    config.node.node_type = decl.node_type;
    config.node.failover_time = decl.failover_time;
    config.node.backup_node = decl.backup_node;
    config.api.ha_user = HA_USER.to_string();
    config.api.ha_password = HA_PASSWORD.to_string();
    config.quorum.initial_quorum = 3;
    config.quorum.safety_floor = 2;
    config.timing.terminate_grace = Duration::from_millis(50);
    config.runtime.mode_file = dir.join(format!("{}.mode", decl.hostname));
    config.runtime.inventory_file = dir.join(format!("{}.inventory.json", decl.hostname));
    config.runtime.watchdog_pid_file = dir.join(format!("{}.watchdog.pid", decl.hostname));
    config
}

/// A production workload owned by `parent`.
pub fn production(name: &str, parent: &str, snapshot: &str) -> Workload {
    Workload {
        name: name.to_string(),
        running: false,
        latest_snapshot: snapshot.to_string(),
        parent_host: parent.to_string(),
        production: true,
        failover_strategy: None,
    }
}

/// A workload that does not take part in HA.
pub fn scratch(name: &str, parent: &str) -> Workload {
    Workload {
        production: false,
        ..production(name, parent, "2024-01-01")
    }
}
