//! Manager election.
//!
//! There is no voting round. Every candidate applies the same rule to its own
//! registry: among registered candidates, the one with the earliest startup
//! time manages the cluster, ties broken by hostname. Startup times travel in
//! every register and ping payload, so all nodes converge on the same answer
//! once their registries agree.

use super::coordinator::ClusterCoordinator;
use crate::observability;
use crate::types::HostEntry;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Minimum number of eligible hosts for an election.
pub const MIN_ELECTORATE: usize = 2;

/// Result of one election tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElectionOutcome {
    /// Cluster not initialized or too few eligible hosts; role unchanged.
    Skipped,
    Elected { manager: String, local: bool },
}

/// Pick the manager among `entries` accepted by `is_eligible`.
///
/// Independent of the order of `entries`.
pub fn elect(entries: &[HostEntry], is_eligible: impl Fn(&str) -> bool) -> Option<HostEntry> {
    let mut eligible: Vec<&HostEntry> = entries
        .iter()
        .filter(|e| is_eligible(&e.node.hostname))
        .collect();

    if eligible.len() < MIN_ELECTORATE {
        return None;
    }

    eligible.sort_by(|a, b| {
        a.node
            .startup_time
            .cmp(&b.node.startup_time)
            .then_with(|| a.node.hostname.cmp(&b.node.hostname))
    });
    eligible.first().map(|e| (*e).clone())
}

/// Run one election and apply the local role transition.
pub fn election_tick(coordinator: &ClusterCoordinator) -> ElectionOutcome {
    if !coordinator.is_initialized() {
        return ElectionOutcome::Skipped;
    }

    let snapshot = coordinator.registry().snapshot();
    let candidates = coordinator.candidates();
    let Some(manager) = elect(&snapshot, |h| candidates.is_registered(h)) else {
        debug!(known = snapshot.len(), "Not enough eligible hosts for an election");
        return ElectionOutcome::Skipped;
    };

    let manager = manager.node.hostname;
    let local = manager == coordinator.hostname();
    coordinator.set_elected(Some(manager.clone()));
    let was_manager = coordinator.set_manager(local);

    if local && !was_manager {
        info!("This node is now the cluster manager");
        if let Err(e) = coordinator.write_mode("manager") {
            warn!(error = %e, "Failed to write mode file");
        }
    } else if !local && was_manager {
        info!(manager = %manager, "Stepping down, another node manages the cluster");
        if let Err(e) = coordinator.write_mode("candidate") {
            warn!(error = %e, "Failed to write mode file");
        }
    }
    observability::set_manager(local);

    ElectionOutcome::Elected { manager, local }
}

/// Run the election loop forever.
pub async fn run_election_loop(coordinator: Arc<ClusterCoordinator>) {
    let interval = coordinator.config().timing.election_interval;
    loop {
        election_tick(&coordinator);
        tokio::time::sleep(interval).await;
    }
}
