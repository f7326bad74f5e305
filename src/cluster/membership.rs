//! Quorum gate and self-fencing.
//!
//! The cluster is `initialized` the first time the number of registered
//! candidates reaches the initial quorum. The latch is one-way: once set, a
//! count below the safety floor terminates the process so a minority
//! partition can never act.

use super::coordinator::ClusterCoordinator;
use crate::observability;
use crate::process::FENCE_EXIT_CODE;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Result of observing one registered-candidate count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipDecision {
    /// Still waiting for the initial quorum.
    Forming { registered: usize },
    /// The quorum was reached on this observation.
    Initialized { registered: usize },
    /// Initialized and at or above the safety floor.
    Stable { registered: usize },
    /// Initialized and below the safety floor: the node must fence itself.
    QuorumLost { registered: usize },
}

/// Quorum latch.
#[derive(Debug, Clone)]
pub struct MembershipTracker {
    initial_quorum: usize,
    safety_floor: usize,
    initialized: bool,
}

impl MembershipTracker {
    pub fn new(initial_quorum: usize, safety_floor: usize) -> Self {
        Self {
            initial_quorum,
            safety_floor,
            initialized: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn observe(&mut self, registered: usize) -> MembershipDecision {
        if !self.initialized {
            if registered >= self.initial_quorum {
                self.initialized = true;
                return MembershipDecision::Initialized { registered };
            }
            return MembershipDecision::Forming { registered };
        }

        if registered < self.safety_floor {
            MembershipDecision::QuorumLost { registered }
        } else {
            MembershipDecision::Stable { registered }
        }
    }
}

/// Count registered candidates, update the latch and fence on quorum loss.
pub fn membership_tick(coordinator: &ClusterCoordinator) -> MembershipDecision {
    let registered = coordinator.candidates().registered_count();
    observability::set_registered_candidates(registered);

    let decision = coordinator.membership().lock().observe(registered);
    match decision {
        MembershipDecision::Forming { registered } => {
            debug!(registered, "Waiting for cluster quorum");
        }
        MembershipDecision::Initialized { registered } => {
            info!(registered, "Cluster quorum reached, HA initialized");
        }
        MembershipDecision::Stable { registered } => {
            debug!(registered, "Cluster membership stable");
        }
        MembershipDecision::QuorumLost { registered } => {
            error!(
                registered,
                floor = coordinator.config().quorum.safety_floor,
                "Lost cluster quorum, fencing this node"
            );
            coordinator.process().exit(FENCE_EXIT_CODE);
        }
    }
    decision
}

/// Run the membership tracker forever.
pub async fn run_membership_loop(coordinator: Arc<ClusterCoordinator>) {
    let interval = coordinator.config().timing.membership_interval;
    loop {
        membership_tick(&coordinator);
        tokio::time::sleep(interval).await;
    }
}
