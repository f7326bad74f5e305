//! HA coordination for the hypervisor fleet.
//!
//! This module handles cluster-wide operations including:
//! - Node registry and candidate table
//! - Heartbeats and registration with candidate peers
//! - Quorum tracking and self-fencing
//! - Manager election
//! - Offline detection and workload failover

mod candidates;
mod coordinator;
mod election;
mod failover;
mod failure_detector;
mod heartbeat;
mod membership;
mod registry;
mod supervisor;

pub use candidates::{CandidateState, CandidateTable};
pub use coordinator::{ClusterCoordinator, ClusterState, HostStatus};
pub use election::{elect, election_tick, run_election_loop, ElectionOutcome, MIN_ELECTORATE};
pub use failover::{
    dedupe_latest, failover, plan_failover, FailedAction, FailoverAction, FailoverReport,
};
pub use failure_detector::{detect_offline, detect_offline_at, offline_hosts, run_offline_detector};
pub use heartbeat::{heartbeat_tick, registration_tick, run_heartbeat_loop, run_registration_loop};
pub use membership::{membership_tick, run_membership_loop, MembershipDecision, MembershipTracker};
pub use registry::NodeRegistry;
pub use supervisor::spawn_supervised;
pub(crate) use supervisor::panic_message;
