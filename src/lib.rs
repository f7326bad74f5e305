//! hoster-ha - High-availability coordination for a fleet of hypervisor hosts.
//!
//! Every host runs one `hoster-ha` process. Together they keep a shared view
//! of which hosts are alive, elect one manager among a fixed set of candidate
//! nodes, and move the production VMs and jails of a host that went offline
//! to the surviving host holding their freshest snapshot.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          hoster-ha                            │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Control Surface: register | ping | terminate | lists | status│
//! ├──────────────────────────────────────────────────────────────┤
//! │  ClusterCoordinator: Node Registry | Candidate Table | Latch  │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Loops: Heartbeat | Registration | Membership | Election |    │
//! │         Offline Detector -> Failover Orchestrator             │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Collaborators: PeerClient | WorkloadInventory | Process      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use hoster_ha::config::HaConfig;
//!
//! #[tokio::main]
//! async fn main() -> hoster_ha::Result<()> {
//!     let config = HaConfig::development();
//!     hoster_ha::run(config).await
//! }
//! ```

pub mod config;
pub mod error;
pub mod types;

pub mod api;
pub mod cli;
pub mod client;
pub mod cluster;
pub mod inventory;
pub mod observability;
pub mod process;
pub mod shutdown;

// Re-exports
pub use error::{HaError, Result};
pub use types::*;

use client::HttpPeerClient;
use cluster::{
    run_election_loop, run_heartbeat_loop, run_membership_loop, run_offline_detector,
    run_registration_loop, spawn_supervised, ClusterCoordinator,
};
use config::HaConfig;
use inventory::FileInventory;
use process::SystemProcess;
use shutdown::{ShutdownCoordinator, SignalHandler};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Run the HA daemon with the given configuration until a shutdown signal.
pub async fn run(config: HaConfig) -> Result<()> {
    observability::init(&config.observability)?;
    config.validate()?;

    let client = HttpPeerClient::with_timeouts(
        config.timing.connect_timeout,
        config.timing.request_timeout,
    );
    let inventory = FileInventory::new(&config.runtime.inventory_file);
    let process = SystemProcess::new(&config.runtime.watchdog_pid_file);
    let bind_addr = config.api.bind_addr;

    let coordinator = Arc::new(ClusterCoordinator::new(
        config,
        Arc::new(client),
        Arc::new(inventory),
        Arc::new(process),
    )?);

    info!(
        hostname = %coordinator.hostname(),
        node_type = %coordinator.node_type(),
        startup_time = coordinator.local_node().startup_time,
        "Starting HA services"
    );

    // The node cannot participate without its run-state file.
    coordinator.write_mode(&coordinator.node_type().to_string())?;

    let listener = TcpListener::bind(bind_addr).await?;
    let shutdown = ShutdownCoordinator::new();
    let handles = spawn_loops(&coordinator, &shutdown);

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = SignalHandler::new(signal_shutdown.clone()).run().await {
            error!(error = %e, "Failed to install signal handlers");
            signal_shutdown.shutdown();
        }
    });

    let served = api::serve(listener, Arc::clone(&coordinator), shutdown.clone()).await;
    if let Err(e) = &served {
        error!(error = %e, "Control surface stopped");
    }

    shutdown.shutdown();
    for handle in handles {
        let _ = handle.await;
    }

    info!("HA shutdown complete");
    served
}

/// Start every background loop under supervision.
///
/// Election and offline detection only run on candidate nodes.
pub fn spawn_loops(
    coordinator: &Arc<ClusterCoordinator>,
    shutdown: &ShutdownCoordinator,
) -> Vec<JoinHandle<()>> {
    let delay = coordinator.config().timing.restart_delay;
    let mut handles = Vec::new();

    let c = Arc::clone(coordinator);
    handles.push(spawn_supervised("heartbeat", shutdown.clone(), delay, move || {
        run_heartbeat_loop(Arc::clone(&c))
    }));

    let c = Arc::clone(coordinator);
    handles.push(spawn_supervised("registration", shutdown.clone(), delay, move || {
        run_registration_loop(Arc::clone(&c))
    }));

    let c = Arc::clone(coordinator);
    handles.push(spawn_supervised("membership", shutdown.clone(), delay, move || {
        run_membership_loop(Arc::clone(&c))
    }));

    if coordinator.node_type().is_candidate() {
        let c = Arc::clone(coordinator);
        handles.push(spawn_supervised("election", shutdown.clone(), delay, move || {
            run_election_loop(Arc::clone(&c))
        }));

        let c = Arc::clone(coordinator);
        handles.push(spawn_supervised("offline-detector", shutdown.clone(), delay, move || {
            run_offline_detector(Arc::clone(&c))
        }));
    }

    handles
}
