//! Cluster coordinator: owner of all shared HA state.
//!
//! One [`ClusterCoordinator`] exists per process. It owns the node registry,
//! the candidate table and the membership latch, and holds the collaborators
//! (peer client, workload inventory, process control). Background loops and
//! HTTP handlers receive it as an `Arc` instead of reading globals.

use super::candidates::CandidateTable;
use super::membership::MembershipTracker;
use super::registry::NodeRegistry;
use crate::client::PeerClient;
use crate::config::HaConfig;
use crate::error::Result;
use crate::inventory::WorkloadInventory;
use crate::process::ProcessControl;
use crate::types::{unix_now, JailReport, Node, NodeType, Timestamp, VmReport};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Shared HA state of this process.
pub struct ClusterCoordinator {
    config: HaConfig,
    /// Payload this node sends to its peers.
    local: Node,
    node_type: NodeType,
    registry: NodeRegistry,
    candidates: CandidateTable,
    membership: Mutex<MembershipTracker>,
    manager: AtomicBool,
    /// Hostname picked by the last successful election tick.
    elected: RwLock<Option<String>>,
    client: Arc<dyn PeerClient>,
    inventory: Arc<dyn WorkloadInventory>,
    process: Arc<dyn ProcessControl>,
}

impl ClusterCoordinator {
    /// Create a coordinator from a validated configuration.
    pub fn new(
        config: HaConfig,
        client: Arc<dyn PeerClient>,
        inventory: Arc<dyn WorkloadInventory>,
        process: Arc<dyn ProcessControl>,
    ) -> Result<Self> {
        let hostname = config.hostname()?;
        let local = Node {
            hostname,
            protocol: config.node.protocol.clone(),
            // peers stamp the address from the connection
            address: String::new(),
            port: config.node.port,
            user: config.api.ha_user.clone(),
            password: config.api.ha_password.clone(),
            failover_strategy: config.node.failover_strategy,
            failover_time: config.node.failover_time,
            backup_node: config.node.backup_node,
            startup_time: unix_now(),
        };

        Ok(Self {
            node_type: config.node.node_type,
            registry: NodeRegistry::new(),
            candidates: CandidateTable::new(config.candidates.clone()),
            membership: Mutex::new(MembershipTracker::new(
                config.quorum.initial_quorum,
                config.quorum.safety_floor,
            )),
            manager: AtomicBool::new(false),
            elected: RwLock::new(None),
            local,
            config,
            client,
            inventory,
            process,
        })
    }

    /// Override the startup time announced to peers.
    pub fn with_startup_time(mut self, startup_time: Timestamp) -> Self {
        self.local.startup_time = startup_time;
        self
    }

    pub fn config(&self) -> &HaConfig {
        &self.config
    }

    pub fn hostname(&self) -> &str {
        &self.local.hostname
    }

    pub fn local_node(&self) -> &Node {
        &self.local
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn candidates(&self) -> &CandidateTable {
        &self.candidates
    }

    pub(crate) fn membership(&self) -> &Mutex<MembershipTracker> {
        &self.membership
    }

    pub fn client(&self) -> &Arc<dyn PeerClient> {
        &self.client
    }

    pub fn process(&self) -> &Arc<dyn ProcessControl> {
        &self.process
    }

    pub fn is_manager(&self) -> bool {
        self.manager.load(Ordering::SeqCst)
    }

    /// Set the manager flag, returning the previous value.
    pub(crate) fn set_manager(&self, is_manager: bool) -> bool {
        self.manager.swap(is_manager, Ordering::SeqCst)
    }

    pub fn is_initialized(&self) -> bool {
        self.membership.lock().is_initialized()
    }

    pub fn elected_manager(&self) -> Option<String> {
        self.elected.read().clone()
    }

    pub(crate) fn set_elected(&self, hostname: Option<String>) {
        *self.elected.write() = hostname;
    }

    /// Record a register or ping call from a peer.
    ///
    /// The address is taken from the connection, never from the payload.
    pub fn receive_heartbeat(&self, mut node: Node, remote: IpAddr) {
        node.address = remote.to_string();
        let hostname = node.hostname.clone();
        self.registry.upsert(node);

        if self.candidates.mark_registered(&hostname) {
            info!(peer = %hostname, "Candidate registered");
        } else {
            debug!(peer = %hostname, "Heartbeat received");
        }
    }

    /// Production VMs hosted here, as reported to the failover orchestrator.
    pub fn vm_reports(&self) -> Result<Vec<VmReport>> {
        Ok(self
            .inventory
            .vms()?
            .into_iter()
            .filter(|w| w.production)
            .map(|w| VmReport::from_workload(w, self.hostname()))
            .collect())
    }

    /// Production jails hosted here.
    pub fn jail_reports(&self) -> Result<Vec<JailReport>> {
        Ok(self
            .inventory
            .jails()?
            .into_iter()
            .filter(|w| w.production)
            .map(|w| JailReport::from_workload(w, self.hostname()))
            .collect())
    }

    /// Write the role indicator file.
    pub fn write_mode(&self, mode: &str) -> Result<()> {
        std::fs::write(&self.config.runtime.mode_file, format!("{}\n", mode))?;
        Ok(())
    }

    /// Derived cluster state, recomputed on every call.
    pub fn cluster_state(&self) -> ClusterState {
        let hosts = self
            .registry
            .snapshot()
            .into_iter()
            .map(|e| {
                let candidate = self.candidates.contains(e.hostname());
                HostStatus {
                    hostname: e.node.hostname,
                    address: e.node.address,
                    port: e.node.port,
                    last_ping: e.last_ping,
                    startup_time: e.node.startup_time,
                    backup_node: e.node.backup_node,
                    candidate,
                }
            })
            .collect();

        ClusterState {
            hostname: self.hostname().to_string(),
            node_type: self.node_type,
            is_manager: self.is_manager(),
            initialized: self.is_initialized(),
            registered_candidates: self.candidates.registered_count(),
            manager: self.elected_manager(),
            hosts,
        }
    }
}

/// Snapshot of the process-local cluster view, served on `/ha/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterState {
    pub hostname: String,
    pub node_type: NodeType,
    pub is_manager: bool,
    pub initialized: bool,
    pub registered_candidates: usize,
    pub manager: Option<String>,
    pub hosts: Vec<HostStatus>,
}

/// One registry entry as shown on `/ha/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostStatus {
    pub hostname: String,
    pub address: String,
    pub port: u16,
    pub last_ping: Timestamp,
    pub startup_time: Timestamp,
    pub backup_node: bool,
    pub candidate: bool,
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::CandidateConfig;
    use crate::error::HaError;
    use crate::inventory::StaticInventory;
    use crate::types::{FailoverStrategy, JailReport, WorkloadAction, WorkloadKind};
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Peer client that answers from canned data and records actions.
    #[derive(Default)]
    pub struct FakeClient {
        pub down: Mutex<Vec<String>>,
        pub vms: Mutex<HashMap<String, Vec<VmReport>>>,
        pub jails: Mutex<HashMap<String, Vec<JailReport>>>,
        pub failing_actions: Mutex<Vec<(String, WorkloadAction)>>,
        pub actions: Mutex<Vec<(String, WorkloadKind, WorkloadAction, String)>>,
        pub pings: Mutex<Vec<String>>,
        pub stalled: Mutex<Vec<String>>,
    }

    impl FakeClient {
        fn check(&self, host: &Node) -> Result<()> {
            if self.down.lock().contains(&host.hostname) {
                return Err(HaError::Network(format!("{} unreachable", host.hostname)));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl PeerClient for FakeClient {
        async fn register(&self, peer: &Node, _local: &Node) -> Result<()> {
            self.check(peer)
        }

        async fn ping(&self, peer: &Node, _local: &Node) -> Result<()> {
            self.pings.lock().push(peer.hostname.clone());
            if self.stalled.lock().contains(&peer.hostname) {
                std::future::pending::<()>().await;
            }
            self.check(peer)
        }

        async fn vm_list(&self, host: &Node) -> Result<Vec<VmReport>> {
            self.check(host)?;
            Ok(self.vms.lock().get(&host.hostname).cloned().unwrap_or_default())
        }

        async fn jail_list(&self, host: &Node) -> Result<Vec<JailReport>> {
            self.check(host)?;
            Ok(self.jails.lock().get(&host.hostname).cloned().unwrap_or_default())
        }

        async fn workload_action(
            &self,
            host: &Node,
            kind: WorkloadKind,
            action: WorkloadAction,
            name: &str,
        ) -> Result<()> {
            self.check(host)?;
            if self
                .failing_actions
                .lock()
                .iter()
                .any(|(n, a)| n == name && *a == action)
            {
                return Err(HaError::PeerStatus {
                    host: host.hostname.clone(),
                    status: 500,
                });
            }
            self.actions
                .lock()
                .push((host.hostname.clone(), kind, action, name.to_string()));
            Ok(())
        }
    }

    /// Process control that records exit codes instead of exiting.
    #[derive(Default)]
    pub struct RecordingProcess {
        pub exits: Mutex<Vec<i32>>,
        pub watchdog_stops: Mutex<usize>,
    }

    impl ProcessControl for RecordingProcess {
        fn stop_watchdog(&self) -> Result<()> {
            *self.watchdog_stops.lock() += 1;
            Ok(())
        }

        fn exit(&self, code: i32) {
            self.exits.lock().push(code);
        }
    }

    pub fn candidate(hostname: &str) -> CandidateConfig {
        CandidateConfig {
            hostname: hostname.to_string(),
            protocol: "http".to_string(),
            address: "127.0.0.1".to_string(),
            port: 3000,
            user: "ha".to_string(),
            password: "pw".to_string(),
            failover_strategy: FailoverStrategy::CiReset,
            failover_time: 60,
            backup_node: false,
        }
    }

    pub struct Harness {
        pub coordinator: Arc<ClusterCoordinator>,
        pub client: Arc<FakeClient>,
        pub process: Arc<RecordingProcess>,
        pub _dir: tempfile::TempDir,
    }

    /// Coordinator named `hostname` with candidates `hosts`.
    pub fn harness(hostname: &str, hosts: &[&str]) -> Harness {
        harness_with(hostname, hosts, |_| {})
    }

    pub fn harness_with(hostname: &str, hosts: &[&str], tweak: impl FnOnce(&mut HaConfig)) -> Harness {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = HaConfig::development();
        config.node.hostname = Some(hostname.to_string());
        config.candidates = hosts.iter().map(|h| candidate(h)).collect();
        config.quorum.initial_quorum = 3;
        config.quorum.safety_floor = 2;
        config.runtime.mode_file = dir.path().join("mode");
        tweak(&mut config);

        let client = Arc::new(FakeClient::default());
        let process = Arc::new(RecordingProcess::default());
        let coordinator = ClusterCoordinator::new(
            config,
            client.clone(),
            Arc::new(StaticInventory::default()),
            process.clone(),
        )
        .expect("coordinator");

        Harness {
            coordinator: Arc::new(coordinator),
            client,
            process,
            _dir: dir,
        }
    }
}
