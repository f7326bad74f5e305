// Cluster simulation for integration tests
// Routes peer calls in memory between coordinators so whole-cluster
// scenarios can be driven tick by tick.

use async_trait::async_trait;
use hoster_ha::cluster::{
    detect_offline_at, election_tick, heartbeat_tick, membership_tick, registration_tick,
    ClusterCoordinator, FailoverReport, MembershipDecision,
};
use hoster_ha::client::PeerClient;
use hoster_ha::config::HaConfig;
use hoster_ha::error::{HaError, Result};
use hoster_ha::inventory::StaticInventory;
use hoster_ha::process::ProcessControl;
use hoster_ha::types::{
    JailReport, Node, NodeType, Timestamp, VmReport, Workload, WorkloadAction, WorkloadKind,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Weak};
use tempfile::TempDir;

use super::fixtures::{candidate_entry, node_config};

/// A workload action observed on the simulated network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedAction {
    pub host: String,
    pub kind: WorkloadKind,
    pub action: WorkloadAction,
    pub workload: String,
}

/// In-memory transport between simulated nodes.
#[derive(Default)]
pub struct SimNetwork {
    nodes: RwLock<HashMap<String, Weak<ClusterCoordinator>>>,
    addresses: RwLock<HashMap<String, IpAddr>>,
    down: RwLock<HashSet<String>>,
    actions: Mutex<Vec<RecordedAction>>,
}

impl SimNetwork {
    pub fn attach(&self, coordinator: &Arc<ClusterCoordinator>, ip: IpAddr) {
        let hostname = coordinator.hostname().to_string();
        self.addresses.write().insert(hostname.clone(), ip);
        self.nodes.write().insert(hostname, Arc::downgrade(coordinator));
    }

    /// Crash `hostname`: it neither sends nor answers.
    pub fn take_down(&self, hostname: &str) {
        self.down.write().insert(hostname.to_string());
    }

    pub fn bring_up(&self, hostname: &str) {
        self.down.write().remove(hostname);
    }

    pub fn actions(&self) -> Vec<RecordedAction> {
        self.actions.lock().clone()
    }

    pub fn starts(&self) -> Vec<RecordedAction> {
        self.actions()
            .into_iter()
            .filter(|a| a.action == WorkloadAction::Start)
            .collect()
    }

    fn ip_of(&self, hostname: &str) -> IpAddr {
        self.addresses
            .read()
            .get(hostname)
            .copied()
            .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    fn route(&self, from: &str, to: &Node) -> Result<Arc<ClusterCoordinator>> {
        {
            let down = self.down.read();
            if down.contains(from) || down.contains(&to.hostname) {
                return Err(HaError::Network(format!("{} unreachable", to.hostname)));
            }
        }

        let target = self
            .nodes
            .read()
            .get(&to.hostname)
            .and_then(Weak::upgrade)
            .ok_or_else(|| HaError::Network(format!("unknown host {}", to.hostname)))?;

        let api = &target.config().api;
        if api.ha_user != to.user || api.ha_password != to.password {
            return Err(HaError::PeerStatus {
                host: to.hostname.clone(),
                status: 401,
            });
        }
        Ok(target)
    }
}

/// Peer client of one simulated node.
pub struct SimClient {
    network: Arc<SimNetwork>,
    from: String,
}

#[async_trait]
impl PeerClient for SimClient {
    async fn register(&self, peer: &Node, local: &Node) -> Result<()> {
        let target = self.network.route(&self.from, peer)?;
        target.receive_heartbeat(local.clone(), self.network.ip_of(&self.from));
        Ok(())
    }

    async fn ping(&self, peer: &Node, local: &Node) -> Result<()> {
        let target = self.network.route(&self.from, peer)?;
        target.receive_heartbeat(local.clone(), self.network.ip_of(&self.from));
        Ok(())
    }

    async fn vm_list(&self, host: &Node) -> Result<Vec<VmReport>> {
        self.network.route(&self.from, host)?.vm_reports()
    }

    async fn jail_list(&self, host: &Node) -> Result<Vec<JailReport>> {
        self.network.route(&self.from, host)?.jail_reports()
    }

    async fn workload_action(
        &self,
        host: &Node,
        kind: WorkloadKind,
        action: WorkloadAction,
        name: &str,
    ) -> Result<()> {
        self.network.route(&self.from, host)?;
        self.network.actions.lock().push(RecordedAction {
            host: host.hostname.clone(),
            kind,
            action,
            workload: name.to_string(),
        });
        Ok(())
    }
}

/// Process control that records instead of exiting.
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

/// Declared shape of a simulated node.
#[derive(Debug, Clone)]
pub struct NodeDecl {
    pub hostname: String,
    pub node_type: NodeType,
    pub startup_time: Timestamp,
    pub failover_time: u64,
    pub backup_node: bool,
    pub vms: Vec<Workload>,
    pub jails: Vec<Workload>,
}

/// One running simulated node.
pub struct SimNode {
    pub coordinator: Arc<ClusterCoordinator>,
    pub inventory: Arc<StaticInventory>,
    pub process: Arc<RecordingProcess>,
}

/// Builder for a simulated cluster.
pub struct ClusterBuilder {
    decls: Vec<NodeDecl>,
}

impl ClusterBuilder {
    pub fn new() -> Self {
        Self { decls: Vec::new() }
    }

    pub fn candidate(mut self, hostname: &str, startup_time: Timestamp) -> Self {
        self.decls.push(NodeDecl {
            hostname: hostname.to_string(),
            node_type: NodeType::Candidate,
            startup_time,
            failover_time: 60,
            backup_node: false,
            vms: Vec::new(),
            jails: Vec::new(),
        });
        self
    }

    pub fn worker(mut self, hostname: &str) -> Self {
        self.decls.push(NodeDecl {
            hostname: hostname.to_string(),
            node_type: NodeType::Worker,
            startup_time: 0,
            failover_time: 60,
            backup_node: false,
            vms: Vec::new(),
            jails: Vec::new(),
        });
        self
    }

    fn last(&mut self) -> &mut NodeDecl {
        self.decls.last_mut().expect("declare a node first")
    }

    /// Failover timeout announced by the last declared node.
    pub fn failover_time(mut self, seconds: u64) -> Self {
        self.last().failover_time = seconds;
        self
    }

    pub fn backup(mut self) -> Self {
        self.last().backup_node = true;
        self
    }

    pub fn vm(mut self, workload: Workload) -> Self {
        self.last().vms.push(workload);
        self
    }

    pub fn jail(mut self, workload: Workload) -> Self {
        self.last().jails.push(workload);
        self
    }

    pub fn build(self) -> SimulatedCluster {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let network = Arc::new(SimNetwork::default());
        let candidates: Vec<_> = self
            .decls
            .iter()
            .filter(|s| s.node_type == NodeType::Candidate)
            .map(candidate_entry)
            .collect();

        let mut nodes = HashMap::new();
        for (i, decl) in self.decls.iter().enumerate() {
            let mut config: HaConfig = node_config(decl, dir.path());
            config.candidates = candidates.clone();

            let inventory = Arc::new(StaticInventory::new(decl.vms.clone(), decl.jails.clone()));
            let process = Arc::new(RecordingProcess::default());
            let client = Arc::new(SimClient {
                network: Arc::clone(&network),
                from: decl.hostname.clone(),
            });

            let coordinator = ClusterCoordinator::new(config, client, inventory.clone(), process.clone())
                .expect("Failed to build coordinator")
                .with_startup_time(decl.startup_time);
            let coordinator = Arc::new(coordinator);

            network.attach(&coordinator, IpAddr::V4(Ipv4Addr::new(10, 0, 0, i as u8 + 1)));
            nodes.insert(
                decl.hostname.clone(),
                SimNode {
                    coordinator,
                    inventory,
                    process,
                },
            );
        }

        SimulatedCluster {
            network,
            nodes,
            order: self.decls.iter().map(|s| s.hostname.clone()).collect(),
            _dir: dir,
        }
    }
}

impl Default for ClusterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A set of coordinators wired through a [`SimNetwork`].
pub struct SimulatedCluster {
    pub network: Arc<SimNetwork>,
    nodes: HashMap<String, SimNode>,
    order: Vec<String>,
    _dir: TempDir,
}

impl SimulatedCluster {
    pub fn node(&self, hostname: &str) -> &SimNode {
        self.nodes
            .get(hostname)
            .unwrap_or_else(|| panic!("no simulated node {}", hostname))
    }

    pub fn coordinator(&self, hostname: &str) -> &Arc<ClusterCoordinator> {
        &self.node(hostname).coordinator
    }

    /// Nodes that are not taken down, in declaration order.
    fn live(&self) -> Vec<&SimNode> {
        let down = self.network.down.read().clone();
        self.order
            .iter()
            .filter(|h| !down.contains(*h))
            .map(|h| self.node(h))
            .collect()
    }

    pub async fn registration_round(&self) {
        for node in self.live() {
            registration_tick(&node.coordinator).await;
        }
    }

    pub async fn heartbeat_round(&self) {
        for node in self.live() {
            for handle in heartbeat_tick(&node.coordinator) {
                handle.await.expect("heartbeat task panicked");
            }
        }
    }

    pub fn membership_round(&self) -> Vec<(String, MembershipDecision)> {
        self.live()
            .into_iter()
            .map(|n| (n.coordinator.hostname().to_string(), membership_tick(&n.coordinator)))
            .collect()
    }

    pub fn election_round(&self) {
        for node in self.live() {
            if node.coordinator.node_type().is_candidate() {
                election_tick(&node.coordinator);
            }
        }
    }

    /// Run the offline detector on every live candidate as of `now`.
    pub async fn offline_round(&self, now: Timestamp) -> Vec<FailoverReport> {
        let mut reports = Vec::new();
        for node in self.live() {
            if node.coordinator.node_type().is_candidate() {
                reports.extend(detect_offline_at(&node.coordinator, now).await);
            }
        }
        reports
    }

    /// Register everyone, reach quorum and elect a manager.
    pub async fn form(&self) {
        self.registration_round().await;
        self.heartbeat_round().await;
        self.membership_round();
        self.election_round();
    }

    /// Hostnames that currently believe they are the manager.
    pub fn managers(&self) -> Vec<String> {
        self.live()
            .into_iter()
            .filter(|n| n.coordinator.is_manager())
            .map(|n| n.coordinator.hostname().to_string())
            .collect()
    }
}
