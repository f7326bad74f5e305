//! Core type definitions shared by the coordinator, the HTTP surface and the
//! peer client.
//!
//! # Key Types
//!
//! - [`Node`]: one cluster participant, also the register/ping wire payload
//! - [`HostEntry`]: a live registry record (a [`Node`] plus its last ping)
//! - [`FailoverStrategy`]: how a workload is moved off a dead host
//! - [`VmReport`] / [`JailReport`]: the `/ha/vm-list` and `/ha/jail-list` rows
//! - [`WorkloadReport`]: the kind-agnostic form used by the failover planner
//!
//! # Examples
//!
//! ```rust
//! use hoster_ha::types::{FailoverStrategy, HostEntry, Node};
//!
//! let node = Node::new("hv-01", "10.0.0.1", 3000).with_failover_time(60);
//! let entry = HostEntry::new(node, 1_000);
//!
//! assert!(!entry.is_offline_at(1_060));
//! assert!(entry.is_offline_at(1_061));
//! assert_eq!("change-parent".parse::<FailoverStrategy>().unwrap(), FailoverStrategy::ChangeParent);
//! ```

use crate::error::HaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unix timestamp in seconds.
pub type Timestamp = i64;

/// Current Unix time in seconds.
pub fn unix_now() -> Timestamp {
    chrono::Utc::now().timestamp()
}

/// How a workload is brought up on its new host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FailoverStrategy {
    /// Regenerate the guest identity and network config before starting.
    #[default]
    #[serde(rename = "cireset", alias = "ci-reset", alias = "ci_reset")]
    CiReset,
    /// Only reassign ownership metadata before starting.
    #[serde(rename = "change_parent", alias = "change-parent", alias = "changeparent")]
    ChangeParent,
}

impl fmt::Display for FailoverStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailoverStrategy::CiReset => write!(f, "cireset"),
            FailoverStrategy::ChangeParent => write!(f, "change_parent"),
        }
    }
}

impl FromStr for FailoverStrategy {
    type Err = HaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cireset" | "ci-reset" | "ci_reset" => Ok(FailoverStrategy::CiReset),
            "changeparent" | "change-parent" | "change_parent" => Ok(FailoverStrategy::ChangeParent),
            other => Err(HaError::InvalidConfig {
                field: "failover_strategy".to_string(),
                reason: format!("unknown strategy '{}'", other),
            }),
        }
    }
}

/// Role a node plays in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Voting member: counts towards quorum and can become manager.
    #[default]
    Candidate,
    /// Hosts workloads and heartbeats the candidates, never manages.
    Worker,
}

impl NodeType {
    pub fn is_candidate(&self) -> bool {
        matches!(self, NodeType::Candidate)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Candidate => write!(f, "candidate"),
            NodeType::Worker => write!(f, "worker"),
        }
    }
}

fn default_protocol() -> String {
    "http".to_string()
}

fn default_failover_time() -> u64 {
    60
}

/// One cluster participant.
///
/// This is also the body of `POST /ha/register` and `POST /ha/ping`: the
/// sender describes itself, including the credentials peers must use to call
/// back into its control surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub hostname: String,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default)]
    pub address: String,
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub failover_strategy: FailoverStrategy,
    /// Seconds without a ping before the node is declared offline.
    #[serde(default = "default_failover_time")]
    pub failover_time: u64,
    /// Quorum-only node; never queried for workloads during failover.
    #[serde(default)]
    pub backup_node: bool,
    #[serde(default)]
    pub startup_time: Timestamp,
}

impl Node {
    pub fn new(hostname: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            protocol: default_protocol(),
            address: address.into(),
            port,
            user: String::new(),
            password: String::new(),
            failover_strategy: FailoverStrategy::default(),
            failover_time: default_failover_time(),
            backup_node: false,
            startup_time: 0,
        }
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    pub fn with_failover_time(mut self, seconds: u64) -> Self {
        self.failover_time = seconds;
        self
    }

    pub fn with_strategy(mut self, strategy: FailoverStrategy) -> Self {
        self.failover_strategy = strategy;
        self
    }

    pub fn with_startup_time(mut self, startup_time: Timestamp) -> Self {
        self.startup_time = startup_time;
        self
    }

    pub fn as_backup(mut self) -> Self {
        self.backup_node = true;
        self
    }

    /// Base URL of the node's control surface, e.g. `http://10.0.0.1:3000`.
    pub fn base_url(&self) -> String {
        let protocol = if self.protocol.is_empty() { "http" } else { &self.protocol };
        format!("{}://{}:{}", protocol, self.address, self.port)
    }
}

/// Live registry record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostEntry {
    pub node: Node,
    pub last_ping: Timestamp,
}

impl HostEntry {
    pub fn new(node: Node, last_ping: Timestamp) -> Self {
        Self { node, last_ping }
    }

    pub fn hostname(&self) -> &str {
        &self.node.hostname
    }

    /// A node is offline once `now` is strictly past `last_ping + failover_time`.
    pub fn is_offline_at(&self, now: Timestamp) -> bool {
        let timeout = i64::try_from(self.node.failover_time).unwrap_or(i64::MAX);
        let deadline = self.last_ping.saturating_add(timeout);
        now > deadline
    }
}

/// Kind of workload moved by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadKind {
    Vm,
    Jail,
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkloadKind::Vm => write!(f, "vm"),
            WorkloadKind::Jail => write!(f, "jail"),
        }
    }
}

/// Remote action issued against a workload on its new host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadAction {
    CiReset,
    ChangeParent,
    Start,
}

impl WorkloadAction {
    /// API path of the action on the target host.
    pub fn path(&self, kind: WorkloadKind) -> &'static str {
        match (kind, self) {
            (WorkloadKind::Vm, WorkloadAction::CiReset) => "/api/v2/vm/cireset",
            (WorkloadKind::Vm, WorkloadAction::ChangeParent) => "/api/v2/vm/change-parent",
            (WorkloadKind::Vm, WorkloadAction::Start) => "/api/v1/vm/start",
            // jails carry no cloud-init identity to reset
            (WorkloadKind::Jail, WorkloadAction::CiReset)
            | (WorkloadKind::Jail, WorkloadAction::ChangeParent) => "/api/v2/jail/change-parent",
            (WorkloadKind::Jail, WorkloadAction::Start) => "/api/v1/jail/start",
        }
    }
}

impl fmt::Display for WorkloadAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkloadAction::CiReset => write!(f, "cireset"),
            WorkloadAction::ChangeParent => write!(f, "change-parent"),
            WorkloadAction::Start => write!(f, "start"),
        }
    }
}

/// A workload as known to the local inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub name: String,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub latest_snapshot: String,
    /// Host that owns the workload.
    pub parent_host: String,
    #[serde(default)]
    pub production: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failover_strategy: Option<FailoverStrategy>,
}

/// Row of `GET /ha/vm-list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmReport {
    pub vm_name: String,
    pub live: bool,
    pub latest_snapshot: String,
    pub parent_host: String,
    pub current_host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failover_strategy: Option<FailoverStrategy>,
}

/// Row of `GET /ha/jail-list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JailReport {
    pub jail_name: String,
    pub live: bool,
    pub latest_snapshot: String,
    pub parent_host: String,
    pub current_host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failover_strategy: Option<FailoverStrategy>,
}

/// Kind-agnostic workload report used by the failover planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadReport {
    pub kind: WorkloadKind,
    pub name: String,
    pub live: bool,
    pub latest_snapshot: String,
    pub parent_host: String,
    pub current_host: String,
    pub failover_strategy: Option<FailoverStrategy>,
}

impl From<VmReport> for WorkloadReport {
    fn from(r: VmReport) -> Self {
        Self {
            kind: WorkloadKind::Vm,
            name: r.vm_name,
            live: r.live,
            latest_snapshot: r.latest_snapshot,
            parent_host: r.parent_host,
            current_host: r.current_host,
            failover_strategy: r.failover_strategy,
        }
    }
}

impl From<JailReport> for WorkloadReport {
    fn from(r: JailReport) -> Self {
        Self {
            kind: WorkloadKind::Jail,
            name: r.jail_name,
            live: r.live,
            latest_snapshot: r.latest_snapshot,
            parent_host: r.parent_host,
            current_host: r.current_host,
            failover_strategy: r.failover_strategy,
        }
    }
}

impl VmReport {
    pub fn from_workload(workload: Workload, current_host: &str) -> Self {
        Self {
            vm_name: workload.name,
            live: workload.running,
            latest_snapshot: workload.latest_snapshot,
            parent_host: workload.parent_host,
            current_host: current_host.to_string(),
            failover_strategy: workload.failover_strategy,
        }
    }
}

impl JailReport {
    pub fn from_workload(workload: Workload, current_host: &str) -> Self {
        Self {
            jail_name: workload.name,
            live: workload.running,
            latest_snapshot: workload.latest_snapshot,
            parent_host: workload.parent_host,
            current_host: current_host.to_string(),
            failover_strategy: workload.failover_strategy,
        }
    }
}

/// Body of the remote workload actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadName {
    pub name: String,
}

/// Generic `{"message": ...}` response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiMessage {
    pub message: String,
}

impl ApiMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}
