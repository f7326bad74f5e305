//! Configuration module for the HA coordinator.

use crate::error::{HaError, Result};
use crate::types::{FailoverStrategy, Node, NodeType};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for an HA node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HaConfig {
    /// Local node description.
    #[serde(default)]
    pub node: NodeConfig,
    /// Control surface configuration.
    #[serde(default)]
    pub api: ApiConfig,
    /// Static candidate list (voting members, may include this node).
    #[serde(default)]
    pub candidates: Vec<CandidateConfig>,
    /// Loop intervals and network timeouts.
    #[serde(default)]
    pub timing: TimingConfig,
    /// Quorum thresholds.
    #[serde(default)]
    pub quorum: QuorumConfig,
    /// Failover dry-run: plan and log, but do not call remote actions.
    #[serde(default)]
    pub debug: bool,
    /// Runtime files.
    #[serde(default)]
    pub runtime: RuntimeConfig,
    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl HaConfig {
    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HaError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let config: Self = serde_json::from_str(&content).map_err(|e| {
            HaError::Config(format!("Failed to parse config: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.api.ha_user.is_empty() {
            return Err(HaError::InvalidConfig {
                field: "api.ha_user".to_string(),
                reason: "HA user must be set".to_string(),
            });
        }

        if self.node.node_type.is_candidate() && self.candidates.is_empty() {
            return Err(HaError::InvalidConfig {
                field: "candidates".to_string(),
                reason: "Candidate nodes require a candidate list".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for (i, candidate) in self.candidates.iter().enumerate() {
            if candidate.hostname.is_empty() {
                return Err(HaError::InvalidConfig {
                    field: format!("candidates[{}].hostname", i),
                    reason: "Hostname must be set".to_string(),
                });
            }
            if !seen.insert(candidate.hostname.as_str()) {
                return Err(HaError::InvalidConfig {
                    field: format!("candidates[{}].hostname", i),
                    reason: format!("Duplicate candidate '{}'", candidate.hostname),
                });
            }
        }

        if self.quorum.safety_floor == 0 || self.quorum.safety_floor > self.quorum.initial_quorum {
            return Err(HaError::InvalidConfig {
                field: "quorum.safety_floor".to_string(),
                reason: "Safety floor must be between 1 and the initial quorum".to_string(),
            });
        }

        if self.quorum.failure_threshold == 0 {
            return Err(HaError::InvalidConfig {
                field: "quorum.failure_threshold".to_string(),
                reason: "Failure threshold must be non-zero".to_string(),
            });
        }

        self.timing.validate()?;
        Ok(())
    }

    /// Hostname of this node, falling back to the OS hostname.
    pub fn hostname(&self) -> Result<String> {
        match &self.node.hostname {
            Some(name) if !name.is_empty() => Ok(name.clone()),
            _ => crate::process::local_hostname()
                .map_err(|e| HaError::Config(format!("Failed to read hostname: {}", e))),
        }
    }

    /// Create a single-candidate loopback configuration.
    pub fn development() -> Self {
        let mut config = Self {
            node: NodeConfig {
                hostname: Some("dev-node".to_string()),
                ..Default::default()
            },
            api: ApiConfig {
                bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
                ha_user: "ha".to_string(),
                ha_password: "ha".to_string(),
            },
            ..Default::default()
        };
        config.quorum.initial_quorum = 1;
        config.quorum.safety_floor = 1;
        config.candidates.push(CandidateConfig {
            hostname: "dev-node".to_string(),
            protocol: "http".to_string(),
            address: "127.0.0.1".to_string(),
            port: 3000,
            user: "ha".to_string(),
            password: "ha".to_string(),
            failover_strategy: FailoverStrategy::CiReset,
            failover_time: 60,
            backup_node: false,
        });
        config
    }
}

/// Node-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Hostname; the OS hostname is used when unset.
    #[serde(default)]
    pub hostname: Option<String>,
    /// Role of this node.
    #[serde(default)]
    pub node_type: NodeType,
    /// Protocol peers use to reach this node.
    #[serde(default = "default_protocol")]
    pub protocol: String,
    /// Port peers use to reach this node.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Strategy for this node's workloads when it dies.
    #[serde(default)]
    pub failover_strategy: FailoverStrategy,
    /// Seconds without a ping before peers declare this node offline.
    #[serde(default = "default_failover_time")]
    pub failover_time: u64,
    /// Quorum-only node.
    #[serde(default)]
    pub backup_node: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            hostname: None,
            node_type: NodeType::Candidate,
            protocol: default_protocol(),
            port: default_port(),
            failover_strategy: FailoverStrategy::CiReset,
            failover_time: default_failover_time(),
            backup_node: false,
        }
    }
}

fn default_protocol() -> String {
    "http".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_failover_time() -> u64 {
    60
}

/// HTTP control surface configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind the control surface.
    pub bind_addr: SocketAddr,
    /// HA basic-auth user (distinct from the regular API user).
    pub ha_user: String,
    /// HA basic-auth password.
    pub ha_password: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            ha_user: String::new(),
            ha_password: String::new(),
        }
    }
}

/// A statically configured candidate peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateConfig {
    pub hostname: String,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Credentials for the peer's control surface.
    pub user: String,
    pub password: String,
    #[serde(default)]
    pub failover_strategy: FailoverStrategy,
    #[serde(default = "default_failover_time")]
    pub failover_time: u64,
    #[serde(default)]
    pub backup_node: bool,
}

impl CandidateConfig {
    /// Peer description used for outbound calls.
    pub fn to_node(&self) -> Node {
        Node {
            hostname: self.hostname.clone(),
            protocol: self.protocol.clone(),
            address: self.address.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            failover_strategy: self.failover_strategy,
            failover_time: self.failover_time,
            backup_node: self.backup_node,
            startup_time: 0,
        }
    }
}

/// Loop intervals and network timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    #[serde(with = "humantime_serde")]
    pub heartbeat_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub registration_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub membership_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub election_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub offline_check_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Delay between answering `/ha/terminate` and exiting.
    #[serde(with = "humantime_serde")]
    pub terminate_grace: Duration,
    /// Delay before a crashed background loop is restarted.
    #[serde(with = "humantime_serde")]
    pub restart_delay: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(2),
            registration_interval: Duration::from_secs(5),
            membership_interval: Duration::from_secs(10),
            election_interval: Duration::from_secs(4),
            offline_check_interval: Duration::from_secs(4),
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
            terminate_grace: Duration::from_millis(1500),
            restart_delay: Duration::from_secs(1),
        }
    }
}

impl TimingConfig {
    fn validate(&self) -> Result<()> {
        let intervals = [
            ("timing.heartbeat_interval", self.heartbeat_interval),
            ("timing.registration_interval", self.registration_interval),
            ("timing.membership_interval", self.membership_interval),
            ("timing.election_interval", self.election_interval),
            ("timing.offline_check_interval", self.offline_check_interval),
            ("timing.request_timeout", self.request_timeout),
        ];
        for (field, value) in intervals {
            if value.is_zero() {
                return Err(HaError::InvalidConfig {
                    field: field.to_string(),
                    reason: "Interval must be non-zero".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Quorum thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuorumConfig {
    /// Registered candidates needed before the cluster is initialized.
    pub initial_quorum: usize,
    /// Once initialized, fewer registered candidates than this fences the node.
    pub safety_floor: usize,
    /// Consecutive heartbeat failures before a peer is unregistered.
    pub failure_threshold: u32,
}

impl Default for QuorumConfig {
    fn default() -> Self {
        Self {
            initial_quorum: 3,
            safety_floor: 2,
            failure_threshold: 3,
        }
    }
}

/// Runtime files shared with the surrounding tooling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// JSON workload inventory maintained by the VM/jail tooling.
    pub inventory_file: PathBuf,
    /// Role indicator file rewritten on manager transitions.
    pub mode_file: PathBuf,
    /// Pid file of the watchdog stopped by `/ha/terminate`.
    pub watchdog_pid_file: PathBuf,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            inventory_file: PathBuf::from("/var/run/hoster_ha_inventory.json"),
            mode_file: PathBuf::from("/var/run/hoster_ha_mode"),
            watchdog_pid_file: PathBuf::from("/var/run/hoster_ha_watchdog.pid"),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level.
    pub log_level: String,
    /// Enable JSON logging.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Serde helper for Duration using humantime format.
pub mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}ms", duration.as_millis()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(crate) fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        if let Some(ms) = s.strip_suffix("ms") {
            ms.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| e.to_string())
        } else if let Some(s_val) = s.strip_suffix('s') {
            s_val
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| e.to_string())
        } else if let Some(m) = s.strip_suffix('m') {
            m.parse::<u64>()
                .map(|v| Duration::from_secs(v * 60))
                .map_err(|e| e.to_string())
        } else {
            s.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| e.to_string())
        }
    }
}
