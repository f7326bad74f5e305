//! Command-line interface for hoster-ha.

use crate::types::Node;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// hoster-ha - High-availability coordination for hypervisor hosts.
#[derive(Parser)]
#[command(name = "hoster-ha")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long, env = "HOSTER_HA_LOG_LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Start the HA daemon
    Run {
        /// Configuration file path
        #[arg(short, long, env = "HOSTER_HA_CONFIG", default_value = "/opt/hoster-core/config_files/ha_config.json")]
        config: PathBuf,
    },

    /// Load and validate a configuration file
    CheckConfig {
        /// Configuration file path
        #[arg(short, long, env = "HOSTER_HA_CONFIG", default_value = "/opt/hoster-core/config_files/ha_config.json")]
        config: PathBuf,
    },

    /// Show the cluster view of a running node
    Status {
        #[command(flatten)]
        remote: RemoteArgs,

        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },

    /// List the production VMs reported by a node
    VmList {
        #[command(flatten)]
        remote: RemoteArgs,
    },

    /// List the production jails reported by a node
    JailList {
        #[command(flatten)]
        remote: RemoteArgs,
    },

    /// Stop a node's watchdog and HA process
    Terminate {
        #[command(flatten)]
        remote: RemoteArgs,
    },
}

/// Address and HA credentials of a running node.
#[derive(Args, Debug, Clone)]
pub struct RemoteArgs {
    /// Node address
    #[arg(short, long, default_value = "127.0.0.1")]
    pub address: String,

    /// Control surface port
    #[arg(short, long, default_value_t = 3000)]
    pub port: u16,

    /// Protocol (http or https)
    #[arg(long, default_value = "http")]
    pub protocol: String,

    /// HA user
    #[arg(short, long, env = "HOSTER_HA_USER")]
    pub user: String,

    /// HA password
    #[arg(long, env = "HOSTER_HA_PASSWORD")]
    pub password: String,
}

impl RemoteArgs {
    /// The target as a [`Node`] for the peer client.
    pub fn to_node(&self) -> Node {
        let mut node = Node::new(self.address.clone(), self.address.clone(), self.port)
            .with_credentials(self.user.clone(), self.password.clone());
        node.protocol = self.protocol.clone();
        node
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
