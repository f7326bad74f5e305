//! hoster-ha - Main entry point.

use hoster_ha::cli::{Cli, Commands};
use hoster_ha::client::{HttpPeerClient, PeerClient};
use hoster_ha::config::HaConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    match cli.command {
        Commands::Run { config } => {
            let mut config = HaConfig::from_file(&config)?;
            if let Some(level) = cli.log_level {
                config.observability.log_level = level;
            }
            hoster_ha::run(config).await?;
        }

        Commands::CheckConfig { config: path } => {
            let config = HaConfig::from_file(&path)?;
            println!("Configuration OK ({})", path.display());
            println!("  Hostname:   {}", config.hostname()?);
            println!("  Node type:  {}", config.node.node_type);
            println!("  Listen:     {}", config.api.bind_addr);
            println!(
                "  Quorum:     initial {}, floor {}",
                config.quorum.initial_quorum, config.quorum.safety_floor
            );
            println!("  Debug mode: {}", config.debug);
            println!("  Candidates:");
            for candidate in &config.candidates {
                println!(
                    "    {:<20} {}://{}:{}{}",
                    candidate.hostname,
                    candidate.protocol,
                    candidate.address,
                    candidate.port,
                    if candidate.backup_node { " (backup)" } else { "" }
                );
            }
        }

        Commands::Status { remote, json } => {
            let client = HttpPeerClient::new();
            let state = client.status(&remote.to_node()).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&state)?);
            } else {
                println!("Node:        {} ({})", state.hostname, state.node_type);
                println!("Initialized: {}", state.initialized);
                println!("Manager:     {}", state.manager.as_deref().unwrap_or("-"));
                println!("This node is manager: {}", state.is_manager);
                println!("Registered candidates: {}", state.registered_candidates);
                println!();
                println!("{:<20} {:<16} {:>12} {:>12}  FLAGS", "HOST", "ADDRESS", "LAST PING", "STARTED");
                for host in &state.hosts {
                    let mut flags = Vec::new();
                    if host.candidate {
                        flags.push("candidate");
                    }
                    if host.backup_node {
                        flags.push("backup");
                    }
                    println!(
                        "{:<20} {:<16} {:>12} {:>12}  {}",
                        host.hostname,
                        host.address,
                        host.last_ping,
                        host.startup_time,
                        flags.join(",")
                    );
                }
            }
        }

        Commands::VmList { remote } => {
            let client = HttpPeerClient::new();
            let vms = client.vm_list(&remote.to_node()).await?;
            println!("{:<24} {:<6} {:<24} {:<16} {:<16}", "VM", "LIVE", "SNAPSHOT", "PARENT", "CURRENT");
            for vm in vms {
                println!(
                    "{:<24} {:<6} {:<24} {:<16} {:<16}",
                    vm.vm_name, vm.live, vm.latest_snapshot, vm.parent_host, vm.current_host
                );
            }
        }

        Commands::JailList { remote } => {
            let client = HttpPeerClient::new();
            let jails = client.jail_list(&remote.to_node()).await?;
            println!("{:<24} {:<6} {:<24} {:<16} {:<16}", "JAIL", "LIVE", "SNAPSHOT", "PARENT", "CURRENT");
            for jail in jails {
                println!(
                    "{:<24} {:<6} {:<24} {:<16} {:<16}",
                    jail.jail_name, jail.live, jail.latest_snapshot, jail.parent_host, jail.current_host
                );
            }
        }

        Commands::Terminate { remote } => {
            let node = remote.to_node();
            HttpPeerClient::new().terminate(&node).await?;
            println!("Terminate request accepted by {}", node.base_url());
        }
    }

    Ok(())
}
