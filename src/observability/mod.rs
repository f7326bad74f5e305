//! Observability module for the HA coordinator.
//!
//! Provides logging initialisation and the metric names recorded by the
//! coordinator loops. Metrics go through the `metrics` facade; no exporter is
//! installed here, an embedding process may install its own recorder.

use crate::config::ObservabilityConfig;
use crate::error::{HaError, Result};
use metrics::{counter, gauge};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging.
pub fn init(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| HaError::Internal(format!("Failed to init logging: {}", e)))?;
    } else {
        subscriber
            .with(fmt::layer())
            .try_init()
            .map_err(|e| HaError::Internal(format!("Failed to init logging: {}", e)))?;
    }

    info!("Observability initialized");
    Ok(())
}

/// Record a failed heartbeat to a peer.
pub fn record_heartbeat_failure(peer: &str) {
    counter!("ha_heartbeat_failures_total", "peer" => peer.to_string()).increment(1);
}

/// Record the number of registered candidates seen by the membership tracker.
pub fn set_registered_candidates(count: usize) {
    gauge!("ha_registered_candidates").set(count as f64);
}

/// Record the local manager role.
pub fn set_manager(is_manager: bool) {
    gauge!("ha_is_manager").set(if is_manager { 1.0 } else { 0.0 });
}

/// Record a node declared offline.
pub fn record_node_offline(hostname: &str) {
    counter!("ha_nodes_offline_total", "host" => hostname.to_string()).increment(1);
}

/// Record the outcome of a failover action.
pub fn record_failover_action(outcome: &'static str) {
    counter!("ha_failover_actions_total", "outcome" => outcome).increment(1);
}

/// Record a supervised task restart.
pub fn record_task_restart(task: &'static str) {
    counter!("ha_task_restarts_total", "task" => task).increment(1);
}
