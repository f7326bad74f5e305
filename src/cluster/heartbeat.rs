//! Heartbeat sender and registration loop.
//!
//! Registered candidates are pinged on every tick, one task per peer, so a
//! slow peer never delays the next round. Candidates not yet registered are
//! offered our node payload by the registration loop until one side reaches
//! the other.

use super::coordinator::ClusterCoordinator;
use crate::observability;
use futures::future::join_all;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Ping every registered candidate once. The returned handles may be
/// dropped; the pings keep running detached.
pub fn heartbeat_tick(coordinator: &Arc<ClusterCoordinator>) -> Vec<JoinHandle<()>> {
    coordinator
        .candidates()
        .registered_peers()
        .into_iter()
        .map(|peer| {
            let coordinator = Arc::clone(coordinator);
            tokio::spawn(async move {
                let result = coordinator
                    .client()
                    .ping(&peer, coordinator.local_node())
                    .await;

                match result {
                    Ok(()) => {
                        coordinator.candidates().mark_registered(&peer.hostname);
                    }
                    Err(e) => {
                        observability::record_heartbeat_failure(&peer.hostname);
                        let threshold = coordinator.config().quorum.failure_threshold;
                        let evicted = coordinator
                            .candidates()
                            .record_failure(&peer.hostname, threshold);
                        if evicted {
                            warn!(
                                peer = %peer.hostname,
                                failures = threshold,
                                "Peer missed too many heartbeats, dropped from candidate pool"
                            );
                        } else {
                            debug!(peer = %peer.hostname, error = %e, "Heartbeat failed");
                        }
                    }
                }
            })
        })
        .collect()
}

/// Register with every unregistered candidate. Returns how many accepted.
pub async fn registration_tick(coordinator: &ClusterCoordinator) -> usize {
    let peers = coordinator.candidates().unregistered_peers();
    if peers.is_empty() {
        return 0;
    }

    let client = coordinator.client();
    let local = coordinator.local_node();
    let attempts = peers.iter().map(|peer| async move {
        (peer, client.register(peer, local).await)
    });

    let mut accepted = 0;
    for (peer, result) in join_all(attempts).await {
        match result {
            Ok(()) => {
                if coordinator.candidates().mark_registered(&peer.hostname) {
                    info!(peer = %peer.hostname, "Registered with candidate");
                }
                accepted += 1;
            }
            Err(e) => {
                debug!(peer = %peer.hostname, error = %e, "Registration attempt failed");
            }
        }
    }
    accepted
}

/// Run the heartbeat sender forever.
pub async fn run_heartbeat_loop(coordinator: Arc<ClusterCoordinator>) {
    let interval = coordinator.config().timing.heartbeat_interval;
    loop {
        heartbeat_tick(&coordinator);
        tokio::time::sleep(interval).await;
    }
}

/// Run the registration loop forever.
pub async fn run_registration_loop(coordinator: Arc<ClusterCoordinator>) {
    let interval = coordinator.config().timing.registration_interval;
    loop {
        registration_tick(&coordinator).await;
        tokio::time::sleep(interval).await;
    }
}
