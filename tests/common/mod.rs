//! Common test utilities for integration tests.

pub mod cluster_sim;
pub mod fixtures;

use hoster_ha::api;
use hoster_ha::client::HttpPeerClient;
use hoster_ha::cluster::ClusterCoordinator;
use hoster_ha::config::HaConfig;
use hoster_ha::inventory::WorkloadInventory;
use hoster_ha::shutdown::ShutdownCoordinator;
use hoster_ha::types::Node;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

// Re-export common types
pub use cluster_sim::*;
pub use fixtures::*;

/// A coordinator served over real HTTP on a loopback port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub coordinator: Arc<ClusterCoordinator>,
    pub process: Arc<RecordingProcess>,
    pub shutdown: ShutdownCoordinator,
    handle: JoinHandle<()>,
    _dir: TempDir,
}

impl TestServer {
    /// Start a node called `hostname` backed by `inventory`.
    pub async fn start(hostname: &str, inventory: Arc<dyn WorkloadInventory>) -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let mut config = HaConfig::development();
        config.node.hostname = Some(hostname.to_string());
        config.api.ha_user = HA_USER.to_string();
        config.api.ha_password = HA_PASSWORD.to_string();
        config.timing.terminate_grace = Duration::from_millis(50);
        config.runtime.mode_file = dir.path().join("mode");
        for candidate in &mut config.candidates {
            candidate.hostname = hostname.to_string();
            candidate.user = HA_USER.to_string();
            candidate.password = HA_PASSWORD.to_string();
        }

        let process = Arc::new(RecordingProcess::default());
        let coordinator = Arc::new(
            ClusterCoordinator::new(
                config,
                Arc::new(HttpPeerClient::new()),
                inventory,
                process.clone(),
            )
            .expect("Failed to build coordinator"),
        );

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to port");
        let addr = listener.local_addr().unwrap();
        let shutdown = ShutdownCoordinator::new();

        let served = Arc::clone(&coordinator);
        let server_shutdown = shutdown.clone();
        let handle = tokio::spawn(async move {
            api::serve(listener, served, server_shutdown)
                .await
                .expect("server failed");
        });

        Self {
            addr,
            coordinator,
            process,
            shutdown,
            handle,
            _dir: dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// This server as a peer, with valid HA credentials.
    pub fn as_peer(&self) -> Node {
        Node::new(
            self.coordinator.hostname(),
            self.addr.ip().to_string(),
            self.addr.port(),
        )
        .with_credentials(HA_USER, HA_PASSWORD)
    }

    pub async fn stop(self) {
        self.shutdown.shutdown();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}
