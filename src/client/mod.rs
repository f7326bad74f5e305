//! Client for calling other nodes' control surfaces.

use crate::cluster::ClusterState;
use crate::error::{HaError, Result};
use crate::types::{JailReport, Node, VmReport, WorkloadAction, WorkloadKind, WorkloadName};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Default connection timeout for peer requests.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Default request timeout for peer requests.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// HA endpoints exposed by every node.
pub const REGISTER_PATH: &str = "/api/v2/ha/register";
pub const PING_PATH: &str = "/api/v2/ha/ping";
pub const TERMINATE_PATH: &str = "/api/v2/ha/terminate";
pub const VM_LIST_PATH: &str = "/api/v2/ha/vm-list";
pub const JAIL_LIST_PATH: &str = "/api/v2/ha/jail-list";
pub const STATUS_PATH: &str = "/api/v2/ha/status";

/// Calls made by the coordinator to other nodes.
///
/// Every call authenticates with the credentials carried by the target
/// [`Node`].
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// Announce `local` to `peer`.
    async fn register(&self, peer: &Node, local: &Node) -> Result<()>;

    /// Heartbeat `local` to `peer`.
    async fn ping(&self, peer: &Node, local: &Node) -> Result<()>;

    /// Production VMs known to `host`.
    async fn vm_list(&self, host: &Node) -> Result<Vec<VmReport>>;

    /// Production jails known to `host`.
    async fn jail_list(&self, host: &Node) -> Result<Vec<JailReport>>;

    /// Run a workload action on `host`.
    async fn workload_action(
        &self,
        host: &Node,
        kind: WorkloadKind,
        action: WorkloadAction,
        name: &str,
    ) -> Result<()>;
}

/// [`PeerClient`] over HTTP with JSON bodies and basic auth.
#[derive(Clone)]
pub struct HttpPeerClient {
    client: Client,
}

impl HttpPeerClient {
    /// Create a client with default timeouts.
    pub fn new() -> Self {
        Self::with_timeouts(DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a client with custom timeouts.
    pub fn with_timeouts(connect_timeout: Duration, request_timeout: Duration) -> Self {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .user_agent(format!("hoster-ha/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client }
    }

    fn url(host: &Node, path: &str) -> String {
        format!("{}{}", host.base_url(), path)
    }

    fn authed(&self, request: RequestBuilder, host: &Node) -> RequestBuilder {
        request.basic_auth(&host.user, Some(&host.password))
    }

    async fn send(&self, host: &Node, request: RequestBuilder) -> Result<reqwest::Response> {
        let response = self.authed(request, host).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HaError::PeerStatus {
                host: host.hostname.clone(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, host: &Node, path: &str) -> Result<T> {
        let request = self.client.get(Self::url(host, path));
        let response = self.send(host, request).await?;
        response
            .json()
            .await
            .map_err(|e| HaError::Deserialization(e.to_string()))
    }

    /// Fetch the cluster view of `host`.
    pub async fn status(&self, host: &Node) -> Result<ClusterState> {
        self.get_json(host, STATUS_PATH).await
    }

    /// Ask `host` to stop its watchdog and exit.
    pub async fn terminate(&self, host: &Node) -> Result<()> {
        let request = self.client.post(Self::url(host, TERMINATE_PATH));
        self.send(host, request).await?;
        Ok(())
    }
}

impl Default for HttpPeerClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    async fn register(&self, peer: &Node, local: &Node) -> Result<()> {
        let request = self.client.post(Self::url(peer, REGISTER_PATH)).json(local);
        self.send(peer, request).await?;
        Ok(())
    }

    async fn ping(&self, peer: &Node, local: &Node) -> Result<()> {
        let request = self.client.post(Self::url(peer, PING_PATH)).json(local);
        self.send(peer, request).await?;
        Ok(())
    }

    async fn vm_list(&self, host: &Node) -> Result<Vec<VmReport>> {
        self.get_json(host, VM_LIST_PATH).await
    }

    async fn jail_list(&self, host: &Node) -> Result<Vec<JailReport>> {
        self.get_json(host, JAIL_LIST_PATH).await
    }

    async fn workload_action(
        &self,
        host: &Node,
        kind: WorkloadKind,
        action: WorkloadAction,
        name: &str,
    ) -> Result<()> {
        let body = WorkloadName {
            name: name.to_string(),
        };
        let request = self
            .client
            .post(Self::url(host, action.path(kind)))
            .json(&body);
        self.send(host, request).await?;
        Ok(())
    }
}
