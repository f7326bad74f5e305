//! HTTP control surface.
//!
//! Peers register and ping here, the manager pulls workload lists from here
//! during failover, and operators read `/status`. Every route requires the
//! HA basic-auth credentials and runs behind a panic boundary.

mod middleware;

pub use middleware::{basic_auth, recover_panics, AuthState};

use crate::cluster::{ClusterCoordinator, ClusterState};
use crate::error::{HaError, Result};
use crate::process::TERMINATE_EXIT_CODE;
use crate::shutdown::ShutdownCoordinator;
use crate::types::{ApiMessage, JailReport, Node, VmReport};
use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

type AppState = Arc<ClusterCoordinator>;

impl IntoResponse for HaError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ApiMessage::new(self.to_string()))).into_response()
    }
}

/// Build the router. Requires connect info, see [`serve`].
pub fn router(coordinator: Arc<ClusterCoordinator>) -> Router {
    let auth = AuthState::new(&coordinator.config().api);

    let ha = Router::new()
        .route("/register", post(handle_register))
        .route("/ping", post(handle_ping))
        .route("/terminate", post(handle_terminate))
        .route("/vm-list", get(handle_vm_list))
        .route("/jail-list", get(handle_jail_list))
        .route("/status", get(handle_status))
        .with_state(coordinator);

    Router::new()
        .nest("/api/v2/ha", ha)
        .layer(axum::middleware::from_fn_with_state(auth, basic_auth))
        .layer(axum::middleware::from_fn(recover_panics))
}

/// Serve the control surface on `listener` until shutdown.
pub async fn serve(
    listener: TcpListener,
    coordinator: Arc<ClusterCoordinator>,
    shutdown: ShutdownCoordinator,
) -> Result<()> {
    let addr = listener.local_addr()?;
    info!(addr = %addr, "HA control surface listening");

    let app = router(coordinator);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move { shutdown.wait_for_shutdown().await })
        .await
        .map_err(|e| HaError::Network(e.to_string()))
}

fn decode_node(body: &Bytes) -> Result<Node> {
    serde_json::from_slice(body).map_err(|e| HaError::Deserialization(e.to_string()))
}

async fn handle_register(
    State(coordinator): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> Result<Json<ApiMessage>> {
    let node = decode_node(&body)?;
    coordinator.receive_heartbeat(node, remote.ip());
    Ok(Json(ApiMessage::new("success")))
}

async fn handle_ping(
    State(coordinator): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> Result<Json<ApiMessage>> {
    let node = decode_node(&body)?;
    coordinator.receive_heartbeat(node, remote.ip());
    Ok(Json(ApiMessage::new("pong")))
}

/// Stop the watchdog and exit after the grace delay. Answers immediately.
async fn handle_terminate(State(coordinator): State<AppState>) -> Json<ApiMessage> {
    info!("Terminate requested, shutting down HA services");

    tokio::spawn(async move {
        if let Err(e) = coordinator.process().stop_watchdog() {
            warn!(error = %e, "Failed to stop watchdog");
        }
        tokio::time::sleep(coordinator.config().timing.terminate_grace).await;
        coordinator.process().exit(TERMINATE_EXIT_CODE);
    });

    Json(ApiMessage::new("success"))
}

async fn handle_vm_list(State(coordinator): State<AppState>) -> Result<Json<Vec<VmReport>>> {
    Ok(Json(coordinator.vm_reports()?))
}

async fn handle_jail_list(State(coordinator): State<AppState>) -> Result<Json<Vec<JailReport>>> {
    Ok(Json(coordinator.jail_reports()?))
}

async fn handle_status(State(coordinator): State<AppState>) -> Json<ClusterState> {
    Json(coordinator.cluster_state())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_status() {
        assert_eq!(HaError::Unauthorized.into_response().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            HaError::Deserialization("eof".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            HaError::Inventory("unreadable".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_decode_node_rejects_garbage() {
        let err = decode_node(&Bytes::from_static(b"{not json")).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
