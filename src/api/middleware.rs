//! Middleware for the HA control surface.

use crate::cluster::panic_message;
use crate::config::ApiConfig;
use crate::types::ApiMessage;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

const REALM: &str = "Basic realm=\"hoster-ha\"";

/// Credentials accepted on the HA endpoints.
#[derive(Clone)]
pub struct AuthState {
    user: Arc<str>,
    password: Arc<str>,
}

impl AuthState {
    pub fn new(config: &ApiConfig) -> Self {
        Self {
            user: Arc::from(config.ha_user.as_str()),
            password: Arc::from(config.ha_password.as_str()),
        }
    }

    /// Check an `Authorization` header value.
    pub fn accepts(&self, header: &str) -> bool {
        let Some(encoded) = header.strip_prefix("Basic ") else {
            return false;
        };
        let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
            return false;
        };
        let Ok(decoded) = String::from_utf8(decoded) else {
            return false;
        };
        match decoded.split_once(':') {
            Some((user, password)) => user == &*self.user && password == &*self.password,
            None => false,
        }
    }
}

/// Reject requests without the HA basic-auth credentials.
pub async fn basic_auth(State(state): State<AuthState>, request: Request, next: Next) -> Response {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| state.accepts(v))
        .unwrap_or(false);

    if !authorized {
        debug!(path = %request.uri().path(), "Rejected unauthenticated request");
        return (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, REALM)],
            Json(ApiMessage::new("unauthorized")),
        )
            .into_response();
    }

    next.run(request).await
}

/// Turn a panicking handler into a logged warning and a 500.
pub async fn recover_panics(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();

    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(payload) => {
            warn!(
                path = %path,
                panic = %panic_message(payload.as_ref()),
                "Recovered from panic in request handler"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiMessage::new("internal error")),
            )
                .into_response()
        }
    }
}
