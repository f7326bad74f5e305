//! Error types for the HA coordinator.
//!
//! This module provides a unified error type [`HaError`] for all coordinator
//! operations, along with a convenient [`Result`] type alias.
//!
//! # Error Categories
//!
//! - **Peer**: network failures, timeouts and non-2xx answers from other nodes.
//!   These are transient: they are logged, counted, and never fatal.
//! - **Configuration**: invalid or unreadable configuration, fatal at startup.
//! - **Inventory**: the local workload inventory could not be read.
//! - **Request**: authentication and payload errors on the HTTP surface.
//!
//! # Example
//!
//! ```rust
//! use hoster_ha::error::HaError;
//!
//! let err = HaError::PeerStatus { host: "hv-02".into(), status: 503 };
//! assert!(err.is_retryable());
//! assert!(!HaError::Unauthorized.is_retryable());
//! ```

use std::io;
use thiserror::Error;

/// Main error type for HA operations.
#[derive(Error, Debug)]
pub enum HaError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    // Peer errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("Peer {host} answered with status {status}")]
    PeerStatus { host: String, status: u16 },

    #[error("Request timed out: {0}")]
    Timeout(String),

    // Payload errors
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // Request errors
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    // Local collaborators
    #[error("Inventory error: {0}")]
    Inventory(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HaError {
    /// Check if the error is a transient peer failure.
    pub fn is_retryable(&self) -> bool {
        match self {
            HaError::Network(_) | HaError::Timeout(_) => true,
            HaError::PeerStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// HTTP status code used when the error is returned by the control surface.
    pub fn status_code(&self) -> u16 {
        match self {
            HaError::Unauthorized => 401,
            HaError::Deserialization(_) | HaError::InvalidConfig { .. } => 400,
            HaError::NotFound(_) => 404,
            _ => 500,
        }
    }
}

impl From<serde_json::Error> for HaError {
    fn from(e: serde_json::Error) -> Self {
        HaError::Deserialization(e.to_string())
    }
}

impl From<reqwest::Error> for HaError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            HaError::Timeout(e.to_string())
        } else if e.is_decode() {
            HaError::Deserialization(e.to_string())
        } else {
            HaError::Network(e.to_string())
        }
    }
}

/// Result type alias for HA operations.
pub type Result<T> = std::result::Result<T, HaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(HaError::Network("refused".into()).is_retryable());
        assert!(HaError::Timeout("5s".into()).is_retryable());
        assert!(HaError::PeerStatus { host: "a".into(), status: 502 }.is_retryable());
        assert!(!HaError::PeerStatus { host: "a".into(), status: 401 }.is_retryable());
        assert!(!HaError::Config("bad".into()).is_retryable());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(HaError::Unauthorized.status_code(), 401);
        assert_eq!(HaError::NotFound("vm".into()).status_code(), 404);
        assert_eq!(HaError::Deserialization("x".into()).status_code(), 400);
        assert_eq!(HaError::Inventory("x".into()).status_code(), 500);
    }
}
