//! Controller-specific error types.
//!
//! This module defines error types specific to the MyApp Controller
//! that are not covered by upstream library errors.

use kube::Error as KubeError;
use platform_client::PlatformError;
use thiserror::Error;

/// Errors that can occur in the MyApp Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Platform API error raised during reconciliation
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    /// Kubernetes client setup error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Resource is missing metadata the controller needs (name, namespace, uid)
    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Metrics registration failed
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Probe/metrics server failed
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

impl ControllerError {
    /// Stale version token or lost create race; retried on a short fixed delay.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ControllerError::Platform(e) if e.is_conflict())
    }
}
