//! Platform client errors

use thiserror::Error;

/// Errors that can occur when talking to the orchestration platform
#[derive(Debug, Error)]
pub enum PlatformError {
    /// Object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Write rejected because the version token is stale or the object already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Any other Kubernetes API or transport failure
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Platform temporarily unavailable (raised by non-kube backends and the mock)
    #[error("Platform unavailable: {0}")]
    Unavailable(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Object returned by the platform is missing required metadata
    #[error("Invalid object: {0}")]
    InvalidObject(String),
}

impl PlatformError {
    /// Classifies a kube error: 404 becomes `NotFound`, 409 becomes `Conflict`.
    pub fn from_kube(err: kube::Error, what: &str) -> Self {
        match err {
            kube::Error::Api(ae) if ae.code == 404 => PlatformError::NotFound(what.to_string()),
            kube::Error::Api(ae) if ae.code == 409 => {
                PlatformError::Conflict(format!("{}: {}", what, ae.message))
            }
            other => PlatformError::Kube(other),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PlatformError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, PlatformError::Conflict(_))
    }
}
