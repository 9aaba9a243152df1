//! PlatformClient trait for mocking
//!
//! This trait abstracts the Kubernetes API calls the reconciler makes so the
//! reconciler can be driven against an in-memory platform in unit tests.
//! The concrete `KubePlatformClient` implements it on top of `kube::Api`.

use crate::error::PlatformError;
use crate::models::{ObjectKey, VersionToken, Versioned};
use crds::{MyApp, MyAppStatus};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;

/// Trait for orchestration platform operations
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait PlatformClientTrait: Send + Sync {
    // MyApp
    async fn get_app(&self, key: &ObjectKey) -> Result<Versioned<MyApp>, PlatformError>;
    /// Replaces the status subresource; fails with `Conflict` if `version` is stale.
    async fn update_app_status(&self, key: &ObjectKey, status: &MyAppStatus, version: &VersionToken) -> Result<VersionToken, PlatformError>;

    // Workload
    async fn get_deployment(&self, key: &ObjectKey) -> Result<Versioned<Deployment>, PlatformError>;
    async fn create_deployment(&self, deployment: &Deployment) -> Result<VersionToken, PlatformError>;
    /// Sets `spec.replicas` and nothing else; fails with `Conflict` if `version` is stale.
    async fn update_deployment_replicas(&self, key: &ObjectKey, replicas: i32, version: &VersionToken) -> Result<VersionToken, PlatformError>;

    // Network endpoint
    async fn get_service(&self, key: &ObjectKey) -> Result<Versioned<Service>, PlatformError>;
    async fn create_service(&self, service: &Service) -> Result<VersionToken, PlatformError>;
}
