//! Mock PlatformClient for unit testing
//!
//! This module provides an in-memory implementation of `PlatformClientTrait`
//! that behaves like the API server where the reconciler can observe it:
//! every write bumps a cluster-wide version counter, stale version tokens are
//! rejected with `Conflict`, and creating an existing object fails. Every call
//! is recorded so tests can assert exactly which mutations a pass issued.

use crate::error::PlatformError;
use crate::models::{ObjectKey, VersionToken, Versioned};
use crate::platform_trait::PlatformClientTrait;
use crds::{MyApp, MyAppStatus};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentStatus};
use k8s_openapi::api::core::v1::Service;
use kube::Resource;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Client operations, used to record calls and to script failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetApp,
    UpdateAppStatus,
    GetDeployment,
    CreateDeployment,
    UpdateDeployment,
    GetService,
    CreateService,
}

impl Operation {
    /// Whether the operation writes to the platform.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Operation::UpdateAppStatus
                | Operation::CreateDeployment
                | Operation::UpdateDeployment
                | Operation::CreateService
        )
    }
}

/// A failure the mock can be told to return instead of performing a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    NotFound,
    Conflict,
    Unavailable,
}

impl Failure {
    fn into_error(self, what: &str) -> PlatformError {
        match self {
            Failure::NotFound => PlatformError::NotFound(what.to_string()),
            Failure::Conflict => PlatformError::Conflict(format!("{} (injected)", what)),
            Failure::Unavailable => PlatformError::Unavailable(format!("{} (injected)", what)),
        }
    }
}

/// Mock PlatformClient for testing
///
/// Clones share the same underlying stores, so a test can keep a handle while
/// the reconciler owns another.
#[derive(Clone, Default)]
pub struct MockPlatformClient {
    pub(crate) apps: Arc<Mutex<HashMap<ObjectKey, MyApp>>>,
    pub(crate) deployments: Arc<Mutex<HashMap<ObjectKey, Deployment>>>,
    pub(crate) services: Arc<Mutex<HashMap<ObjectKey, Service>>>,
    pub(crate) calls: Arc<Mutex<Vec<(Operation, ObjectKey)>>>,
    // Per operation: `None` lets the call through, `Some` fails it
    pub(crate) script: Arc<Mutex<HashMap<Operation, VecDeque<Option<Failure>>>>>,
    pub(crate) version: Arc<Mutex<u64>>,
}

impl std::fmt::Debug for MockPlatformClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockPlatformClient")
            .field("apps", &lock(&self.apps).len())
            .field("deployments", &lock(&self.deployments).len())
            .field("services", &lock(&self.services).len())
            .finish()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockPlatformClient {
    /// Create an empty mock platform
    pub fn new() -> Self {
        Self::default()
    }

    fn next_version(&self) -> VersionToken {
        let mut v = lock(&self.version);
        *v += 1;
        VersionToken::new(v.to_string())
    }

    fn record(&self, op: Operation, key: &ObjectKey) -> Result<(), PlatformError> {
        lock(&self.calls).push((op, key.clone()));
        let scripted = lock(&self.script).get_mut(&op).and_then(VecDeque::pop_front);
        match scripted {
            Some(Some(failure)) => Err(failure.into_error(&format!("{:?} {}", op, key))),
            _ => Ok(()),
        }
    }

    fn check_version<K: Resource>(obj: &K, version: &VersionToken, what: &str) -> Result<(), PlatformError> {
        if obj.meta().resource_version.as_deref() == Some(version.as_str()) {
            Ok(())
        } else {
            Err(PlatformError::Conflict(format!(
                "{}: stale resourceVersion {} (current {})",
                what,
                version,
                obj.meta().resource_version.as_deref().unwrap_or("<none>")
            )))
        }
    }

    /// Add a MyApp to the mock store (for test setup). A uid is assigned when missing.
    pub fn add_app(&self, mut app: MyApp) -> ObjectKey {
        let key = ObjectKey::new(
            app.metadata.namespace.clone().unwrap_or_else(|| "default".to_string()),
            app.metadata.name.clone().unwrap_or_default(),
        );
        app.metadata.namespace = Some(key.namespace.clone());
        if app.metadata.uid.is_none() {
            app.metadata.uid = Some(format!("uid-{}", key.name));
        }
        app.metadata.resource_version = Some(self.next_version().to_string());
        lock(&self.apps).insert(key.clone(), app);
        key
    }

    /// Add a Deployment to the mock store (for test setup)
    pub fn add_deployment(&self, mut deployment: Deployment) {
        if let Ok(key) = ObjectKey::of(&deployment) {
            deployment.metadata.resource_version = Some(self.next_version().to_string());
            lock(&self.deployments).insert(key, deployment);
        }
    }

    /// Add a Service to the mock store (for test setup)
    pub fn add_service(&self, mut service: Service) {
        if let Ok(key) = ObjectKey::of(&service) {
            service.metadata.resource_version = Some(self.next_version().to_string());
            lock(&self.services).insert(key, service);
        }
    }

    /// Replace a MyApp's spec as a user would, bumping its version.
    pub fn set_app_spec(&self, key: &ObjectKey, spec: crds::MyAppSpec) {
        let version = self.next_version();
        if let Some(app) = lock(&self.apps).get_mut(key) {
            app.spec = spec;
            app.metadata.resource_version = Some(version.to_string());
        }
    }

    /// Simulate another writer touching the MyApp, invalidating held tokens.
    pub fn touch_app(&self, key: &ObjectKey) {
        let version = self.next_version();
        if let Some(app) = lock(&self.apps).get_mut(key) {
            app.metadata.resource_version = Some(version.to_string());
        }
    }

    /// Remove a MyApp, as a user deleting it would.
    pub fn delete_app(&self, key: &ObjectKey) {
        lock(&self.apps).remove(key);
    }

    /// Simulate pods becoming ready: sets the Deployment's `status.readyReplicas`.
    pub fn set_ready_replicas(&self, key: &ObjectKey, ready: i32) {
        let version = self.next_version();
        if let Some(deployment) = lock(&self.deployments).get_mut(key) {
            deployment.status = Some(DeploymentStatus {
                ready_replicas: Some(ready),
                ..deployment.status.clone().unwrap_or_default()
            });
            deployment.metadata.resource_version = Some(version.to_string());
        }
    }

    /// Fail the next call of `op` with `failure`.
    pub fn fail_next(&self, op: Operation, failure: Failure) {
        lock(&self.script).entry(op).or_default().push_back(Some(failure));
    }

    /// Script the next calls of `op`: `None` passes through, `Some` fails.
    pub fn script_failures(&self, op: Operation, outcomes: Vec<Option<Failure>>) {
        lock(&self.script).entry(op).or_default().extend(outcomes);
    }

    pub fn app(&self, key: &ObjectKey) -> Option<MyApp> {
        lock(&self.apps).get(key).cloned()
    }

    pub fn deployment(&self, key: &ObjectKey) -> Option<Deployment> {
        lock(&self.deployments).get(key).cloned()
    }

    pub fn service(&self, key: &ObjectKey) -> Option<Service> {
        lock(&self.services).get(key).cloned()
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<(Operation, ObjectKey)> {
        lock(&self.calls).clone()
    }

    /// Only the write calls made so far, in order.
    pub fn mutations(&self) -> Vec<Operation> {
        lock(&self.calls)
            .iter()
            .map(|(op, _)| *op)
            .filter(Operation::is_mutation)
            .collect()
    }

    /// Number of calls of `op` made so far.
    pub fn count(&self, op: Operation) -> usize {
        lock(&self.calls).iter().filter(|(o, _)| *o == op).count()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }
}

#[async_trait::async_trait]
impl PlatformClientTrait for MockPlatformClient {
    async fn get_app(&self, key: &ObjectKey) -> Result<Versioned<MyApp>, PlatformError> {
        self.record(Operation::GetApp, key)?;
        let app = self
            .app(key)
            .ok_or_else(|| PlatformError::NotFound(format!("MyApp {}", key)))?;
        Versioned::from_object(app)
    }

    async fn update_app_status(&self, key: &ObjectKey, status: &MyAppStatus, version: &VersionToken) -> Result<VersionToken, PlatformError> {
        self.record(Operation::UpdateAppStatus, key)?;
        let next = self.next_version();
        let mut apps = lock(&self.apps);
        let app = apps
            .get_mut(key)
            .ok_or_else(|| PlatformError::NotFound(format!("MyApp {}", key)))?;
        Self::check_version(app, version, &format!("MyApp {}", key))?;
        app.status = Some(status.clone());
        app.metadata.resource_version = Some(next.to_string());
        Ok(next)
    }

    async fn get_deployment(&self, key: &ObjectKey) -> Result<Versioned<Deployment>, PlatformError> {
        self.record(Operation::GetDeployment, key)?;
        let deployment = self
            .deployment(key)
            .ok_or_else(|| PlatformError::NotFound(format!("Deployment {}", key)))?;
        Versioned::from_object(deployment)
    }

    async fn create_deployment(&self, deployment: &Deployment) -> Result<VersionToken, PlatformError> {
        let key = ObjectKey::of(deployment)?;
        self.record(Operation::CreateDeployment, &key)?;
        let next = self.next_version();
        let mut deployments = lock(&self.deployments);
        if deployments.contains_key(&key) {
            return Err(PlatformError::Conflict(format!("Deployment {} already exists", key)));
        }
        let mut stored = deployment.clone();
        stored.metadata.resource_version = Some(next.to_string());
        stored.status = None;
        deployments.insert(key, stored);
        Ok(next)
    }

    async fn update_deployment_replicas(&self, key: &ObjectKey, replicas: i32, version: &VersionToken) -> Result<VersionToken, PlatformError> {
        self.record(Operation::UpdateDeployment, key)?;
        let next = self.next_version();
        let mut deployments = lock(&self.deployments);
        let deployment = deployments
            .get_mut(key)
            .ok_or_else(|| PlatformError::NotFound(format!("Deployment {}", key)))?;
        Self::check_version(deployment, version, &format!("Deployment {}", key))?;
        if let Some(spec) = deployment.spec.as_mut() {
            spec.replicas = Some(replicas);
        }
        deployment.metadata.resource_version = Some(next.to_string());
        Ok(next)
    }

    async fn get_service(&self, key: &ObjectKey) -> Result<Versioned<Service>, PlatformError> {
        self.record(Operation::GetService, key)?;
        let service = self
            .service(key)
            .ok_or_else(|| PlatformError::NotFound(format!("Service {}", key)))?;
        Versioned::from_object(service)
    }

    async fn create_service(&self, service: &Service) -> Result<VersionToken, PlatformError> {
        let key = ObjectKey::of(service)?;
        self.record(Operation::CreateService, &key)?;
        let next = self.next_version();
        let mut services = lock(&self.services);
        if services.contains_key(&key) {
            return Err(PlatformError::Conflict(format!("Service {} already exists", key)));
        }
        let mut stored = service.clone();
        stored.metadata.resource_version = Some(next.to_string());
        services.insert(key, stored);
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crds::MyAppSpec;
    use k8s_openapi::api::apps::v1::DeploymentSpec;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn app() -> MyApp {
        let mut app = MyApp::new(
            "web",
            MyAppSpec {
                image: "app:v1".to_string(),
                replicas: 3,
                port: 8080,
            },
        );
        app.metadata.namespace = Some("default".to_string());
        app
    }

    fn deployment(name: &str) -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas: Some(1),
                ..Default::default()
            }),
            status: None,
        }
    }

    #[tokio::test]
    async fn test_stale_status_token_conflicts() {
        let mock = MockPlatformClient::new();
        let key = mock.add_app(app());
        let read = mock.get_app(&key).await.expect("get");

        mock.touch_app(&key);

        let err = mock
            .update_app_status(&key, &MyAppStatus::default(), &read.version)
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let fresh = mock.get_app(&key).await.expect("get");
        mock.update_app_status(&key, &MyAppStatus::default(), &fresh.version)
            .await
            .expect("fresh token accepted");
    }

    #[tokio::test]
    async fn test_create_twice_conflicts() {
        let mock = MockPlatformClient::new();
        mock.create_deployment(&deployment("web")).await.expect("create");
        let err = mock.create_deployment(&deployment("web")).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(mock.count(Operation::CreateDeployment), 2);
    }

    #[tokio::test]
    async fn test_update_replicas_and_ready() {
        let mock = MockPlatformClient::new();
        mock.add_deployment(deployment("web"));
        let key = ObjectKey::new("default", "web");
        let read = mock.get_deployment(&key).await.expect("get");

        mock.update_deployment_replicas(&key, 5, &read.version).await.expect("update");
        mock.set_ready_replicas(&key, 2);

        let stored = mock.deployment(&key).expect("stored");
        assert_eq!(stored.spec.and_then(|s| s.replicas), Some(5));
        assert_eq!(stored.status.and_then(|s| s.ready_replicas), Some(2));
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let mock = MockPlatformClient::new();
        let key = mock.add_app(app());
        mock.script_failures(Operation::GetApp, vec![None, Some(Failure::Unavailable)]);

        assert!(mock.get_app(&key).await.is_ok());
        let err = mock.get_app(&key).await.unwrap_err();
        assert!(matches!(err, PlatformError::Unavailable(_)));
        assert!(mock.get_app(&key).await.is_ok());
    }

    #[tokio::test]
    async fn test_mutations_filter_reads() {
        let mock = MockPlatformClient::new();
        let key = mock.add_app(app());
        let read = mock.get_app(&key).await.expect("get");
        mock.update_app_status(&key, &MyAppStatus::default(), &read.version)
            .await
            .expect("update");
        assert_eq!(mock.calls().len(), 2);
        assert_eq!(mock.mutations(), vec![Operation::UpdateAppStatus]);
    }
}
