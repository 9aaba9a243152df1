//! `kube::Api`-backed platform client.

use crate::error::PlatformError;
use crate::models::{ObjectKey, VersionToken, Versioned};
use crate::platform_trait::PlatformClientTrait;
use crds::{MyApp, MyAppStatus};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::api::{Patch, PatchParams, PostParams};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use tracing::debug;

/// Platform client talking to the Kubernetes API server.
#[derive(Clone)]
pub struct KubePlatformClient {
    client: Client,
}

impl std::fmt::Debug for KubePlatformClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubePlatformClient").finish_non_exhaustive()
    }
}

impl KubePlatformClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn get<K>(&self, key: &ObjectKey, kind: &str) -> Result<Versioned<K>, PlatformError>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        K::DynamicType: Default,
    {
        let what = format!("{} {}", kind, key);
        let obj = self
            .api::<K>(&key.namespace)
            .get(&key.name)
            .await
            .map_err(|e| PlatformError::from_kube(e, &what))?;
        Versioned::from_object(obj)
    }

    async fn create<K>(&self, obj: &K, kind: &str) -> Result<VersionToken, PlatformError>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope> + Clone + DeserializeOwned + Serialize + Debug,
        K::DynamicType: Default,
    {
        let key = ObjectKey::of(obj)?;
        let what = format!("{} {}", kind, key);
        debug!("Creating {}", what);
        let created = self
            .api::<K>(&key.namespace)
            .create(&PostParams::default(), obj)
            .await
            .map_err(|e| PlatformError::from_kube(e, &what))?;
        Ok(Versioned::from_object(created)?.version)
    }

    /// Merge patch with `metadata.resourceVersion` set, so the API server rejects
    /// the write with 409 if the object changed since `version` was read.
    fn versioned_patch(version: &VersionToken, body: serde_json::Value) -> serde_json::Value {
        let mut patch = serde_json::json!({
            "metadata": { "resourceVersion": version.as_str() }
        });
        if let (Some(target), serde_json::Value::Object(fields)) = (patch.as_object_mut(), body) {
            target.extend(fields);
        }
        patch
    }
}

#[async_trait::async_trait]
impl PlatformClientTrait for KubePlatformClient {
    async fn get_app(&self, key: &ObjectKey) -> Result<Versioned<MyApp>, PlatformError> {
        self.get(key, "MyApp").await
    }

    async fn update_app_status(&self, key: &ObjectKey, status: &MyAppStatus, version: &VersionToken) -> Result<VersionToken, PlatformError> {
        let what = format!("MyApp {} status", key);
        let patch = Self::versioned_patch(version, serde_json::json!({ "status": status }));
        let updated = self
            .api::<MyApp>(&key.namespace)
            .patch_status(&key.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| PlatformError::from_kube(e, &what))?;
        Ok(Versioned::from_object(updated)?.version)
    }

    async fn get_deployment(&self, key: &ObjectKey) -> Result<Versioned<Deployment>, PlatformError> {
        self.get(key, "Deployment").await
    }

    async fn create_deployment(&self, deployment: &Deployment) -> Result<VersionToken, PlatformError> {
        self.create(deployment, "Deployment").await
    }

    async fn update_deployment_replicas(&self, key: &ObjectKey, replicas: i32, version: &VersionToken) -> Result<VersionToken, PlatformError> {
        let what = format!("Deployment {}", key);
        let patch = Self::versioned_patch(version, serde_json::json!({ "spec": { "replicas": replicas } }));
        let updated = self
            .api::<Deployment>(&key.namespace)
            .patch(&key.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| PlatformError::from_kube(e, &what))?;
        Ok(Versioned::from_object(updated)?.version)
    }

    async fn get_service(&self, key: &ObjectKey) -> Result<Versioned<Service>, PlatformError> {
        self.get(key, "Service").await
    }

    async fn create_service(&self, service: &Service) -> Result<VersionToken, PlatformError> {
        self.create(service, "Service").await
    }
}
