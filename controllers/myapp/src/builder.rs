//! Desired-state builder.
//!
//! Pure mapping from a `MyApp` to the Deployment and Service that should exist
//! for it. Reads only the resource's identity and spec, never its status, so
//! the same `MyApp` always yields byte-identical manifests.

use crate::error::ControllerError;
use crds::MyApp;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, PodSpec, PodTemplateSpec, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::Resource;
use platform_client::ObjectKey;
use std::collections::BTreeMap;

/// Label key shared by the pod template, the Deployment selector and the Service selector.
pub const APP_LABEL: &str = "app";
pub const CONTAINER_NAME: &str = "app";
pub const CONTAINER_PORT_NAME: &str = "http";
/// Port the Service exposes; traffic is forwarded to `spec.port`.
pub const SERVICE_PORT: i32 = 80;

/// Child manifests for one `MyApp`.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredState {
    pub deployment: Deployment,
    pub service: Service,
}

pub fn labels(app_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(APP_LABEL.to_string(), app_name.to_string())])
}

pub fn service_name(app_name: &str) -> String {
    format!("{}-service", app_name)
}

/// Build both children. Fails only if the resource lacks name, namespace or uid.
pub fn build(app: &MyApp) -> Result<DesiredState, ControllerError> {
    let key = ObjectKey::of(app).map_err(|e| ControllerError::InvalidResource(e.to_string()))?;
    let owner = owner_reference(app)?;
    Ok(DesiredState {
        deployment: desired_deployment(app, &key, owner.clone()),
        service: desired_service(app, &key, owner),
    })
}

/// Controller owner reference, so the platform garbage-collects children with the parent.
fn owner_reference(app: &MyApp) -> Result<OwnerReference, ControllerError> {
    app.controller_owner_ref(&()).ok_or_else(|| {
        ControllerError::InvalidResource(format!(
            "MyApp {} has no metadata.uid; cannot own children",
            app.metadata.name.as_deref().unwrap_or("<unnamed>")
        ))
    })
}

fn child_meta(name: String, key: &ObjectKey, owner: OwnerReference) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: Some(key.namespace.clone()),
        labels: Some(labels(&key.name)),
        owner_references: Some(vec![owner]),
        ..Default::default()
    }
}

fn desired_deployment(app: &MyApp, key: &ObjectKey, owner: OwnerReference) -> Deployment {
    let labels = labels(&key.name);
    Deployment {
        metadata: child_meta(key.name.clone(), key, owner),
        spec: Some(DeploymentSpec {
            replicas: Some(app.spec.replicas),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: CONTAINER_NAME.to_string(),
                        image: Some(app.spec.image.clone()),
                        ports: Some(vec![ContainerPort {
                            container_port: app.spec.port,
                            name: Some(CONTAINER_PORT_NAME.to_string()),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        status: None,
    }
}

fn desired_service(app: &MyApp, key: &ObjectKey, owner: OwnerReference) -> Service {
    Service {
        metadata: child_meta(service_name(&key.name), key, owner),
        spec: Some(ServiceSpec {
            selector: Some(labels(&key.name)),
            ports: Some(vec![ServicePort {
                port: SERVICE_PORT,
                target_port: Some(IntOrString::Int(app.spec.port)),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            type_: Some("ClusterIP".to_string()),
            ..Default::default()
        }),
        status: None,
    }
}
