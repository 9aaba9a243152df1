//! Diff and apply for the child objects.
//!
//! The Deployment is created when missing and scaled when its replica count
//! differs from the desired one. Every other field of a live Deployment is
//! left alone. The Service is created when missing; drift on a live Service
//! is reported but never corrected.

use super::Reconciler;
use crate::error::ControllerError;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use platform_client::ObjectKey;
use tracing::{debug, error, info, warn};

/// What applying one child did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Created,
    Updated,
    Unchanged,
    /// Live object differs from desired in a way that is not corrected
    Drifted,
}

impl ApplyOutcome {
    /// Whether the platform was changed in a way that needs a follow-up pass.
    pub fn is_structural(self) -> bool {
        matches!(self, ApplyOutcome::Created | ApplyOutcome::Updated)
    }
}

/// Result of applying the Deployment, with the readiness observed on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedWorkload {
    pub outcome: ApplyOutcome,
    /// `status.readyReplicas` of the live Deployment; 0 when just created
    pub ready_replicas: i32,
}

/// Desired replica count, if it differs from the live one.
pub fn replicas_drift(live: &Deployment, desired: &Deployment) -> Option<i32> {
    let desired = desired.spec.as_ref().and_then(|s| s.replicas)?;
    let live = live.spec.as_ref().and_then(|s| s.replicas);
    (live != Some(desired)).then_some(desired)
}

/// Describes how a live Service differs from the desired one, if it does.
///
/// Only the exposed ports and the selector are compared; fields the platform
/// fills in (cluster IP, node ports, defaults) are ignored.
pub fn service_drift(live: &Service, desired: &Service) -> Option<String> {
    let ports = |svc: &Service| {
        svc.spec
            .as_ref()
            .and_then(|s| s.ports.as_ref())
            .map(|ports| {
                ports
                    .iter()
                    .map(|p| (p.port, p.target_port.clone()))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default()
    };
    let selector = |svc: &Service| svc.spec.as_ref().and_then(|s| s.selector.clone());

    let (live_ports, desired_ports) = (ports(live), ports(desired));
    if live_ports != desired_ports {
        return Some(format!("ports {:?}, want {:?}", live_ports, desired_ports));
    }
    let (live_selector, desired_selector) = (selector(live), selector(desired));
    if live_selector != desired_selector {
        return Some(format!("selector {:?}, want {:?}", live_selector, desired_selector));
    }
    None
}

impl Reconciler {
    /// Make the live Deployment match `desired`.
    pub(crate) async fn apply_deployment(&self, desired: &Deployment) -> Result<AppliedWorkload, ControllerError> {
        let key = ObjectKey::of(desired)?;

        let live = match self.client.get_deployment(&key).await {
            Ok(live) => live,
            Err(e) if e.is_not_found() => {
                info!("Creating Deployment {}", key);
                self.client.create_deployment(desired).await.map_err(|e| {
                    error!("Failed to create Deployment {}: {}", key, e);
                    ControllerError::from(e)
                })?;
                self.metrics.record_mutation("deployment", "create");
                return Ok(AppliedWorkload {
                    outcome: ApplyOutcome::Created,
                    ready_replicas: 0,
                });
            }
            Err(e) => {
                error!("Failed to get Deployment {}: {}", key, e);
                return Err(e.into());
            }
        };

        let ready_replicas = live
            .object
            .status
            .as_ref()
            .and_then(|s| s.ready_replicas)
            .unwrap_or(0);

        let Some(replicas) = replicas_drift(&live.object, desired) else {
            debug!("Deployment {} is up to date", key);
            return Ok(AppliedWorkload {
                outcome: ApplyOutcome::Unchanged,
                ready_replicas,
            });
        };

        info!("Scaling Deployment {} to {} replicas", key, replicas);
        self.client
            .update_deployment_replicas(&key, replicas, &live.version)
            .await
            .map_err(|e| {
                error!("Failed to scale Deployment {}: {}", key, e);
                ControllerError::from(e)
            })?;
        self.metrics.record_mutation("deployment", "update");

        Ok(AppliedWorkload {
            outcome: ApplyOutcome::Updated,
            ready_replicas,
        })
    }

    /// Create the Service if it is missing.
    pub(crate) async fn apply_service(&self, desired: &Service) -> Result<ApplyOutcome, ControllerError> {
        let key = ObjectKey::of(desired)?;

        match self.client.get_service(&key).await {
            Ok(live) => match service_drift(&live.object, desired) {
                Some(drift) => {
                    warn!("Service {} has drifted ({}); leaving it as is", key, drift);
                    Ok(ApplyOutcome::Drifted)
                }
                None => {
                    debug!("Service {} is up to date", key);
                    Ok(ApplyOutcome::Unchanged)
                }
            },
            Err(e) if e.is_not_found() => {
                info!("Creating Service {}", key);
                self.client.create_service(desired).await.map_err(|e| {
                    error!("Failed to create Service {}: {}", key, e);
                    ControllerError::from(e)
                })?;
                self.metrics.record_mutation("service", "create");
                Ok(ApplyOutcome::Created)
            }
            Err(e) => {
                error!("Failed to get Service {}: {}", key, e);
                Err(e.into())
            }
        }
    }
}
