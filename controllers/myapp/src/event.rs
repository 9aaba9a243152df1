//! Typed per-pass log record.
//!
//! Each reconciliation pass fills one `ReconcileEvent` as it goes and emits it
//! as a single structured log line at the end. Fields a pass never reached
//! stay `None` and are logged as such.

use crate::reconciler::ApplyOutcome;
use crds::AppPhase;
use platform_client::ObjectKey;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileEvent {
    pub namespace: String,
    pub name: String,
    /// Version of the MyApp the pass started from
    pub resource_version: Option<String>,
    pub workload: Option<ApplyOutcome>,
    pub service: Option<ApplyOutcome>,
    pub phase: Option<AppPhase>,
    pub ready_replicas: Option<i32>,
    pub desired_replicas: Option<i32>,
    pub requeue_after: Option<Duration>,
    pub error: Option<String>,
}

impl ReconcileEvent {
    pub fn new(key: &ObjectKey) -> Self {
        Self {
            namespace: key.namespace.clone(),
            name: key.name.clone(),
            ..Default::default()
        }
    }

    pub fn emit(&self) {
        let requeue_secs = self.requeue_after.map(|d| d.as_secs());
        if let Some(error) = &self.error {
            warn!(
                namespace = %self.namespace,
                name = %self.name,
                resource_version = ?self.resource_version,
                workload = ?self.workload,
                service = ?self.service,
                error = %error,
                "MyApp reconcile failed"
            );
        } else {
            info!(
                namespace = %self.namespace,
                name = %self.name,
                resource_version = ?self.resource_version,
                workload = ?self.workload,
                service = ?self.service,
                phase = ?self.phase,
                ready_replicas = ?self.ready_replicas,
                desired_replicas = ?self.desired_replicas,
                requeue_secs = ?requeue_secs,
                "MyApp reconciled"
            );
        }
    }
}
