//! Reconciliation logic for MyApp CRDs.
//!
//! One pass, in order:
//! - fetch the MyApp (absent: done)
//! - `status`: set the initial `Pending` phase if it was never set
//! - `builder`: derive the desired Deployment and Service
//! - `apply`: create or scale the Deployment, create the Service
//! - `status`: project phase/message/readyReplicas from the live Deployment
//!
//! No state survives between passes. Every write is made against a version
//! token read immediately before it, so a pass can start from any state and
//! be re-run at any time.

pub mod apply;
pub mod status;

pub use apply::ApplyOutcome;
pub use status::StatusStep;

use crate::builder;
use crate::config::RequeuePolicy;
use crate::error::ControllerError;
use crate::event::ReconcileEvent;
use crate::metrics::Metrics;
use platform_client::{ObjectKey, PlatformClientTrait};
use std::time::Duration;
use tracing::{error, info, warn};

/// What the dispatcher should do after a successful pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Resource is gone; wait for a new event
    Done,
    /// Reconcile the same resource again after the delay
    RequeueAfter(Duration),
}

/// Reconciles MyApp resources.
pub struct Reconciler {
    pub(crate) client: Box<dyn PlatformClientTrait + Send + Sync>,
    pub(crate) requeue: RequeuePolicy,
    pub(crate) metrics: Metrics,
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(
        client: impl PlatformClientTrait + Send + Sync + 'static,
        requeue: RequeuePolicy,
        metrics: Metrics,
    ) -> Self {
        Self {
            client: Box::new(client),
            requeue,
            metrics,
        }
    }

    /// Runs one reconciliation pass for the MyApp at `key`.
    ///
    /// Conflicts from any write become a short fixed requeue; other platform
    /// errors are returned so the dispatcher can back off.
    pub async fn reconcile_app(&self, key: &ObjectKey) -> Result<ReconcileOutcome, ControllerError> {
        let mut event = ReconcileEvent::new(key);
        let timer = self.metrics.reconcile_duration.start_timer();

        let result = match self.run_pass(key, &mut event).await {
            Err(e) if e.is_conflict() => {
                warn!("Conflict while reconciling MyApp {}: {}; retrying shortly", key, e);
                Ok(ReconcileOutcome::RequeueAfter(self.requeue.status_retry))
            }
            other => other,
        };
        timer.observe_duration();

        match &result {
            Ok(ReconcileOutcome::Done) => {
                self.metrics.record_outcome("done");
            }
            Ok(ReconcileOutcome::RequeueAfter(after)) => {
                event.requeue_after = Some(*after);
                self.metrics.record_outcome("requeue");
            }
            Err(e) => {
                event.error = Some(e.to_string());
                self.metrics.record_outcome("error");
            }
        }
        event.emit();

        result
    }

    async fn run_pass(&self, key: &ObjectKey, event: &mut ReconcileEvent) -> Result<ReconcileOutcome, ControllerError> {
        let app = match self.client.get_app(key).await {
            Ok(app) => app,
            Err(e) if e.is_not_found() => {
                info!("MyApp {} not found, ignoring since object must be deleted", key);
                return Ok(ReconcileOutcome::Done);
            }
            Err(e) => {
                error!("Failed to get MyApp {}: {}", key, e);
                return Err(e.into());
            }
        };
        event.resource_version = Some(app.version.to_string());
        let app = app.object;

        let mut requeue_after = self.requeue.steady;

        match self.ensure_initial_status(key, &app).await {
            StatusStep::Gone => return Ok(ReconcileOutcome::Done),
            StatusStep::Retry => requeue_after = requeue_after.min(self.requeue.status_retry),
            StatusStep::Persisted | StatusStep::Unchanged => {}
        }

        let desired = builder::build(&app)?;
        event.desired_replicas = Some(app.spec.replicas);

        let workload = self.apply_deployment(&desired.deployment).await?;
        event.workload = Some(workload.outcome);
        if workload.outcome.is_structural() {
            requeue_after = requeue_after.min(self.requeue.structural);
        }

        let service = self.apply_service(&desired.service).await?;
        event.service = Some(service);

        let projected = status::project(app.spec.replicas, workload.ready_replicas);
        event.phase = projected.phase;
        event.ready_replicas = Some(projected.ready_replicas);

        match self.project_final_status(key, &projected).await {
            StatusStep::Gone => return Ok(ReconcileOutcome::Done),
            StatusStep::Retry => requeue_after = requeue_after.min(self.requeue.status_retry),
            StatusStep::Persisted | StatusStep::Unchanged => {}
        }

        Ok(ReconcileOutcome::RequeueAfter(requeue_after))
    }
}
