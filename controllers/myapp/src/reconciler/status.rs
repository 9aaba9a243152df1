//! Status projection for MyApp.
//!
//! Both status writes re-fetch the MyApp first and write against the version
//! token of that read. A conflicting write is not retried inside the pass; the
//! caller requeues shortly instead.

use super::Reconciler;
use crds::{AppPhase, MyApp, MyAppStatus};
use platform_client::{ObjectKey, VersionToken};
use tracing::{debug, error, info, warn};

pub const INITIAL_MESSAGE: &str = "creating resources";
pub const READY_MESSAGE: &str = "all replicas ready";

/// Result of one status step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusStep {
    Persisted,
    /// Nothing to write
    Unchanged,
    /// Write failed or went stale; try again on a short requeue
    Retry,
    /// MyApp was deleted
    Gone,
}

/// Status for a MyApp seen for the first time. Keeps any readyReplicas already present.
pub fn initial_status(current: Option<&MyAppStatus>) -> MyAppStatus {
    MyAppStatus {
        phase: Some(AppPhase::Pending),
        message: INITIAL_MESSAGE.to_string(),
        ready_replicas: current.map(|s| s.ready_replicas).unwrap_or(0),
    }
}

/// Status derived from desired and observed ready replicas.
///
/// `Running` only on an exact match; more ready than desired (a scale-down in
/// progress) is still `Pending`.
pub fn project(desired: i32, ready: i32) -> MyAppStatus {
    if ready == desired {
        MyAppStatus {
            phase: Some(AppPhase::Running),
            message: READY_MESSAGE.to_string(),
            ready_replicas: ready,
        }
    } else {
        MyAppStatus {
            phase: Some(AppPhase::Pending),
            message: format!("waiting for replicas to become ready: {}/{}", ready, desired),
            ready_replicas: ready,
        }
    }
}

impl Reconciler {
    /// Record `Pending` on a MyApp whose phase was never set.
    pub(crate) async fn ensure_initial_status(&self, key: &ObjectKey, app: &MyApp) -> StatusStep {
        if app.phase().is_some() {
            return StatusStep::Unchanged;
        }

        let latest = match self.client.get_app(key).await {
            Ok(latest) => latest,
            Err(e) if e.is_not_found() => {
                info!("MyApp {} deleted before initial status was recorded", key);
                return StatusStep::Gone;
            }
            Err(e) => {
                warn!("Failed to re-fetch MyApp {} for initial status: {}", key, e);
                return StatusStep::Retry;
            }
        };
        // Another pass may have set it since the first read
        if latest.object.phase().is_some() {
            return StatusStep::Unchanged;
        }

        let status = initial_status(latest.object.status.as_ref());
        self.write_status(key, &status, &latest.version).await
    }

    /// Write `projected` unless the MyApp already carries exactly that status.
    pub(crate) async fn project_final_status(&self, key: &ObjectKey, projected: &MyAppStatus) -> StatusStep {
        let latest = match self.client.get_app(key).await {
            Ok(latest) => latest,
            Err(e) if e.is_not_found() => {
                info!("MyApp {} deleted before status was projected", key);
                return StatusStep::Gone;
            }
            Err(e) => {
                warn!("Failed to re-fetch MyApp {} for status: {}", key, e);
                return StatusStep::Retry;
            }
        };

        if latest.object.status.as_ref() == Some(projected) {
            debug!("Status of MyApp {} is up to date", key);
            return StatusStep::Unchanged;
        }

        self.write_status(key, projected, &latest.version).await
    }

    async fn write_status(&self, key: &ObjectKey, status: &MyAppStatus, version: &VersionToken) -> StatusStep {
        match self.client.update_app_status(key, status, version).await {
            Ok(_) => {
                info!(
                    "MyApp {} status: phase={:?} readyReplicas={} message={:?}",
                    key, status.phase, status.ready_replicas, status.message
                );
                self.metrics.record_mutation("status", "update");
                StatusStep::Persisted
            }
            Err(e) if e.is_not_found() => {
                info!("MyApp {} deleted before status write", key);
                StatusStep::Gone
            }
            Err(e) if e.is_conflict() => {
                warn!("Status of MyApp {} changed since it was read; will retry", key);
                StatusStep::Retry
            }
            Err(e) => {
                error!("Failed to update status of MyApp {}: {}", key, e);
                StatusStep::Retry
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::setup_web_app;
    use platform_client::{Failure, Operation};

    #[test]
    fn test_project_running_only_on_exact_match() {
        let ready = project(3, 3);
        assert_eq!(ready.phase, Some(AppPhase::Running));
        assert_eq!(ready.message, "all replicas ready");

        let waiting = project(3, 1);
        assert_eq!(waiting.phase, Some(AppPhase::Pending));
        assert_eq!(waiting.message, "waiting for replicas to become ready: 1/3");
        assert_eq!(waiting.ready_replicas, 1);

        let scaling_down = project(2, 4);
        assert_eq!(scaling_down.phase, Some(AppPhase::Pending));
        assert_eq!(scaling_down.message, "waiting for replicas to become ready: 4/2");
    }

    #[test]
    fn test_project_zero_replicas_is_running() {
        let idle = project(0, 0);
        assert_eq!(idle.phase, Some(AppPhase::Running));
        assert_eq!(idle.ready_replicas, 0);
    }

    #[test]
    fn test_initial_status_keeps_ready_replicas() {
        let prior = MyAppStatus {
            phase: None,
            message: String::new(),
            ready_replicas: 2,
        };
        let status = initial_status(Some(&prior));
        assert_eq!(status.phase, Some(AppPhase::Pending));
        assert_eq!(status.message, "creating resources");
        assert_eq!(status.ready_replicas, 2);
        assert_eq!(initial_status(None).ready_replicas, 0);
    }

    #[tokio::test]
    async fn test_initial_status_written_once() {
        let (reconciler, mock, key) = setup_web_app();
        let app = mock.app(&key).expect("app");

        assert_eq!(reconciler.ensure_initial_status(&key, &app).await, StatusStep::Persisted);
        let stored = mock.app(&key).expect("app");
        assert_eq!(stored.phase(), Some(AppPhase::Pending));

        assert_eq!(reconciler.ensure_initial_status(&key, &stored).await, StatusStep::Unchanged);
        assert_eq!(mock.count(Operation::UpdateAppStatus), 1);
    }

    #[tokio::test]
    async fn test_stale_status_write_retries() {
        let (reconciler, mock, key) = setup_web_app();
        mock.fail_next(Operation::UpdateAppStatus, Failure::Conflict);

        let step = reconciler.project_final_status(&key, &project(3, 0)).await;
        assert_eq!(step, StatusStep::Retry);
        assert_eq!(mock.app(&key).and_then(|a| a.status), None);
    }

    #[tokio::test]
    async fn test_final_status_skips_identical_write() {
        let (reconciler, mock, key) = setup_web_app();
        let projected = project(3, 0);

        assert_eq!(reconciler.project_final_status(&key, &projected).await, StatusStep::Persisted);
        assert_eq!(reconciler.project_final_status(&key, &projected).await, StatusStep::Unchanged);
        assert_eq!(mock.count(Operation::UpdateAppStatus), 1);
    }

    #[tokio::test]
    async fn test_final_status_on_deleted_app() {
        let (reconciler, mock, key) = setup_web_app();
        mock.delete_app(&key);

        assert_eq!(reconciler.project_final_status(&key, &project(3, 0)).await, StatusStep::Gone);
        assert!(mock.mutations().is_empty());
    }
}
