//! Kubernetes resource watcher.
//!
//! Drives reconciliation from `kube_runtime::Controller`: MyApp events, plus
//! events on owned Deployments and Services mapped back to their owner. The
//! runtime guarantees at most one in-flight pass per MyApp.

use crate::backoff::BackoffRegistry;
use crate::error::ControllerError;
use crate::reconciler::{ReconcileOutcome, Reconciler};
use crds::MyApp;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::{Api, ResourceExt};
use kube_runtime::{Controller, controller::{Action, Config as ControllerConfig}, watcher};
use futures::StreamExt;
use platform_client::ObjectKey;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info};

/// State shared by every reconcile and error-policy invocation.
pub struct Context {
    pub reconciler: Reconciler,
    pub backoff: BackoffRegistry,
}

impl Context {
    pub fn new(reconciler: Reconciler, backoff: BackoffRegistry) -> Self {
        Self { reconciler, backoff }
    }
}

pub fn to_action(outcome: ReconcileOutcome) -> Action {
    match outcome {
        ReconcileOutcome::Done => Action::await_change(),
        ReconcileOutcome::RequeueAfter(after) => Action::requeue(after),
    }
}

fn backoff_key(obj: &MyApp) -> String {
    ObjectKey::of(obj)
        .map(|key| key.to_string())
        .unwrap_or_else(|_| obj.name_any())
}

async fn reconcile(obj: Arc<MyApp>, ctx: Arc<Context>) -> Result<Action, ControllerError> {
    let key = ObjectKey::of(obj.as_ref())?;
    debug!("Reconciling MyApp {}", key);

    let outcome = ctx.reconciler.reconcile_app(&key).await?;
    ctx.backoff.reset(&key.to_string());
    Ok(to_action(outcome))
}

/// Error policy: requeue with per-resource exponential backoff.
fn error_policy(obj: Arc<MyApp>, error: &ControllerError, ctx: Arc<Context>) -> Action {
    let key = backoff_key(&obj);
    let delay = ctx.backoff.next_for(&key);
    error!("Reconciliation error for MyApp {}: {}; retrying in {:?}", key, error, delay);
    Action::requeue(delay)
}

/// Watches MyApp resources and the children they own.
pub struct Watcher {
    context: Arc<Context>,
    apps: Api<MyApp>,
    deployments: Api<Deployment>,
    services: Api<Service>,
    concurrency: u16,
    debounce: Duration,
    ready: Arc<AtomicBool>,
}

impl Watcher {
    /// Creates a new watcher instance.
    pub fn new(
        context: Arc<Context>,
        apps: Api<MyApp>,
        deployments: Api<Deployment>,
        services: Api<Service>,
        concurrency: u16,
        debounce: Duration,
        ready: Arc<AtomicBool>,
    ) -> Self {
        Self {
            context,
            apps,
            deployments,
            services,
            concurrency,
            debounce,
            ready,
        }
    }

    /// Runs the controller loop until a termination signal arrives.
    pub async fn watch_apps(&self) -> Result<(), ControllerError> {
        info!("Starting MyApp watcher");

        // Concurrency bounds distinct MyApps in flight, never two passes for one
        let controller_config = ControllerConfig::default()
            .debounce(self.debounce)
            .concurrency(self.concurrency);

        let controller = Controller::new(self.apps.clone(), watcher::Config::default())
            .owns(self.deployments.clone(), watcher::Config::default())
            .owns(self.services.clone(), watcher::Config::default())
            .with_config(controller_config)
            .shutdown_on_signal();

        self.ready.store(true, Ordering::Relaxed);

        controller
            .run(reconcile, error_policy, self.context.clone())
            .for_each(|res| async move {
                match res {
                    Ok((obj, _)) => debug!("Reconciled MyApp {}", obj.name),
                    Err(e) => error!("Controller error for MyApp: {}", e),
                }
            })
            .await;

        self.ready.store(false, Ordering::Relaxed);
        info!("MyApp watcher stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RequeuePolicy;
    use crate::metrics::Metrics;
    use crate::test_utils::create_test_app;
    use platform_client::{MockPlatformClient, PlatformError};

    fn context() -> Arc<Context> {
        let metrics = Metrics::new(&prometheus::Registry::new()).expect("metrics");
        let reconciler = Reconciler::new(MockPlatformClient::new(), RequeuePolicy::default(), metrics);
        Arc::new(Context::new(
            reconciler,
            BackoffRegistry::new(Duration::from_secs(5), Duration::from_secs(300)),
        ))
    }

    #[test]
    fn test_outcome_to_action() {
        assert_eq!(to_action(ReconcileOutcome::Done), Action::await_change());
        assert_eq!(
            to_action(ReconcileOutcome::RequeueAfter(Duration::from_secs(15))),
            Action::requeue(Duration::from_secs(15))
        );
    }

    #[test]
    fn test_error_policy_backs_off_per_resource() {
        let ctx = context();
        let web = Arc::new(create_test_app("web", "default", "app:v1", 1, 8080));
        let api = Arc::new(create_test_app("api", "default", "app:v1", 1, 8080));
        let err = ControllerError::Platform(PlatformError::Unavailable("down".to_string()));

        assert_eq!(error_policy(web.clone(), &err, ctx.clone()), Action::requeue(Duration::from_secs(5)));
        assert_eq!(error_policy(web.clone(), &err, ctx.clone()), Action::requeue(Duration::from_secs(10)));
        assert_eq!(error_policy(api, &err, ctx.clone()), Action::requeue(Duration::from_secs(5)));

        ctx.backoff.reset("default/web");
        assert_eq!(error_policy(web, &err, ctx), Action::requeue(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_successful_reconcile_resets_backoff() {
        let ctx = context();
        let app = Arc::new(create_test_app("ghost", "default", "app:v1", 1, 8080));
        ctx.backoff.next_for("default/ghost");
        ctx.backoff.next_for("default/ghost");

        // Not stored in the mock: the pass ends with Done
        let action = reconcile(app, ctx.clone()).await.expect("reconcile");
        assert_eq!(action, Action::await_change());
        assert_eq!(ctx.backoff.next_for("default/ghost"), Duration::from_secs(5));
    }
}
