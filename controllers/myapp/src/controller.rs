//! Main controller implementation.
//!
//! This module contains the `Controller` struct that wires the platform
//! client, reconciler, watcher and probe/metrics server together and runs
//! them until shutdown.

use crate::backoff::BackoffRegistry;
use crate::config::Config;
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::reconciler::Reconciler;
use crate::server::{self, ServerState};
use crate::watcher::{Context, Watcher};
use crds::MyApp;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::{Api, Client};
use platform_client::KubePlatformClient;
use prometheus::Registry;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

/// Main controller for MyApp resources.
pub struct Controller {
    watcher: JoinHandle<Result<(), ControllerError>>,
    server: JoinHandle<Result<(), ControllerError>>,
    shutdown: watch::Sender<bool>,
}

fn scoped_api<K>(client: Client, namespace: Option<&str>) -> Api<K>
where
    K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    K::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

impl Controller {
    /// Creates a new controller instance and starts its background tasks.
    pub async fn new(config: Config) -> Result<Self, ControllerError> {
        info!("Initializing MyApp Controller");

        let kube_client = Client::try_default().await?;

        let registry = Registry::new();
        let metrics = Metrics::new(&registry)?;
        let state = ServerState::new(registry);

        let reconciler = Reconciler::new(
            KubePlatformClient::new(kube_client.clone()),
            config.requeue,
            metrics,
        );
        let context = Arc::new(Context::new(
            reconciler,
            BackoffRegistry::new(config.backoff_min, config.backoff_max),
        ));

        let namespace = config.namespace.as_deref();
        let watcher_instance = Watcher::new(
            context,
            scoped_api::<MyApp>(kube_client.clone(), namespace),
            scoped_api::<Deployment>(kube_client.clone(), namespace),
            scoped_api::<Service>(kube_client, namespace),
            config.concurrency,
            config.debounce,
            state.ready.clone(),
        );

        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let server = tokio::spawn(server::serve(config.metrics_addr, state, async move {
            while !*shutdown_rx.borrow() {
                if shutdown_rx.changed().await.is_err() {
                    break;
                }
            }
        }));

        let watcher = tokio::spawn(async move { watcher_instance.watch_apps().await });

        Ok(Self {
            watcher,
            server,
            shutdown,
        })
    }

    /// Runs the controller until shutdown.
    ///
    /// The watcher stops on SIGTERM or Ctrl+C; the server is then drained.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("MyApp Controller running");

        tokio::select! {
            result = &mut self.watcher => {
                result
                    .map_err(|e| ControllerError::Watch(format!("MyApp watcher panicked: {}", e)))??;
                info!("Watcher finished, stopping server");
                let _ = self.shutdown.send(true);
                self.server
                    .await
                    .map_err(|e| ControllerError::Watch(format!("Server task panicked: {}", e)))??;
            }
            result = &mut self.server => {
                result
                    .map_err(|e| ControllerError::Watch(format!("Server task panicked: {}", e)))??;
                return Err(ControllerError::Watch("probe and metrics server exited".to_string()));
            }
        }

        Ok(())
    }
}
