//! MyApp Controller
//!
//! Reconciles `MyApp` CRDs into an owned Deployment and ClusterIP Service,
//! and reports readiness back on the MyApp's status.

mod backoff;
mod builder;
mod config;
mod controller;
mod error;
mod event;
mod metrics;
mod reconciler;
mod server;
#[cfg(test)]
mod test_utils;
mod watcher;

use crate::config::Config;
use crate::error::ControllerError;
use controller::Controller;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // kube's rustls client needs a process-wide crypto provider
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        info!("rustls crypto provider already installed");
    }

    info!("Starting MyApp Controller");

    let config = Config::from_env()?;

    info!("Configuration:");
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Metrics address: {}", config.metrics_addr);
    info!(
        "  Requeue: structural={:?} steady={:?} status_retry={:?}",
        config.requeue.structural, config.requeue.steady, config.requeue.status_retry
    );
    info!("  Backoff: {:?}..{:?}", config.backoff_min, config.backoff_max);
    info!("  Concurrency: {}, debounce: {:?}", config.concurrency, config.debounce);

    let controller = Controller::new(config).await?;
    controller.run().await?;

    info!("MyApp Controller stopped");
    Ok(())
}
