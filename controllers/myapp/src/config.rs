//! Controller configuration loaded from environment variables.

use crate::error::ControllerError;
use std::net::SocketAddr;
use std::time::Duration;

/// Requeue delays returned by a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequeuePolicy {
    /// After the workload was created or scaled
    pub structural: Duration,
    /// After a fully converged pass
    pub steady: Duration,
    /// After a status write failed or conflicted
    pub status_retry: Duration,
}

impl Default for RequeuePolicy {
    fn default() -> Self {
        Self {
            structural: Duration::from_secs(15),
            steady: Duration::from_secs(60),
            status_retry: Duration::from_secs(5),
        }
    }
}

/// Process-wide configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Namespace to watch; `None` watches all namespaces
    pub namespace: Option<String>,
    /// Listen address for `/healthz`, `/readyz` and `/metrics`
    pub metrics_addr: SocketAddr,
    pub requeue: RequeuePolicy,
    /// Error backoff bounds
    pub backoff_min: Duration,
    pub backoff_max: Duration,
    /// Maximum concurrent reconciliations (distinct resources)
    pub concurrency: u16,
    /// Quiet period before reconciling after a burst of events
    pub debounce: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: None,
            metrics_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            requeue: RequeuePolicy::default(),
            backoff_min: Duration::from_secs(5),
            backoff_max: Duration::from_secs(300),
            concurrency: 4,
            debounce: Duration::from_secs(1),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let secs = |key: &str, default: Duration| -> Result<Duration, ControllerError> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|_| ControllerError::InvalidConfig(format!("{} must be a whole number of seconds, got {:?}", key, raw))),
                None => Ok(default),
            }
        };

        let metrics_addr = match lookup("METRICS_ADDR") {
            Some(raw) => raw
                .parse::<SocketAddr>()
                .map_err(|_| ControllerError::InvalidConfig(format!("METRICS_ADDR must be host:port, got {:?}", raw)))?,
            None => defaults.metrics_addr,
        };

        let concurrency = match lookup("RECONCILE_CONCURRENCY") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ControllerError::InvalidConfig(format!("RECONCILE_CONCURRENCY must be a number, got {:?}", raw)))?,
            None => defaults.concurrency,
        };

        let config = Self {
            namespace: lookup("WATCH_NAMESPACE").filter(|ns| !ns.trim().is_empty()),
            metrics_addr,
            requeue: RequeuePolicy {
                structural: secs("STRUCTURAL_REQUEUE_SECS", defaults.requeue.structural)?,
                steady: secs("STEADY_REQUEUE_SECS", defaults.requeue.steady)?,
                status_retry: secs("STATUS_RETRY_SECS", defaults.requeue.status_retry)?,
            },
            backoff_min: secs("BACKOFF_MIN_SECS", defaults.backoff_min)?,
            backoff_max: secs("BACKOFF_MAX_SECS", defaults.backoff_max)?,
            concurrency,
            debounce: secs("DEBOUNCE_SECS", defaults.debounce)?,
        };

        if config.backoff_min.is_zero() || config.backoff_min > config.backoff_max {
            return Err(ControllerError::InvalidConfig(format!(
                "BACKOFF_MIN_SECS ({}) must be > 0 and <= BACKOFF_MAX_SECS ({})",
                config.backoff_min.as_secs(),
                config.backoff_max.as_secs()
            )));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).expect("defaults");
        assert_eq!(config, Config::default());
        assert!(config.requeue.structural < config.requeue.steady);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("WATCH_NAMESPACE", "apps"),
            ("METRICS_ADDR", "127.0.0.1:9100"),
            ("STRUCTURAL_REQUEUE_SECS", "10"),
            ("STEADY_REQUEUE_SECS", "120"),
            ("STATUS_RETRY_SECS", "2"),
            ("RECONCILE_CONCURRENCY", "8"),
        ]))
        .expect("config");
        assert_eq!(config.namespace.as_deref(), Some("apps"));
        assert_eq!(config.metrics_addr, "127.0.0.1:9100".parse().expect("addr"));
        assert_eq!(config.requeue.structural, Duration::from_secs(10));
        assert_eq!(config.requeue.steady, Duration::from_secs(120));
        assert_eq!(config.requeue.status_retry, Duration::from_secs(2));
        assert_eq!(config.concurrency, 8);
    }

    #[test]
    fn test_blank_namespace_watches_all() {
        let config = Config::from_lookup(lookup(&[("WATCH_NAMESPACE", "  ")])).expect("config");
        assert!(config.namespace.is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = Config::from_lookup(lookup(&[("STEADY_REQUEUE_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(_)));

        let err = Config::from_lookup(lookup(&[("METRICS_ADDR", "nowhere")])).unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(_)));

        let err = Config::from_lookup(lookup(&[("BACKOFF_MIN_SECS", "600")])).unwrap_err();
        assert!(matches!(err, ControllerError::InvalidConfig(_)));
    }
}
