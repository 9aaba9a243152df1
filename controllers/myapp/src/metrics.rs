//! Prometheus metrics for the reconcile loop.
//!
//! `Metrics` is constructed once by the entry point against a `Registry` it
//! owns and handed to the reconciler; nothing here is global.

use prometheus::{Histogram, HistogramOpts, IntCounterVec, Opts, Registry};

#[derive(Clone, Debug)]
pub struct Metrics {
    /// Passes by outcome: `done`, `requeue`, `error`
    pub reconciliations: IntCounterVec,
    pub reconcile_duration: Histogram,
    /// Child writes by kind (`deployment`, `service`, `status`) and action (`create`, `update`)
    pub child_mutations: IntCounterVec,
}

impl Metrics {
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let reconciliations = IntCounterVec::new(
            Opts::new("myapp_reconcile_total", "MyApp reconciliation passes by outcome"),
            &["outcome"],
        )?;
        let reconcile_duration = Histogram::with_opts(
            HistogramOpts::new("myapp_reconcile_duration_seconds", "Duration of one MyApp reconciliation pass")
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )?;
        let child_mutations = IntCounterVec::new(
            Opts::new("myapp_child_mutations_total", "Writes issued against MyApp-owned objects"),
            &["kind", "action"],
        )?;

        registry.register(Box::new(reconciliations.clone()))?;
        registry.register(Box::new(reconcile_duration.clone()))?;
        registry.register(Box::new(child_mutations.clone()))?;

        Ok(Self {
            reconciliations,
            reconcile_duration,
            child_mutations,
        })
    }

    pub fn record_outcome(&self, outcome: &str) {
        self.reconciliations.with_label_values(&[outcome]).inc();
    }

    pub fn record_mutation(&self, kind: &str, action: &str) {
        self.child_mutations.with_label_values(&[kind, action]).inc();
    }
}
