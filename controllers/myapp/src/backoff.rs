//! # Exponential Backoff
//!
//! Retry delays for reconciliations that failed with a transient error.
//! Each consecutive failure of the same resource doubles the delay, capped at
//! a maximum; a successful pass resets the sequence.
//!
//! With the defaults (5s min, 5m max): 5s, 10s, 20s, 40s, 80s, 160s, 300s (max).
//!
//! Only resources whose reconciliation returned an error are tracked; the
//! short fixed retries for status conflicts do not go through here.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Exponential backoff calculator
///
/// Generates backoff durations that double on every call to `next_backoff()`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Minimum backoff (first value, and value after reset)
    min: Duration,
    /// Current backoff
    current: Duration,
    /// Maximum backoff
    max: Duration,
}

impl ExponentialBackoff {
    /// Create a new backoff starting at `min` and capped at `max`.
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            current: min,
            max,
        }
    }

    /// Get the next backoff duration and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current;
        self.current = std::cmp::min(self.current.saturating_mul(2), self.max);
        result
    }

    /// Reset the backoff to the initial state
    pub fn reset(&mut self) {
        self.current = self.min;
    }
}

/// Per-resource backoff sequences, keyed by `namespace/name`.
#[derive(Debug)]
pub struct BackoffRegistry {
    min: Duration,
    max: Duration,
    states: Mutex<HashMap<String, ExponentialBackoff>>,
}

impl BackoffRegistry {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Next delay for a failing resource; advances that resource's sequence.
    pub fn next_for(&self, resource_key: &str) -> Duration {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        states
            .entry(resource_key.to_string())
            .or_insert_with(|| ExponentialBackoff::new(self.min, self.max))
            .next_backoff()
    }

    /// Forget a resource's failures after a successful pass.
    pub fn reset(&self, resource_key: &str) {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(state) = states.get_mut(resource_key) {
            state.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_exponential_backoff_sequence() {
        let mut backoff = ExponentialBackoff::new(secs(5), secs(300));

        assert_eq!(backoff.next_backoff(), secs(5));
        assert_eq!(backoff.next_backoff(), secs(10));
        assert_eq!(backoff.next_backoff(), secs(20));
        assert_eq!(backoff.next_backoff(), secs(40));
        assert_eq!(backoff.next_backoff(), secs(80));
        assert_eq!(backoff.next_backoff(), secs(160));
        assert_eq!(backoff.next_backoff(), secs(300)); // capped
        assert_eq!(backoff.next_backoff(), secs(300));
    }

    #[test]
    fn test_exponential_backoff_reset() {
        let mut backoff = ExponentialBackoff::new(secs(5), secs(300));

        assert_eq!(backoff.next_backoff(), secs(5));
        assert_eq!(backoff.next_backoff(), secs(10));
        assert_eq!(backoff.next_backoff(), secs(20));

        backoff.reset();

        // Should restart from beginning after success
        assert_eq!(backoff.next_backoff(), secs(5));
        assert_eq!(backoff.next_backoff(), secs(10));
    }

    #[test]
    fn test_registry_isolates_resources() {
        let registry = BackoffRegistry::new(secs(5), secs(300));

        assert_eq!(registry.next_for("default/a"), secs(5));
        assert_eq!(registry.next_for("default/a"), secs(10));
        // A different identity has its own sequence
        assert_eq!(registry.next_for("default/b"), secs(5));

        registry.reset("default/a");
        assert_eq!(registry.next_for("default/a"), secs(5));
        assert_eq!(registry.next_for("default/b"), secs(10));
    }
}
