//! Incumbent tracking and the append-only evaluation history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;

use crate::observation::TrialState;
use crate::space::Configuration;

/// Per-key evaluation record. Entries are added or overwritten, never
/// removed, for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalEntry {
    pub score: f64,
    pub timestamp: DateTime<Utc>,
    pub state: TrialState,
}

/// Owns the best-known (performance, configuration) pair and the evaluation
/// history map.
///
/// Performance follows the "larger is better" convention used by both
/// scheduling loops: callers negate lower-is-better objectives before
/// calling [`consider`]. The initial performance is negative infinity, so
/// the first finite observation always wins; ties never update.
///
/// This is the only mutation path into either piece of state.
///
/// [`consider`]: IncumbentTracker::consider
#[derive(Debug, Clone)]
pub struct IncumbentTracker<K: Eq + Hash> {
    best_perf: f64,
    best_config: Option<Configuration>,
    evals: HashMap<K, EvalEntry>,
}

impl<K: Eq + Hash> Default for IncumbentTracker<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash> IncumbentTracker<K> {
    pub fn new() -> Self {
        Self {
            best_perf: f64::NEG_INFINITY,
            best_config: None,
            evals: HashMap::new(),
        }
    }

    /// Start from a fallback configuration (typically the advisor default)
    /// so a run that never succeeds still reports something actionable.
    pub fn with_default(config: Configuration) -> Self {
        Self {
            best_perf: f64::NEG_INFINITY,
            best_config: Some(config),
            evals: HashMap::new(),
        }
    }

    /// Adopt `(perf, config)` iff `perf` strictly exceeds the stored value.
    /// Returns whether the incumbent changed.
    pub fn consider(&mut self, perf: f64, config: &Configuration) -> bool {
        if perf > self.best_perf {
            self.best_perf = perf;
            self.best_config = Some(config.clone());
            true
        } else {
            false
        }
    }

    /// Append/overwrite the evaluation record for `key`.
    pub fn record(&mut self, key: K, score: f64, state: TrialState) {
        self.evals.insert(
            key,
            EvalEntry {
                score,
                timestamp: Utc::now(),
                state,
            },
        );
    }

    pub fn best_perf(&self) -> f64 {
        self.best_perf
    }

    pub fn best_config(&self) -> Option<&Configuration> {
        self.best_config.as_ref()
    }

    pub fn entry(&self, key: &K) -> Option<&EvalEntry> {
        self.evals.get(key)
    }

    pub fn history(&self) -> &HashMap<K, EvalEntry> {
        &self.evals
    }

    pub fn len(&self) -> usize {
        self.evals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::ParameterValue;

    fn config(x: f64) -> Configuration {
        Configuration::new(vec![("x".into(), ParameterValue::Float(x))])
    }

    #[test]
    fn first_finite_observation_always_wins() {
        let mut tracker: IncumbentTracker<Configuration> = IncumbentTracker::new();
        assert!(tracker.consider(-1e9, &config(1.0)));
        assert_eq!(tracker.best_perf(), -1e9);
        assert_eq!(tracker.best_config(), Some(&config(1.0)));
    }

    #[test]
    fn incumbent_perf_is_monotonic_and_ties_lose() {
        let mut tracker: IncumbentTracker<Configuration> = IncumbentTracker::new();
        let perfs = [-2.0, -1.0, -3.0, -1.0, -0.5];
        let mut last = f64::NEG_INFINITY;
        for (i, perf) in perfs.into_iter().enumerate() {
            tracker.consider(perf, &config(i as f64));
            assert!(tracker.best_perf() >= last);
            last = tracker.best_perf();
        }
        assert_eq!(tracker.best_perf(), -0.5);
        assert_eq!(tracker.best_config(), Some(&config(4.0)));

        // An exact tie must not replace the stored configuration.
        tracker.consider(-0.5, &config(9.0));
        assert_eq!(tracker.best_config(), Some(&config(4.0)));
    }

    #[test]
    fn record_overwrites_without_duplicating() {
        let mut tracker: IncumbentTracker<Configuration> = IncumbentTracker::new();
        let c = config(1.0);
        tracker.record(c.clone(), -0.8, TrialState::Failed);
        tracker.record(c.clone(), -0.4, TrialState::Success);
        assert_eq!(tracker.len(), 1);
        let entry = tracker.entry(&c).unwrap();
        assert_eq!(entry.score, -0.4);
        assert_eq!(entry.state, TrialState::Success);
    }

    #[test]
    fn default_config_survives_a_run_with_no_successes() {
        let tracker: IncumbentTracker<Configuration> =
            IncumbentTracker::with_default(config(0.0));
        assert_eq!(tracker.best_perf(), f64::NEG_INFINITY);
        assert_eq!(tracker.best_config(), Some(&config(0.0)));
    }
}
