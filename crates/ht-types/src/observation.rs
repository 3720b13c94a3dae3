//! Trial result records exchanged between workers and the master.

use serde::{Deserialize, Serialize};

use crate::space::Configuration;

/// Terminal state of one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialState {
    Success,
    Failed,
    Timeout,
}

/// Opaque worker identity.
///
/// The master appends the first sighting of each identity to its registry;
/// insertion order is discovery order and there are no duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerInfo {
    pub id: String,
}

impl WorkerInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl std::fmt::Display for WorkerInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// The canonical result record for one evaluated [`Configuration`].
///
/// Produced by a worker and consumed exactly once by the coordinator.
/// `objectives = None` means the trial produced no usable result; the
/// coordinator substitutes the configured failure sentinel before forwarding
/// to the advisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub config: Configuration,
    pub trial_state: TrialState,
    pub constraints: Vec<f64>,
    pub objectives: Option<Vec<f64>>,
    pub elapsed_secs: f64,
    pub worker_info: WorkerInfo,
    pub extra_info: serde_json::Value,
}

impl Observation {
    /// True when the trial produced no usable objectives: absent, empty, or
    /// containing a non-finite value.
    pub fn is_failed(&self) -> bool {
        match &self.objectives {
            None => true,
            Some(objs) => objs.is_empty() || objs.iter().any(|v| !v.is_finite()),
        }
    }

    /// Rebuild this observation with the failure sentinel in place of its
    /// objectives. A state that still claims `Success` is forced to `Failed`;
    /// an explicit `Timeout` is preserved.
    pub fn with_failed_perf(&self, failed_perf: &[f64]) -> Self {
        let trial_state = match self.trial_state {
            TrialState::Timeout => TrialState::Timeout,
            _ => TrialState::Failed,
        };
        Self {
            objectives: Some(failed_perf.to_vec()),
            trial_state,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::{Configuration, ParameterValue};

    fn obs(objectives: Option<Vec<f64>>, state: TrialState) -> Observation {
        Observation {
            config: Configuration::new(vec![("x".into(), ParameterValue::Float(1.0))]),
            trial_state: state,
            constraints: Vec::new(),
            objectives,
            elapsed_secs: 0.5,
            worker_info: WorkerInfo::new("worker-0"),
            extra_info: serde_json::Value::Null,
        }
    }

    #[test]
    fn missing_objectives_are_a_failure() {
        assert!(obs(None, TrialState::Failed).is_failed());
        assert!(obs(Some(vec![f64::INFINITY]), TrialState::Success).is_failed());
        assert!(obs(Some(vec![f64::NAN]), TrialState::Success).is_failed());
        assert!(!obs(Some(vec![0.3]), TrialState::Success).is_failed());
    }

    #[test]
    fn failed_perf_substitution_forces_failed_state() {
        let sentinel = [1e6];
        let replaced = obs(None, TrialState::Success).with_failed_perf(&sentinel);
        assert_eq!(replaced.objectives.as_deref(), Some(&sentinel[..]));
        assert_eq!(replaced.trial_state, TrialState::Failed);

        let timed_out = obs(None, TrialState::Timeout).with_failed_perf(&sentinel);
        assert_eq!(timed_out.trial_state, TrialState::Timeout);
    }
}
