//! Run-level configuration for a coordinated optimization run.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::errors::HtError;

/// Default failure sentinel per objective: large enough that a failed trial
/// can never become the incumbent under the negated-objective convention.
pub const DEFAULT_FAILED_PERF: f64 = 1e30;

/// Which scheduling discipline the coordinator runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParallelStrategy {
    /// Lock-step rounds: a batch is suggested, dispatched, and fully retired
    /// before the next batch is requested.
    Sync,
    /// Pipelined: dispatch and collection interleave, with at most
    /// `batch_size` trials outstanding.
    Async,
}

impl FromStr for ParallelStrategy {
    type Err = HtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sync" => Ok(Self::Sync),
            "async" => Ok(Self::Async),
            other => Err(HtError::Config(format!(
                "invalid parallel strategy - {other}"
            ))),
        }
    }
}

impl std::fmt::Display for ParallelStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sync => write!(f, "sync"),
            Self::Async => write!(f, "async"),
        }
    }
}

/// Recognized options for one optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOptions {
    pub task_id: String,
    pub parallel_strategy: ParallelStrategy,
    pub batch_size: usize,
    pub runtime_limit: Duration,
    /// Advisory per-trial limit forwarded to workers; enforcement is the
    /// worker's responsibility.
    pub time_limit_per_trial_secs: f64,
    /// Configuration-count budget for the async dispatcher.
    pub max_trial_num: usize,
    pub num_objectives: usize,
    /// Sentinel objective vector substituted for failed trials, one entry
    /// per objective.
    pub failed_perf: Vec<f64>,
    /// Sleep applied when the channel reports empty before re-polling.
    pub poll_interval: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            task_id: "default".to_string(),
            parallel_strategy: ParallelStrategy::Async,
            batch_size: 4,
            runtime_limit: Duration::from_secs(600),
            time_limit_per_trial_secs: 180.0,
            max_trial_num: usize::MAX,
            num_objectives: 1,
            failed_perf: vec![DEFAULT_FAILED_PERF],
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl RunOptions {
    pub fn new(parallel_strategy: ParallelStrategy, batch_size: usize) -> Self {
        Self {
            parallel_strategy,
            batch_size,
            ..Self::default()
        }
    }

    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = task_id.into();
        self
    }

    pub fn with_runtime_limit(mut self, limit: Duration) -> Self {
        self.runtime_limit = limit;
        self
    }

    pub fn with_time_limit_per_trial(mut self, secs: f64) -> Self {
        self.time_limit_per_trial_secs = secs;
        self
    }

    pub fn with_max_trial_num(mut self, n: usize) -> Self {
        self.max_trial_num = n;
        self
    }

    pub fn with_num_objectives(mut self, n: usize) -> Self {
        self.num_objectives = n;
        self.failed_perf = vec![DEFAULT_FAILED_PERF; n];
        self
    }

    pub fn with_failed_perf(mut self, failed_perf: Vec<f64>) -> Self {
        self.failed_perf = failed_perf;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Structural validation, run before any dispatch. Misconfiguration here
    /// is fatal; everything downstream is absorbed into the data model.
    pub fn validate(&self) -> Result<(), HtError> {
        if self.batch_size == 0 {
            return Err(HtError::Config("batch_size must be positive".into()));
        }
        if self.num_objectives == 0 {
            return Err(HtError::Config("num_objectives must be positive".into()));
        }
        if self.failed_perf.len() != self.num_objectives {
            return Err(HtError::Config(format!(
                "failed_perf has {} entries for {} objectives",
                self.failed_perf.len(),
                self.num_objectives
            )));
        }
        if self.runtime_limit.is_zero() {
            return Err(HtError::Config("runtime_limit must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_parses_known_values_only() {
        assert_eq!("sync".parse::<ParallelStrategy>().unwrap(), ParallelStrategy::Sync);
        assert_eq!("async".parse::<ParallelStrategy>().unwrap(), ParallelStrategy::Async);
        let err = "median".parse::<ParallelStrategy>().unwrap_err();
        assert!(matches!(err, HtError::Config(_)));
    }

    #[test]
    fn defaults_validate() {
        RunOptions::default().validate().unwrap();
    }

    #[test]
    fn failed_perf_must_match_objective_count() {
        let opts = RunOptions::default().with_failed_perf(vec![1e6, 1e6]);
        assert!(opts.validate().is_err());

        let opts = RunOptions::default()
            .with_num_objectives(2)
            .with_failed_perf(vec![1e6, 1e6]);
        opts.validate().unwrap();
    }

    #[test]
    fn zero_batch_is_rejected() {
        assert!(RunOptions::new(ParallelStrategy::Sync, 0).validate().is_err());
    }
}
