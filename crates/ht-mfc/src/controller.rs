//! Bracket scheduling, incumbent merging, and artifact cleanup.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use tracing::{debug, info};

use ht_types::{Configuration, EvalEntry, HtError, HtResult, IncumbentTracker, TrialState};

/// The opaque budget-bounded bracket primitive.
///
/// Given a bracket identifier and the remaining budget slice, runs one
/// successive-halving iteration and returns the candidate configurations it
/// promoted together with their performances (lower is better). Rung
/// arithmetic is entirely the implementor's business.
pub trait BracketRunner {
    fn run_bracket(&mut self, bracket: usize, budget_secs: f64) -> (Vec<Configuration>, Vec<f64>);
}

/// Which half of the two-part pipeline this controller is optimizing.
///
/// The evaluation history is keyed by the composite
/// `(feature-engineering config, hyperparameter config)`; the half not
/// being optimized is pinned to the partner configuration carried here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineStage {
    Hyperparameter { fe_config: Option<Configuration> },
    FeatureEngineering { hpo_config: Option<Configuration> },
}

/// Composite history key: `(fe half, hpo half)`.
pub type EvalKey = (Option<Configuration>, Option<Configuration>);

impl PipelineStage {
    fn key_for(&self, candidate: &Configuration) -> EvalKey {
        match self {
            Self::Hyperparameter { fe_config } => (fe_config.clone(), Some(candidate.clone())),
            Self::FeatureEngineering { hpo_config } => (Some(candidate.clone()), hpo_config.clone()),
        }
    }
}

/// Best-effort removal of this run's temporary model artifacts.
///
/// Only meaningful when the external evaluator supports continued training
/// and keeps checkpoints under `model_dir`; files whose names contain
/// `tmp_{run_timestamp}` are deleted after each outer iteration. Every
/// failure here is swallowed: a missing or locked file must never abort the
/// controller.
#[derive(Debug, Clone)]
pub struct CleanupPolicy {
    pub enabled: bool,
    pub model_dir: PathBuf,
    pub run_timestamp: String,
}

impl CleanupPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            model_dir: PathBuf::new(),
            run_timestamp: String::new(),
        }
    }

    pub fn for_run(model_dir: impl Into<PathBuf>, run_timestamp: impl Into<String>) -> Self {
        Self {
            enabled: true,
            model_dir: model_dir.into(),
            run_timestamp: run_timestamp.into(),
        }
    }
}

/// Controller tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MfcOptions {
    /// Bracket calls attempted per outer `iterate` call.
    pub inner_iter_num_per_iter: usize,
    /// Maximum resource allocation `R` of the underlying bracket schedule.
    pub max_resource: usize,
    /// Halving factor `eta`.
    pub reduction_factor: usize,
}

impl Default for MfcOptions {
    fn default() -> Self {
        Self {
            inner_iter_num_per_iter: 5,
            max_resource: 27,
            reduction_factor: 3,
        }
    }
}

impl MfcOptions {
    fn validate(&self) -> HtResult<()> {
        if self.inner_iter_num_per_iter == 0 {
            return Err(HtError::Config(
                "inner_iter_num_per_iter must be positive".into(),
            ));
        }
        if self.reduction_factor < 2 {
            return Err(HtError::Config("reduction_factor must be at least 2".into()));
        }
        if self.max_resource == 0 {
            return Err(HtError::Config("max_resource must be positive".into()));
        }
        Ok(())
    }

    /// `s_max = floor(log_eta R)`, computed without going through floats.
    fn s_max(&self) -> usize {
        let mut s_max = 0;
        let mut power = 1usize;
        while power.saturating_mul(self.reduction_factor) <= self.max_resource {
            power *= self.reduction_factor;
            s_max += 1;
        }
        s_max
    }
}

/// What one outer iteration reported back to its driver. `incumbent_perf`
/// follows the coordinator's larger-is-better convention.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationOutcome {
    pub incumbent_perf: f64,
    pub iteration_cost_secs: f64,
    pub incumbent_config: Option<Configuration>,
}

/// Time-boxed driver of an opaque bracket algorithm.
pub struct MultiFidelityController<B: BracketRunner> {
    runner: B,
    options: MfcOptions,
    stage: PipelineStage,
    cleanup: CleanupPolicy,
    /// Fixed bracket sequence `s_max, s_max-1, …, 0` with an explicit
    /// round-robin cursor into it.
    brackets: Vec<usize>,
    cursor: usize,
    /// Candidates accumulated across all `iterate` calls, append-only.
    candidate_configs: Vec<Configuration>,
    candidate_perfs: Vec<f64>,
    tracker: IncumbentTracker<EvalKey>,
}

impl<B: BracketRunner> MultiFidelityController<B> {
    pub fn new(
        runner: B,
        stage: PipelineStage,
        cleanup: CleanupPolicy,
        options: MfcOptions,
    ) -> HtResult<Self> {
        options.validate()?;
        let s_max = options.s_max();
        let brackets: Vec<usize> = (0..=s_max).rev().collect();
        Ok(Self {
            runner,
            options,
            stage,
            cleanup,
            brackets,
            cursor: 0,
            candidate_configs: Vec::new(),
            candidate_perfs: Vec::new(),
            tracker: IncumbentTracker::new(),
        })
    }

    /// One outer iteration: run brackets while the budget slice lasts,
    /// clean up temp artifacts, refresh the incumbent from the accumulated
    /// candidates.
    ///
    /// The budget is measured from this call's own start time. A bracket
    /// call already in progress when the budget expires is never undone;
    /// bracket results, once returned, always land in the history.
    pub fn iterate(&mut self, budget_secs: f64) -> IterationOutcome {
        let start = Instant::now();

        for _ in 0..self.options.inner_iter_num_per_iter {
            let elapsed = start.elapsed().as_secs_f64();
            if elapsed >= budget_secs {
                debug!(elapsed, budget_secs, "mfc: budget exhausted, stopping early");
                break;
            }
            let budget_left = budget_secs - elapsed;
            let bracket = self.brackets[self.cursor];
            debug!(bracket, budget_left, "mfc: running bracket");
            let (configs, perfs) = self.runner.run_bracket(bracket, budget_left);
            debug_assert_eq!(configs.len(), perfs.len());
            self.candidate_configs.extend(configs);
            self.candidate_perfs.extend(perfs);
            self.cursor = (self.cursor + 1) % self.brackets.len();
        }

        self.cleanup_tmp_artifacts();

        if !self.candidate_perfs.is_empty() {
            let mut inc_idx = 0;
            for (idx, perf) in self.candidate_perfs.iter().enumerate() {
                if *perf < self.candidate_perfs[inc_idx] {
                    inc_idx = idx;
                }
            }

            for (config, perf) in self.candidate_configs.iter().zip(&self.candidate_perfs) {
                let state = if perf.is_finite() {
                    TrialState::Success
                } else {
                    TrialState::Failed
                };
                self.tracker.record(self.stage.key_for(config), -perf, state);
            }

            let best_perf = self.candidate_perfs[inc_idx];
            if self
                .tracker
                .consider(-best_perf, &self.candidate_configs[inc_idx])
            {
                info!(perf = -best_perf, "mfc: new incumbent");
            }
        }

        IterationOutcome {
            incumbent_perf: self.tracker.best_perf(),
            iteration_cost_secs: start.elapsed().as_secs_f64(),
            incumbent_config: self.tracker.best_config().cloned(),
        }
    }

    fn cleanup_tmp_artifacts(&self) {
        if !self.cleanup.enabled {
            return;
        }
        let pattern = format!("tmp_{}", self.cleanup.run_timestamp);
        let entries = match fs::read_dir(&self.cleanup.model_dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %self.cleanup.model_dir.display(), "mfc: cleanup skipped: {e}");
                return;
            }
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.contains(&pattern) {
                if let Err(e) = fs::remove_file(entry.path()) {
                    debug!(file = %entry.path().display(), "mfc: could not remove artifact: {e}");
                }
            }
        }
    }

    pub fn brackets(&self) -> &[usize] {
        &self.brackets
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn incumbent_perf(&self) -> f64 {
        self.tracker.best_perf()
    }

    pub fn incumbent_config(&self) -> Option<&Configuration> {
        self.tracker.best_config()
    }

    pub fn eval_entry(&self, key: &EvalKey) -> Option<&EvalEntry> {
        self.tracker.entry(key)
    }

    pub fn eval_count(&self) -> usize {
        self.tracker.len()
    }

    pub fn candidates(&self) -> (&[Configuration], &[f64]) {
        (&self.candidate_configs, &self.candidate_perfs)
    }
}
