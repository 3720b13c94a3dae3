//! The master scheduling loop.
//!
//! One coordinator drives one run on a single logical thread: it suggests
//! trials through the advisor, stages them on the message channel, drains
//! worker observations, and funnels every result through the incumbent
//! tracker and back into the advisor. Both disciplines terminate solely on
//! wall-clock expiry; workers are shut down by their own channel
//! disconnect, never by a stop message.

use std::thread;
use std::time::Instant;

use tracing::{debug, info, warn};

use ht_channel::{MasterMessenger, TrialAssignment};
use ht_types::{
    ConfigAdvisor, Configuration, EvalEntry, HtResult, IncumbentTracker, Observation,
    ParallelStrategy, RunOptions, WorkerInfo,
};

/// Final report of one coordinated run.
///
/// Returned even when zero trials succeeded; the incumbent then is the
/// advisor's default configuration at performance negative infinity.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub task_id: String,
    pub incumbent_perf: f64,
    pub incumbent_config: Option<Configuration>,
    pub trials_dispatched: usize,
    pub observations_consumed: usize,
    pub batches_completed: usize,
    pub workers: Vec<WorkerInfo>,
}

/// Drives one of the two scheduling loops against a wall-clock budget.
pub struct Coordinator<A: ConfigAdvisor> {
    options: RunOptions,
    advisor: A,
    messenger: MasterMessenger,
    start_time: Instant,
    tracker: IncumbentTracker<Configuration>,
    /// Append-only parallel histories, one entry per consumed observation.
    configs: Vec<Configuration>,
    perfs: Vec<f64>,
    /// Worker registry: insertion order is discovery order, no duplicates.
    workers: Vec<WorkerInfo>,
    dispatched: usize,
    collected: usize,
    batch_id: usize,
}

impl<A: ConfigAdvisor> Coordinator<A> {
    /// Validates the run options up front: structural misconfiguration is
    /// fatal here, before any trial is dispatched.
    pub fn new(options: RunOptions, advisor: A, messenger: MasterMessenger) -> HtResult<Self> {
        options.validate()?;
        let tracker = IncumbentTracker::with_default(advisor.default_configuration());
        Ok(Self {
            options,
            advisor,
            messenger,
            start_time: Instant::now(),
            tracker,
            configs: Vec::new(),
            perfs: Vec::new(),
            workers: Vec::new(),
            dispatched: 0,
            collected: 0,
            batch_id: 0,
        })
    }

    /// Run the configured discipline until `runtime_limit` expires and
    /// report the best incumbent found.
    pub fn run(&mut self) -> HtResult<RunSummary> {
        self.start_time = Instant::now();
        info!(
            task_id = %self.options.task_id,
            strategy = %self.options.parallel_strategy,
            batch_size = self.options.batch_size,
            "master: starting run"
        );
        match self.options.parallel_strategy {
            ParallelStrategy::Async => self.async_run()?,
            ParallelStrategy::Sync => self.sync_run()?,
        }
        info!(
            task_id = %self.options.task_id,
            incumbent_perf = self.tracker.best_perf(),
            trials = self.collected,
            "master: run finished"
        );
        Ok(self.summary())
    }

    /// Pipelined discipline: dispatch and collection interleave on every
    /// outer iteration so at most `batch_size` trials are ever outstanding.
    fn async_run(&mut self) -> HtResult<()> {
        while self.start_time.elapsed() < self.options.runtime_limit {
            // Top up the pipeline.
            while self.advisor.running_configs().len() < self.options.batch_size
                && self.dispatched < self.options.max_trial_num
            {
                let config = self.advisor.get_suggestion();
                self.dispatched += 1;
                info!(trial = self.dispatched, "master: staging trial");
                self.dispatch(config)?;
            }

            // Drain whatever has arrived; on empty, back off once and go
            // back to dispatching.
            loop {
                match self.messenger.try_receive() {
                    None => {
                        thread::sleep(self.options.poll_interval);
                        break;
                    }
                    Some(observation) => self.consume(observation),
                }
            }
        }
        Ok(())
    }

    /// Lock-step discipline: one advisor batch per round, and a hard
    /// barrier — the round only closes once every member is retired,
    /// regardless of arrival order.
    fn sync_run(&mut self) -> HtResult<()> {
        while self.start_time.elapsed() < self.options.runtime_limit {
            let batch = self.advisor.get_suggestions();
            if batch.is_empty() {
                thread::sleep(self.options.poll_interval);
                continue;
            }
            let result_needed = batch.len();
            for config in batch {
                self.dispatched += 1;
                self.dispatch(config)?;
            }
            info!(
                batch = self.batch_id,
                sent = result_needed,
                "master: batch dispatched"
            );

            let mut result_num = 0;
            while result_num < result_needed {
                match self.messenger.try_receive() {
                    None => thread::sleep(self.options.poll_interval),
                    Some(observation) => {
                        self.consume(observation);
                        result_num += 1;
                        debug!(
                            batch = self.batch_id,
                            received = result_num,
                            needed = result_needed,
                            "master: round progress"
                        );
                    }
                }
            }
            self.batch_id += 1;
        }
        Ok(())
    }

    fn dispatch(&mut self, config: Configuration) -> HtResult<()> {
        self.messenger.send(TrialAssignment {
            config,
            time_limit_secs: self.options.time_limit_per_trial_secs,
        })
    }

    /// Consume one observation: register the worker, append history, update
    /// the incumbent, substitute the failure sentinel if needed, and hand
    /// the result to the advisor — exactly once per dispatched trial.
    fn consume(&mut self, observation: Observation) {
        self.collected += 1;

        if !self.workers.contains(&observation.worker_info) {
            info!(worker = %observation.worker_info, "master: registered worker");
            self.workers.push(observation.worker_info.clone());
        }

        let failed = observation.is_failed();
        let perf = if failed {
            f64::INFINITY
        } else {
            observation.objectives.as_ref().map_or(f64::INFINITY, |o| o[0])
        };

        let forwarded = if failed {
            warn!(config = %observation.config, "master: trial failed, substituting sentinel");
            observation.with_failed_perf(&self.options.failed_perf)
        } else {
            observation
        };

        self.configs.push(forwarded.config.clone());
        self.perfs.push(perf);
        self.tracker
            .record(forwarded.config.clone(), -perf, forwarded.trial_state);
        if self.tracker.consider(-perf, &forwarded.config) {
            info!(
                perf = -perf,
                config = %forwarded.config,
                "master: new incumbent"
            );
        }

        self.advisor.update_observation(forwarded);
        debug!(n = self.collected, "master: observation consumed");
    }

    fn summary(&self) -> RunSummary {
        RunSummary {
            task_id: self.options.task_id.clone(),
            incumbent_perf: self.tracker.best_perf(),
            incumbent_config: self.tracker.best_config().cloned(),
            trials_dispatched: self.dispatched,
            observations_consumed: self.collected,
            batches_completed: self.batch_id,
            workers: self.workers.clone(),
        }
    }

    pub fn advisor(&self) -> &A {
        &self.advisor
    }

    pub fn incumbent_perf(&self) -> f64 {
        self.tracker.best_perf()
    }

    pub fn incumbent_config(&self) -> Option<&Configuration> {
        self.tracker.best_config()
    }

    pub fn eval_entry(&self, config: &Configuration) -> Option<&EvalEntry> {
        self.tracker.entry(config)
    }

    pub fn eval_count(&self) -> usize {
        self.tracker.len()
    }

    pub fn history(&self) -> (&[Configuration], &[f64]) {
        (&self.configs, &self.perfs)
    }

    pub fn workers(&self) -> &[WorkerInfo] {
        &self.workers
    }
}
