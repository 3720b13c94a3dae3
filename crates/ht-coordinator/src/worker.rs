//! Worker-side evaluation loop.
//!
//! An [`EvalWorker`] takes assignments off the channel, runs the objective
//! callback, and reports exactly one observation per assignment. There is
//! no stop message in the protocol; the loop exits when the master's end of
//! the channel goes away.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use tracing::{debug, info, warn};
use uuid::Uuid;

use ht_channel::WorkerMessenger;
use ht_types::{Configuration, Observation, TrialState, WorkerInfo};

/// What one objective evaluation produced. `objectives: None` (or any
/// non-finite value) marks the trial failed; the master substitutes its
/// failure sentinel downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectiveResult {
    pub objectives: Option<Vec<f64>>,
    pub constraints: Vec<f64>,
    pub extra: serde_json::Value,
}

impl ObjectiveResult {
    pub fn of(objectives: Vec<f64>) -> Self {
        Self {
            objectives: Some(objectives),
            constraints: Vec::new(),
            extra: serde_json::Value::Null,
        }
    }

    pub fn failed() -> Self {
        Self {
            objectives: None,
            constraints: Vec::new(),
            extra: serde_json::Value::Null,
        }
    }
}

/// Evaluation loop around an objective callback.
pub struct EvalWorker<F> {
    messenger: WorkerMessenger,
    info: WorkerInfo,
    objective: F,
}

impl<F> EvalWorker<F>
where
    F: FnMut(&Configuration, f64) -> ObjectiveResult,
{
    pub fn new(messenger: WorkerMessenger, objective: F) -> Self {
        Self::with_info(
            messenger,
            WorkerInfo::new(format!("worker-{}", Uuid::new_v4())),
            objective,
        )
    }

    pub fn with_info(messenger: WorkerMessenger, info: WorkerInfo, objective: F) -> Self {
        Self {
            messenger,
            info,
            objective,
        }
    }

    pub fn info(&self) -> &WorkerInfo {
        &self.info
    }

    /// Evaluate assignments until the master disconnects.
    pub fn run(&mut self) {
        info!(worker = %self.info, "worker: online");
        loop {
            let assignment = match self.messenger.recv_assignment() {
                Ok(assignment) => assignment,
                Err(_) => {
                    info!(worker = %self.info, "worker: master gone, exiting");
                    return;
                }
            };
            let observation = self.evaluate_one(assignment.config, assignment.time_limit_secs);
            if self.messenger.send(observation).is_err() {
                info!(worker = %self.info, "worker: master gone, exiting");
                return;
            }
        }
    }

    /// Run the objective for one configuration and build its observation.
    /// A panicking objective becomes a failed trial; an evaluation that
    /// overruns its advisory limit is reported as a timeout with no
    /// objectives.
    fn evaluate_one(&mut self, config: Configuration, time_limit_secs: f64) -> Observation {
        let started = Instant::now();
        let objective = &mut self.objective;
        let outcome = catch_unwind(AssertUnwindSafe(|| objective(&config, time_limit_secs)));
        let elapsed_secs = started.elapsed().as_secs_f64();

        match outcome {
            Ok(result) => {
                let failed = match &result.objectives {
                    None => true,
                    Some(objs) => objs.is_empty() || objs.iter().any(|v| !v.is_finite()),
                };
                let timed_out = elapsed_secs > time_limit_secs;
                let (trial_state, objectives) = if timed_out {
                    debug!(worker = %self.info, %config, "worker: trial overran its limit");
                    (TrialState::Timeout, None)
                } else if failed {
                    (TrialState::Failed, result.objectives)
                } else {
                    (TrialState::Success, result.objectives)
                };
                Observation {
                    config,
                    trial_state,
                    constraints: result.constraints,
                    objectives,
                    elapsed_secs,
                    worker_info: self.info.clone(),
                    extra_info: result.extra,
                }
            }
            Err(_) => {
                warn!(worker = %self.info, %config, "worker: objective panicked");
                Observation {
                    config,
                    trial_state: TrialState::Failed,
                    constraints: Vec::new(),
                    objectives: None,
                    elapsed_secs,
                    worker_info: self.info.clone(),
                    extra_info: serde_json::Value::Null,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ht_channel::{channel_pair, ChannelConfig, TrialAssignment};
    use ht_types::ParameterValue;
    use std::thread;
    use std::time::Duration;

    fn config(x: i64) -> Configuration {
        Configuration::new(vec![("x".into(), ParameterValue::Int(x))])
    }

    fn pair() -> (ht_channel::MasterMessenger, WorkerMessenger) {
        channel_pair(&ChannelConfig::new("", 0, ""))
    }

    fn wait_receive(master: &ht_channel::MasterMessenger) -> Observation {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(observation) = master.try_receive() {
                return observation;
            }
            assert!(Instant::now() < deadline, "no observation arrived");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn reports_success_with_elapsed_time() {
        let (master, worker_end) = pair();
        let handle = thread::spawn(move || {
            let mut worker = EvalWorker::with_info(
                worker_end,
                WorkerInfo::new("w0"),
                |_c: &Configuration, _t| ObjectiveResult::of(vec![0.25]),
            );
            worker.run();
        });

        master
            .send(TrialAssignment {
                config: config(1),
                time_limit_secs: 60.0,
            })
            .unwrap();
        let observation = wait_receive(&master);
        assert_eq!(observation.trial_state, TrialState::Success);
        assert_eq!(observation.objectives.as_deref(), Some(&[0.25][..]));
        assert_eq!(observation.worker_info, WorkerInfo::new("w0"));
        assert!(observation.elapsed_secs >= 0.0);

        drop(master);
        handle.join().unwrap();
    }

    #[test]
    fn panicking_objective_becomes_a_failed_observation() {
        let (master, worker_end) = pair();
        let handle = thread::spawn(move || {
            let mut worker = EvalWorker::with_info(
                worker_end,
                WorkerInfo::new("w0"),
                |_c: &Configuration, _t| panic!("model training exploded"),
            );
            worker.run();
        });

        master
            .send(TrialAssignment {
                config: config(1),
                time_limit_secs: 60.0,
            })
            .unwrap();
        let observation = wait_receive(&master);
        assert_eq!(observation.trial_state, TrialState::Failed);
        assert!(observation.objectives.is_none());

        drop(master);
        handle.join().unwrap();
    }

    #[test]
    fn overrunning_the_limit_is_reported_as_timeout() {
        let (master, worker_end) = pair();
        let handle = thread::spawn(move || {
            let mut worker = EvalWorker::with_info(
                worker_end,
                WorkerInfo::new("w0"),
                |_c: &Configuration, _t| {
                    thread::sleep(Duration::from_millis(30));
                    ObjectiveResult::of(vec![0.1])
                },
            );
            worker.run();
        });

        master
            .send(TrialAssignment {
                config: config(1),
                time_limit_secs: 0.001,
            })
            .unwrap();
        let observation = wait_receive(&master);
        assert_eq!(observation.trial_state, TrialState::Timeout);
        assert!(observation.objectives.is_none());

        drop(master);
        handle.join().unwrap();
    }

    #[test]
    fn non_finite_objectives_are_failures() {
        let (master, worker_end) = pair();
        let handle = thread::spawn(move || {
            let mut worker = EvalWorker::with_info(
                worker_end,
                WorkerInfo::new("w0"),
                |_c: &Configuration, _t| ObjectiveResult::of(vec![f64::NAN]),
            );
            worker.run();
        });

        master
            .send(TrialAssignment {
                config: config(1),
                time_limit_secs: 60.0,
            })
            .unwrap();
        let observation = wait_receive(&master);
        assert_eq!(observation.trial_state, TrialState::Failed);

        drop(master);
        handle.join().unwrap();
    }
}
