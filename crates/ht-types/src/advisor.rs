//! The suggestion capability the coordinator drives.
//!
//! Surrogate models and acquisition optimizers live behind [`ConfigAdvisor`];
//! the coordinator only ever suggests, observes, and reads the running set.

use rand::Rng;
use std::collections::HashSet;

use crate::observation::Observation;
use crate::space::{Configuration, SearchSpace};

/// Stateful configuration suggester.
///
/// A configuration is "in flight" — a member of [`running_configs`] — from
/// the moment it is suggested until its [`Observation`] is delivered to
/// [`update_observation`]. Implementations must keep at most one in-flight
/// trial per configuration.
///
/// [`running_configs`]: ConfigAdvisor::running_configs
/// [`update_observation`]: ConfigAdvisor::update_observation
pub trait ConfigAdvisor {
    /// Produce one suggestion and mark it in flight.
    fn get_suggestion(&mut self) -> Configuration;

    /// Produce one full batch in a single call. Batch-aware advisors may use
    /// joint strategies here that differ from repeated single suggestions.
    fn get_suggestions(&mut self) -> Vec<Configuration>;

    /// Consume the result of a finished trial and retire it from the
    /// running set.
    fn update_observation(&mut self, observation: Observation);

    /// Configurations dispatched but not yet observed.
    fn running_configs(&self) -> &HashSet<Configuration>;

    /// The fallback configuration reported when no trial ever succeeds.
    fn default_configuration(&self) -> Configuration;
}

/// Uniform random suggestions over a [`SearchSpace`].
///
/// The baseline advisor: no posterior, no batch strategy beyond independent
/// samples. Doubles as the reference implementation of the in-flight
/// bookkeeping contract.
pub struct RandomAdvisor {
    space: SearchSpace,
    batch_size: usize,
    running: HashSet<Configuration>,
}

impl RandomAdvisor {
    pub fn new(space: SearchSpace, batch_size: usize) -> Self {
        Self {
            space,
            batch_size,
            running: HashSet::new(),
        }
    }

    fn sample_not_running(&self, rng: &mut impl Rng) -> Configuration {
        // Resample on collision so a configuration is never in flight twice.
        for _ in 0..64 {
            let config = self.space.sample(rng);
            if !self.running.contains(&config) {
                return config;
            }
        }
        self.space.sample(rng)
    }
}

impl ConfigAdvisor for RandomAdvisor {
    fn get_suggestion(&mut self) -> Configuration {
        let mut rng = rand::rng();
        let config = self.sample_not_running(&mut rng);
        self.running.insert(config.clone());
        config
    }

    fn get_suggestions(&mut self) -> Vec<Configuration> {
        (0..self.batch_size).map(|_| self.get_suggestion()).collect()
    }

    fn update_observation(&mut self, observation: Observation) {
        self.running.remove(&observation.config);
    }

    fn running_configs(&self) -> &HashSet<Configuration> {
        &self.running
    }

    fn default_configuration(&self) -> Configuration {
        self.space.default_configuration()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::{TrialState, WorkerInfo};

    fn advisor() -> RandomAdvisor {
        let space = SearchSpace::new()
            .add_float("lr", 0.0, 1.0)
            .add_int("depth", 1, 100);
        RandomAdvisor::new(space, 3)
    }

    fn observation_for(config: Configuration) -> Observation {
        Observation {
            config,
            trial_state: TrialState::Success,
            constraints: Vec::new(),
            objectives: Some(vec![0.1]),
            elapsed_secs: 0.0,
            worker_info: WorkerInfo::new("w"),
            extra_info: serde_json::Value::Null,
        }
    }

    #[test]
    fn suggestions_enter_and_leave_the_running_set() {
        let mut advisor = advisor();
        let config = advisor.get_suggestion();
        assert!(advisor.running_configs().contains(&config));
        assert_eq!(advisor.running_configs().len(), 1);

        advisor.update_observation(observation_for(config));
        assert!(advisor.running_configs().is_empty());
    }

    #[test]
    fn batch_suggestion_marks_all_members_in_flight() {
        let mut advisor = advisor();
        let batch = advisor.get_suggestions();
        assert_eq!(batch.len(), 3);
        assert_eq!(advisor.running_configs().len(), 3);
        for config in &batch {
            assert!(advisor.running_configs().contains(config));
        }
    }
}
