//! End-to-end local run: one asynchronous master and two in-process workers
//! minimizing a toy quadratic with the random advisor.
//!
//! Run with: `cargo run -p ht-coordinator --example local_run`

use std::thread;
use std::time::Duration;

use ht_channel::{channel_pair, ChannelConfig};
use ht_coordinator::{Coordinator, EvalWorker, ObjectiveResult};
use ht_types::{
    Configuration, ParallelStrategy, ParameterValue, RandomAdvisor, RunOptions, SearchSpace,
};

fn param(config: &Configuration, name: &str) -> f64 {
    match config.get(name) {
        Some(ParameterValue::Float(v)) => *v,
        _ => 0.0,
    }
}

fn objective(config: &Configuration, _time_limit_secs: f64) -> ObjectiveResult {
    let x = param(config, "x");
    let y = param(config, "y");
    ObjectiveResult::of(vec![(x - 0.3).powi(2) + (y + 0.1).powi(2)])
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let batch_size = 4;
    let space = SearchSpace::new().add_float("x", -1.0, 1.0).add_float("y", -1.0, 1.0);
    let advisor = RandomAdvisor::new(space, batch_size);

    let channel = ChannelConfig::for_batch("127.0.0.1", 0, "demo-secret", batch_size);
    let (master, worker_end) = channel_pair(&channel);

    let workers: Vec<_> = (0..2)
        .map(|_| {
            let messenger = worker_end.clone();
            thread::spawn(move || EvalWorker::new(messenger, objective).run())
        })
        .collect();
    drop(worker_end);

    let options = RunOptions::new(ParallelStrategy::Async, batch_size)
        .with_task_id("local-demo")
        .with_runtime_limit(Duration::from_secs(2))
        .with_poll_interval(Duration::from_millis(20))
        .with_max_trial_num(64);
    let mut coordinator = Coordinator::new(options, advisor, master)?;
    let summary = coordinator.run()?;

    println!(
        "best perf {:.5} at {} after {} trials on {} worker(s)",
        summary.incumbent_perf,
        summary
            .incumbent_config
            .map(|c| c.to_string())
            .unwrap_or_else(|| "<none>".into()),
        summary.observations_consumed,
        summary.workers.len(),
    );

    drop(coordinator);
    for worker in workers {
        worker.join().expect("worker thread panicked");
    }
    Ok(())
}
