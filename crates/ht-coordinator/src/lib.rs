//! # ht-coordinator
//!
//! The master loop of a distributed optimization run: dispatches
//! configuration-evaluation trials to workers through the message channel,
//! collects their observations under a synchronous lock-step or an
//! asynchronous pipelined discipline, and maintains the monotonically
//! improving incumbent under partial failures and a wall-clock budget.
//!
//! The worker-side counterpart, [`EvalWorker`], wraps an objective callback
//! and never lets an evaluation failure escape as anything but a failed
//! observation.

mod coordinator;
mod worker;

pub use coordinator::{Coordinator, RunSummary};
pub use worker::{EvalWorker, ObjectiveResult};
