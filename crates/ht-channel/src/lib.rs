//! # ht-channel
//!
//! Bounded, authenticated, FIFO transport connecting one optimization master
//! to any number of workers.
//!
//! The master stages [`TrialAssignment`]s on an outbound queue and drains
//! worker [`Observation`]s from an inbound queue; both queues are bounded at
//! `max(100, 3 * batch_size)` so the master can always keep a full batch
//! staged without queuing unboundedly. [`channel_pair`] wires the two halves
//! directly for in-process workers; [`MasterMessenger::bind`] /
//! [`WorkerMessenger::connect`] bridge the same halves over TCP with a
//! shared-secret handshake.
//!
//! [`Observation`]: ht_types::Observation

mod endpoint;
mod messenger;
mod tcp;

pub use endpoint::{queue_capacity, ChannelConfig, TrialAssignment, MIN_QUEUE_CAPACITY};
pub use messenger::{channel_pair, MasterMessenger, WorkerMessenger};
