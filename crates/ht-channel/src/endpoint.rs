//! Channel endpoint configuration and the master-to-worker message.

use serde::{Deserialize, Serialize};

use ht_types::Configuration;

/// Floor on either queue bound, independent of batch size.
pub const MIN_QUEUE_CAPACITY: usize = 100;

/// Queue bound for a given batch size: room for three staged batches, never
/// less than [`MIN_QUEUE_CAPACITY`].
pub fn queue_capacity(batch_size: usize) -> usize {
    MIN_QUEUE_CAPACITY.max(3 * batch_size)
}

/// Network endpoint and queue bounds for one master/worker channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub ip: String,
    pub port: u16,
    /// Shared secret checked at connection time. A peer presenting the wrong
    /// key is dropped before any message is exchanged.
    pub auth_key: String,
    pub outbound_capacity: usize,
    pub inbound_capacity: usize,
}

impl ChannelConfig {
    pub fn new(ip: impl Into<String>, port: u16, auth_key: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            port,
            auth_key: auth_key.into(),
            outbound_capacity: MIN_QUEUE_CAPACITY,
            inbound_capacity: MIN_QUEUE_CAPACITY,
        }
    }

    /// Size both directions for `batch_size`-wide dispatch.
    pub fn for_batch(
        ip: impl Into<String>,
        port: u16,
        auth_key: impl Into<String>,
        batch_size: usize,
    ) -> Self {
        let capacity = queue_capacity(batch_size);
        Self {
            outbound_capacity: capacity,
            inbound_capacity: capacity,
            ..Self::new(ip, port, auth_key)
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

/// One unit of work for a worker: the configuration to evaluate and the
/// advisory per-trial time limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialAssignment {
    pub config: Configuration,
    pub time_limit_secs: f64,
}
