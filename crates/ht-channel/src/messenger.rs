//! The two endpoint types of the channel, independent of transport.
//!
//! Both messengers sit on bounded crossbeam queues. The in-process
//! [`channel_pair`] connects them directly; the TCP transport (see
//! [`MasterMessenger::bind`]) bridges the same queues onto sockets.

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use std::net::SocketAddr;
use std::time::Duration;

use ht_types::{ChannelError, HtResult, Observation};

use crate::endpoint::{ChannelConfig, TrialAssignment};
use crate::tcp;

/// Master side of the channel: stage assignments, drain observations.
pub struct MasterMessenger {
    pub(crate) outbound_tx: Sender<TrialAssignment>,
    pub(crate) inbound_rx: Receiver<Observation>,
    pub(crate) transport: Option<tcp::MasterTransport>,
}

impl MasterMessenger {
    /// Start a TCP listener for this endpoint. Workers join with
    /// [`WorkerMessenger::connect`]; each connection is authenticated with
    /// the shared secret before any message flows.
    pub fn bind(config: &ChannelConfig) -> HtResult<Self> {
        let (outbound_tx, outbound_rx) = bounded(config.outbound_capacity);
        let (inbound_tx, inbound_rx) = bounded(config.inbound_capacity);
        let transport = tcp::MasterTransport::start(config, outbound_rx, inbound_tx)?;
        Ok(Self {
            outbound_tx,
            inbound_rx,
            transport: Some(transport),
        })
    }

    /// Enqueue one assignment for the worker pool, blocking once the
    /// outbound bound is reached.
    pub fn send(&self, assignment: TrialAssignment) -> HtResult<()> {
        self.outbound_tx
            .send(assignment)
            .map_err(|_| ChannelError::Disconnected.into())
    }

    /// The oldest pending observation, or `None` without blocking.
    pub fn try_receive(&self) -> Option<Observation> {
        match self.inbound_rx.try_recv() {
            Ok(observation) => Some(observation),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Actual bound address when running over TCP (useful with port 0).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.transport.as_ref().map(|t| t.local_addr())
    }

    /// Number of authenticated TCP workers currently attached. Always zero
    /// for an in-process pair.
    pub fn connected_peers(&self) -> usize {
        self.transport.as_ref().map_or(0, |t| t.peer_count())
    }
}

/// Worker side of the channel: take assignments, report observations.
///
/// Clones share the same queues, so several in-process workers can compete
/// for assignments from one master.
#[derive(Clone, Debug)]
pub struct WorkerMessenger {
    pub(crate) assignment_rx: Receiver<TrialAssignment>,
    pub(crate) result_tx: Sender<Observation>,
}

impl WorkerMessenger {
    /// Join a master over TCP, authenticating with the shared secret.
    pub fn connect(config: &ChannelConfig) -> HtResult<Self> {
        tcp::connect_worker(config)
    }

    /// Block until the next assignment arrives or the master goes away.
    pub fn recv_assignment(&self) -> HtResult<TrialAssignment> {
        self.assignment_rx
            .recv()
            .map_err(|_| ChannelError::Disconnected.into())
    }

    /// Bounded wait: `Ok(None)` on timeout, error only on disconnect.
    pub fn recv_assignment_timeout(&self, timeout: Duration) -> HtResult<Option<TrialAssignment>> {
        use crossbeam_channel::RecvTimeoutError;
        match self.assignment_rx.recv_timeout(timeout) {
            Ok(assignment) => Ok(Some(assignment)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(ChannelError::Disconnected.into()),
        }
    }

    pub fn try_recv_assignment(&self) -> Option<TrialAssignment> {
        self.assignment_rx.try_recv().ok()
    }

    /// Report one finished trial, blocking once the inbound bound is reached.
    pub fn send(&self, observation: Observation) -> HtResult<()> {
        self.result_tx
            .send(observation)
            .map_err(|_| ChannelError::Disconnected.into())
    }
}

/// Directly wire a master and a worker in the same process. Queue bounds
/// come from the config; the endpoint address and auth key are unused.
pub fn channel_pair(config: &ChannelConfig) -> (MasterMessenger, WorkerMessenger) {
    let (outbound_tx, assignment_rx) = bounded(config.outbound_capacity);
    let (result_tx, inbound_rx) = bounded(config.inbound_capacity);
    (
        MasterMessenger {
            outbound_tx,
            inbound_rx,
            transport: None,
        },
        WorkerMessenger {
            assignment_rx,
            result_tx,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ht_types::{Configuration, HtError, ParameterValue, TrialState, WorkerInfo};

    fn config() -> ChannelConfig {
        ChannelConfig::for_batch("127.0.0.1", 0, "secret", 2)
    }

    fn assignment(x: i64) -> TrialAssignment {
        TrialAssignment {
            config: Configuration::new(vec![("x".into(), ParameterValue::Int(x))]),
            time_limit_secs: 10.0,
        }
    }

    fn observation(x: i64) -> Observation {
        Observation {
            config: Configuration::new(vec![("x".into(), ParameterValue::Int(x))]),
            trial_state: TrialState::Success,
            constraints: Vec::new(),
            objectives: Some(vec![x as f64]),
            elapsed_secs: 0.1,
            worker_info: WorkerInfo::new("w0"),
            extra_info: serde_json::Value::Null,
        }
    }

    #[test]
    fn pair_preserves_fifo_order_per_direction() {
        let (master, worker) = channel_pair(&config());

        for x in 0..5 {
            master.send(assignment(x)).unwrap();
        }
        for x in 0..5 {
            let got = worker.try_recv_assignment().unwrap();
            assert_eq!(got, assignment(x));
        }

        for x in 0..3 {
            worker.send(observation(x)).unwrap();
        }
        for x in 0..3 {
            assert_eq!(master.try_receive().unwrap(), observation(x));
        }
    }

    #[test]
    fn empty_receive_is_none_not_blocking() {
        let (master, worker) = channel_pair(&config());
        assert!(master.try_receive().is_none());
        assert!(worker.try_recv_assignment().is_none());
    }

    #[test]
    fn dropped_master_surfaces_as_disconnect() {
        let (master, worker) = channel_pair(&config());
        drop(master);
        let err = worker.recv_assignment().unwrap_err();
        assert!(matches!(err, HtError::Channel(ChannelError::Disconnected)));
    }

    #[test]
    fn dropped_worker_fails_sends() {
        let (master, worker) = channel_pair(&config());
        drop(worker);
        let err = master.send(assignment(0)).unwrap_err();
        assert!(matches!(err, HtError::Channel(ChannelError::Disconnected)));
    }
}
