//! TCP transport: bridges the bounded queues onto newline-delimited JSON
//! frames, one socket per worker.
//!
//! The master listens; each accepted connection must open with a handshake
//! frame carrying the shared secret. Unauthenticated peers and malformed
//! frames are transport failures: logged and dropped at this boundary, never
//! surfaced as observations.

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use ht_types::{ChannelError, HtResult, Observation};

use crate::endpoint::{ChannelConfig, TrialAssignment};
use crate::messenger::WorkerMessenger;

/// How long a socket read blocks before the bridge re-checks its queues.
const READ_POLL: Duration = Duration::from_millis(50);
/// Nonblocking-accept back-off.
const ACCEPT_POLL: Duration = Duration::from_millis(25);
/// Budget for the authentication handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize, Deserialize)]
struct HandshakeRequest {
    auth_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct HandshakeReply {
    accepted: bool,
}

/// Listener-side state owned by a bound [`MasterMessenger`].
///
/// [`MasterMessenger`]: crate::messenger::MasterMessenger
pub(crate) struct MasterTransport {
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    peers: Arc<Mutex<Vec<SocketAddr>>>,
}

impl MasterTransport {
    pub(crate) fn start(
        config: &ChannelConfig,
        outbound_rx: Receiver<TrialAssignment>,
        inbound_tx: Sender<Observation>,
    ) -> HtResult<Self> {
        let addr = config.addr();
        let listener = TcpListener::bind(&addr).map_err(|source| ChannelError::Bind {
            addr: addr.clone(),
            source,
        })?;
        let local_addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let peers: Arc<Mutex<Vec<SocketAddr>>> = Arc::new(Mutex::new(Vec::new()));
        {
            let shutdown = Arc::clone(&shutdown);
            let peers = Arc::clone(&peers);
            let auth_key = config.auth_key.clone();
            thread::spawn(move || {
                accept_loop(listener, auth_key, outbound_rx, inbound_tx, shutdown, peers);
            });
        }

        debug!(%local_addr, "master channel listening");
        Ok(Self {
            local_addr,
            shutdown,
            peers,
        })
    }

    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub(crate) fn peer_count(&self) -> usize {
        self.peers.lock().len()
    }
}

impl Drop for MasterTransport {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

fn accept_loop(
    listener: TcpListener,
    auth_key: String,
    outbound_rx: Receiver<TrialAssignment>,
    inbound_tx: Sender<Observation>,
    shutdown: Arc<AtomicBool>,
    peers: Arc<Mutex<Vec<SocketAddr>>>,
) {
    while !shutdown.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer_addr)) => {
                let auth_key = auth_key.clone();
                let outbound_rx = outbound_rx.clone();
                let inbound_tx = inbound_tx.clone();
                let shutdown = Arc::clone(&shutdown);
                let peers = Arc::clone(&peers);
                thread::spawn(move || {
                    if let Err(e) = serve_worker(
                        stream, peer_addr, &auth_key, outbound_rx, inbound_tx, shutdown, &peers,
                    ) {
                        debug!(%peer_addr, "worker connection closed: {e}");
                    }
                    peers.lock().retain(|p| *p != peer_addr);
                });
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
            Err(e) => {
                warn!("accept failed: {e}");
                thread::sleep(ACCEPT_POLL);
            }
        }
    }
}

/// One authenticated worker connection: assignments flow out, observations
/// flow in. Returns when either side goes away or the master shuts down.
fn serve_worker(
    stream: TcpStream,
    peer_addr: SocketAddr,
    auth_key: &str,
    outbound_rx: Receiver<TrialAssignment>,
    inbound_tx: Sender<Observation>,
    shutdown: Arc<AtomicBool>,
    peers: &Mutex<Vec<SocketAddr>>,
) -> io::Result<()> {
    // Accepted sockets may inherit the listener's nonblocking mode.
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(READ_POLL))?;
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;

    // Authentication handshake, before anything else flows.
    let mut line = String::new();
    read_line_deadline(&mut reader, &mut line, Instant::now() + HANDSHAKE_TIMEOUT)?;
    let accepted = serde_json::from_str::<HandshakeRequest>(line.trim())
        .map(|req| req.auth_key == auth_key)
        .unwrap_or(false);
    write_frame(&mut writer, &HandshakeReply { accepted })?;
    if !accepted {
        warn!(%peer_addr, "rejected unauthenticated worker connection");
        return Ok(());
    }
    debug!(%peer_addr, "worker authenticated");
    peers.lock().push(peer_addr);

    line.clear();
    while !shutdown.load(Ordering::SeqCst) {
        // Drain staged assignments first so dispatch is never starved by a
        // quiet socket.
        match outbound_rx.try_recv() {
            Ok(assignment) => {
                write_frame(&mut writer, &assignment)?;
                continue;
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => break,
        }

        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                if !line.ends_with('\n') {
                    break; // EOF mid-frame
                }
                match serde_json::from_str::<Observation>(line.trim()) {
                    Ok(observation) => {
                        if inbound_tx.send(observation).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(%peer_addr, "dropping malformed frame: {e}"),
                }
                line.clear();
            }
            Err(e) if is_poll_timeout(&e) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Worker side: connect, authenticate, then bridge the socket onto a local
/// queue pair.
pub(crate) fn connect_worker(config: &ChannelConfig) -> HtResult<WorkerMessenger> {
    let addr = config.addr();
    let stream = TcpStream::connect(&addr).map_err(|source| ChannelError::Connect {
        addr: addr.clone(),
        source,
    })?;
    stream.set_read_timeout(Some(READ_POLL))?;
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;

    write_frame(
        &mut writer,
        &HandshakeRequest {
            auth_key: config.auth_key.clone(),
        },
    )
    .map_err(|_| ChannelError::Disconnected)?;

    let mut line = String::new();
    read_line_deadline(&mut reader, &mut line, Instant::now() + HANDSHAKE_TIMEOUT)
        .map_err(|_| ChannelError::Disconnected)?;
    let reply: HandshakeReply = serde_json::from_str(line.trim())
        .map_err(|_| ChannelError::Disconnected)?;
    if !reply.accepted {
        return Err(ChannelError::AuthRejected.into());
    }

    let (assignment_tx, assignment_rx) = bounded(config.outbound_capacity);
    let (result_tx, result_rx) = bounded(config.inbound_capacity);
    thread::spawn(move || {
        if let Err(e) = worker_bridge(reader, writer, assignment_tx, result_rx) {
            debug!("worker bridge closed: {e}");
        }
    });

    Ok(WorkerMessenger {
        assignment_rx,
        result_tx,
    })
}

fn worker_bridge(
    mut reader: BufReader<TcpStream>,
    mut writer: TcpStream,
    assignment_tx: Sender<TrialAssignment>,
    result_rx: Receiver<Observation>,
) -> io::Result<()> {
    let mut line = String::new();
    loop {
        match result_rx.try_recv() {
            Ok(observation) => {
                write_frame(&mut writer, &observation)?;
                continue;
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => break,
        }

        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                if !line.ends_with('\n') {
                    break;
                }
                match serde_json::from_str::<TrialAssignment>(line.trim()) {
                    Ok(assignment) => {
                        if assignment_tx.send(assignment).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("dropping malformed frame: {e}"),
                }
                line.clear();
            }
            Err(e) if is_poll_timeout(&e) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn write_frame<T: Serialize>(writer: &mut TcpStream, frame: &T) -> io::Result<()> {
    let mut line = serde_json::to_string(frame).map_err(io::Error::other)?;
    line.push('\n');
    writer.write_all(line.as_bytes())?;
    writer.flush()
}

/// Keep reading (the socket has a short read timeout) until a full line or
/// the deadline. Partial data accumulates in `line` across timeouts.
fn read_line_deadline(
    reader: &mut BufReader<TcpStream>,
    line: &mut String,
    deadline: Instant,
) -> io::Result<usize> {
    loop {
        match reader.read_line(line) {
            Ok(n) => return Ok(n),
            Err(e) if is_poll_timeout(&e) => {
                if Instant::now() >= deadline {
                    return Err(io::Error::new(io::ErrorKind::TimedOut, "handshake timeout"));
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
}

fn is_poll_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}
