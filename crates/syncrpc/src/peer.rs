//! # Bridge Peer with Async Pump
//!
//! The `Peer` owns the transport to the remote side. Two tasks run on the
//! messenger runtime: a writer that drains an ordered outbound queue, and a
//! pump that demultiplexes incoming replies and routes them to pending calls
//! by sequence number.
//!
//! Calls can be made from async code (`call`) or from a plain thread that
//! must produce an answer before returning (`call_sync`). The blocking form
//! always has a deadline: a remote side that never answers costs the caller
//! at most `timeout`, never a hung thread.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::frame::Frame;
use crate::pending;
use crate::pending::ReplySlot;
use crate::pending::WaitError;
use crate::transport;
use crate::transport::Transport;

#[derive(Debug, Clone)]
pub enum Error {
    Transport(transport::Error),
    Codec(String),
    Timeout,
    ChannelClosed,
    ConnectionLost(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "Transport error: {}", e),
            Self::Codec(msg) => write!(f, "Codec error: {}", msg),
            Self::Timeout => write!(f, "Request timed out"),
            Self::ChannelClosed => write!(f, "Response channel closed"),
            Self::ConnectionLost(msg) => write!(f, "Connection lost: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<transport::Error> for Error {
    fn from(e: transport::Error) -> Self {
        Self::Transport(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Codec(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Whoever is waiting on a given sequence number.
enum Waiter {
    Blocking(ReplySlot<Result<Value>>),
    Async(oneshot::Sender<Result<Value>>),
}

impl Waiter {
    fn complete(self, result: Result<Value>) {
        // A waiter that already gave up just drops the value.
        match self {
            Self::Blocking(slot) => {
                slot.fulfill(result);
            }
            Self::Async(tx) => {
                let _ = tx.send(result);
            }
        }
    }
}

/// A message for the writer task. Calls carry their seq so a failed send
/// can be reported to the waiter instead of letting it run into its timeout.
struct Outbound {
    seq: Option<u64>,
    payload: Vec<u8>,
}

type Pending = DashMap<u64, Waiter>;

/// One connection to the remote side of the bridge.
pub struct Peer {
    name: String,
    runtime: Handle,
    outbound: mpsc::UnboundedSender<Outbound>,
    pending: Arc<Pending>,
    closed: Arc<AtomicBool>,
    seq_gen: AtomicU64,
    timeout: Duration,
    tasks: [JoinHandle<()>; 2],
}

impl Peer {
    /// Creates a new peer and spawns its writer and pump on `runtime`.
    ///
    /// Does not need to be called from inside the runtime.
    pub fn new(name: impl Into<String>, transport: Box<dyn Transport>, runtime: Handle) -> Self {
        let name = name.into();
        let transport: Arc<dyn Transport> = Arc::from(transport);
        let pending: Arc<Pending> = Arc::new(DashMap::new());
        let closed = Arc::new(AtomicBool::new(false));
        let (outbound, queue) = mpsc::unbounded_channel();

        let writer = runtime.spawn(Self::write_loop(
            name.clone(),
            transport.clone(),
            queue,
            pending.clone(),
        ));
        let pump = runtime.spawn(Self::pump_loop(
            name.clone(),
            transport,
            outbound.clone(),
            pending.clone(),
            closed.clone(),
        ));

        Self {
            name,
            runtime,
            outbound,
            pending,
            closed,
            seq_gen: AtomicU64::new(1),
            timeout: crate::DEFAULT_REPLY_TIMEOUT,
            tasks: [writer, pump],
        }
    }

    /// Sets the deadline used by `call`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The runtime that drives this peer.
    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    /// Whether the inbound stream has ended.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of calls still waiting for a reply.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    async fn write_loop(
        name: String,
        transport: Arc<dyn Transport>,
        mut queue: mpsc::UnboundedReceiver<Outbound>,
        pending: Arc<Pending>,
    ) {
        while let Some(msg) = queue.recv().await {
            if let Err(e) = transport.send(&msg.payload).await {
                match msg.seq {
                    Some(seq) => {
                        if let Some((_, waiter)) = pending.remove(&seq) {
                            waiter.complete(Err(Error::Transport(e)));
                        }
                    }
                    None => warn!(peer = %name, error = %e, "dropping outbound event"),
                }
            }
        }
    }

    async fn pump_loop(
        name: String,
        transport: Arc<dyn Transport>,
        outbound: mpsc::UnboundedSender<Outbound>,
        pending: Arc<Pending>,
        closed: Arc<AtomicBool>,
    ) {
        let reason = loop {
            match transport.recv().await {
                Ok(Some(msg)) => Self::handle_message(&name, &msg, &outbound, &pending),
                Ok(None) => break "Stream closed".to_string(),
                Err(e) => {
                    warn!(peer = %name, error = %e, "transport error in pump");
                    break e.to_string();
                }
            }
        };

        debug!(peer = %name, %reason, "pump stopped");
        closed.store(true, Ordering::SeqCst);
        Self::fail_all_pending(&pending, Error::ConnectionLost(reason));
    }

    fn fail_all_pending(pending: &Pending, error: Error) {
        let keys: Vec<u64> = pending.iter().map(|e| *e.key()).collect();
        for key in keys {
            if let Some((_, waiter)) = pending.remove(&key) {
                waiter.complete(Err(error.clone()));
            }
        }
    }

    /// Handles one inbound message. Malformed input is logged and skipped so a
    /// single bad frame cannot take the connection down.
    fn handle_message(
        name: &str,
        msg: &[u8],
        outbound: &mpsc::UnboundedSender<Outbound>,
        pending: &Pending,
    ) {
        let frame = match Frame::decode(msg) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(peer = %name, error = %e, "undecodable frame");
                return;
            }
        };

        match frame {
            Frame::Reply { seq, result } => match pending.remove(&seq) {
                Some((_, waiter)) => waiter.complete(Ok(result)),
                // Late reply to a call that already timed out.
                None => trace!(peer = %name, seq, "reply with no waiter"),
            },
            Frame::Call { seq, method, .. } => {
                // Nothing is served in this direction; answer so the remote
                // side does not wait on us.
                debug!(peer = %name, seq, %method, "unhandled inbound call");
                if let Ok(payload) = Frame::reply(seq, Value::Null).encode() {
                    let _ = outbound.send(Outbound { seq: None, payload });
                }
            }
            Frame::Event { method, .. } => {
                trace!(peer = %name, %method, "ignoring inbound event");
            }
        }
    }

    fn next_seq(&self) -> u64 {
        self.seq_gen.fetch_add(1, Ordering::Relaxed)
    }

    /// Registers a waiter and queues the call. Fails fast if the connection is
    /// already gone.
    fn dispatch(&self, seq: u64, method: &str, args: Value, waiter: Waiter) -> Result<()> {
        let payload = Frame::call(seq, method, args).encode()?;
        self.pending.insert(seq, waiter);

        // The pump marks the peer closed before draining, so either the drain
        // sees this entry or this check sees the flag.
        if self.is_closed() {
            self.pending.remove(&seq);
            return Err(Error::ConnectionLost("Stream closed".into()));
        }

        if self.outbound.send(Outbound { seq: Some(seq), payload }).is_err() {
            self.pending.remove(&seq);
            return Err(Error::ChannelClosed);
        }
        Ok(())
    }

    /// Calls `method` and blocks the current thread until the reply arrives
    /// or `timeout` elapses.
    ///
    /// Must not be called from a thread that drives the peer's runtime: the
    /// reply is delivered by a task on that runtime.
    pub fn call_sync(&self, method: &str, args: Value, timeout: Duration) -> Result<Value> {
        let seq = self.next_seq();
        let (slot, reply) = pending::channel();
        self.dispatch(seq, method, args, Waiter::Blocking(slot))?;
        trace!(peer = %self.name, seq, method, "blocking call issued");

        match reply.wait(timeout) {
            Ok(result) => result,
            Err(WaitError::Timeout) => {
                self.pending.remove(&seq);
                debug!(peer = %self.name, seq, method, ?timeout, "blocking call timed out");
                Err(Error::Timeout)
            }
            Err(WaitError::Abandoned) => {
                self.pending.remove(&seq);
                Err(Error::ChannelClosed)
            }
        }
    }

    /// Calls `method` and awaits the reply, bounded by the peer's timeout.
    pub async fn call(&self, method: &str, args: Value) -> Result<Value> {
        let seq = self.next_seq();
        let (tx, rx) = oneshot::channel();
        self.dispatch(seq, method, args, Waiter::Async(tx))?;

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                self.pending.remove(&seq);
                Err(Error::ChannelClosed)
            }
            Err(_) => {
                self.pending.remove(&seq);
                Err(Error::Timeout)
            }
        }
    }

    /// Sends a one-way event. Delivery failures are logged, not returned.
    ///
    /// Events and calls leave in the order they were issued.
    pub fn notify(&self, method: &str, args: Value) {
        let payload = match Frame::event(method, args).encode() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(peer = %self.name, method, error = %e, "cannot encode event");
                return;
            }
        };
        if self.outbound.send(Outbound { seq: None, payload }).is_err() {
            warn!(peer = %self.name, method, "writer gone, event dropped");
        }
    }
}

impl Drop for Peer {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("name", &self.name)
            .field("pending", &self.pending.len())
            .field("closed", &self.is_closed())
            .field("timeout", &self.timeout)
            .finish()
    }
}
