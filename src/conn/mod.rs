//! Connection: one transport session, request/response calls multiplexed
//! with server-pushed events.
//!
//! Calls are synchronous round-trips; pushes that arrive while a call is
//! waiting for its reply land on the event queue in arrival order. The queue
//! is the single ordered source the envelope router drains, so routing and
//! mirror application never race.

pub mod transport;

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crossbeam::channel::{Receiver, Sender, unbounded};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::api::wire::{ServerFrame, decode_server_frame, encode_request};
use crate::config::{Config, ReconnectConfig};
use crate::error::{Effect, Transience};

pub use transport::{Transport, TransportError, UnixTransport, Wait};

/// Session state, observable for UI feedback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnState {
    Connecting,
    Open,
    Closed,
    Reconnecting,
}

impl ConnState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Reconnecting => "reconnecting",
        }
    }
}

/// One uncorrelated server push, as (event name, payload).
#[derive(Clone, Debug)]
pub struct ServerEvent {
    pub name: String,
    pub data: Value,
}

/// Connection-level errors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConnError {
    /// The policy for calls while disconnected: reject, never queue. Callers
    /// treat this as "no data yet" and retry after the next reconnect.
    #[error("not connected")]
    NotConnected,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server answered the call with an error payload.
    #[error("call failed: {code}: {message}")]
    Call {
        code: String,
        message: String,
        retryable: bool,
    },

    #[error("reconnect gave up after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    #[error("connection lock poisoned")]
    LockPoisoned,
}

impl ConnError {
    pub fn code(&self) -> &str {
        match self {
            ConnError::NotConnected => "not_connected",
            ConnError::Transport(_) => "transport",
            ConnError::Protocol(_) => "protocol",
            ConnError::Call { code, .. } => code,
            ConnError::ReconnectExhausted { .. } => "reconnect_exhausted",
            ConnError::LockPoisoned => "lock_poisoned",
        }
    }

    pub fn transience(&self) -> Transience {
        match self {
            ConnError::NotConnected
            | ConnError::Transport(_)
            | ConnError::ReconnectExhausted { .. } => Transience::Retryable,
            ConnError::Call { retryable, .. } => {
                if *retryable {
                    Transience::Retryable
                } else {
                    Transience::Permanent
                }
            }
            ConnError::Protocol(_) | ConnError::LockPoisoned => Transience::Permanent,
        }
    }

    pub fn effect(&self) -> Effect {
        match self {
            ConnError::NotConnected
            | ConnError::ReconnectExhausted { .. }
            | ConnError::Protocol(_) => Effect::None,
            ConnError::Transport(_) => Effect::Unknown,
            ConnError::Call { .. } => Effect::None,
            ConnError::LockPoisoned => Effect::Unknown,
        }
    }
}

struct Inner {
    transport: Box<dyn Transport>,
    state: ConnState,
    next_seq: u64,
    events_tx: Sender<ServerEvent>,
    reconnect: ReconnectConfig,
    max_frame_bytes: usize,
}

/// One bidirectional session to the workspace daemon.
pub struct Connection {
    inner: Mutex<Inner>,
    watchers: Mutex<Vec<Sender<ConnState>>>,
}

impl Connection {
    /// Open the session and hand back the inbound event queue.
    pub fn connect(
        transport: Box<dyn Transport>,
        config: &Config,
    ) -> Result<(Self, Receiver<ServerEvent>), ConnError> {
        let (events_tx, events_rx) = unbounded();
        let conn = Self {
            inner: Mutex::new(Inner {
                transport,
                state: ConnState::Connecting,
                next_seq: 1,
                events_tx,
                reconnect: config.reconnect.clone(),
                max_frame_bytes: config.limits.max_frame_bytes,
            }),
            watchers: Mutex::new(Vec::new()),
        };

        {
            let mut inner = conn.lock_inner()?;
            match inner.transport.open() {
                Ok(()) => conn.set_state(&mut inner, ConnState::Open),
                Err(e) => {
                    conn.set_state(&mut inner, ConnState::Closed);
                    return Err(e.into());
                }
            }
        }

        Ok((conn, events_rx))
    }

    /// One request/response round-trip.
    ///
    /// Pushes read while waiting for the reply are queued, never dropped.
    pub fn send(&self, op: &str, params: Value) -> Result<Value, ConnError> {
        let mut inner = self.lock_inner()?;
        if inner.state != ConnState::Open {
            return Err(ConnError::NotConnected);
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;

        let line = encode_request(seq, op, &params).map_err(|e| ConnError::Protocol(e.to_string()))?;
        if let Err(e) = inner.transport.send_line(&line) {
            self.mark_broken(&mut inner);
            return Err(e.into());
        }

        loop {
            let line = match inner.transport.recv_line(Wait::Blocking) {
                Ok(Some(line)) => line,
                Ok(None) => continue,
                Err(e) => {
                    self.mark_broken(&mut inner);
                    return Err(e.into());
                }
            };

            match self.decode(&inner, &line) {
                Some(ServerFrame::Event(event)) => {
                    let _ = inner.events_tx.send(ServerEvent {
                        name: event.event,
                        data: event.data,
                    });
                }
                Some(ServerFrame::Reply(reply)) if reply.seq == seq => {
                    if let Some(err) = reply.err {
                        return Err(ConnError::Call {
                            code: err.code,
                            message: err.message,
                            retryable: err.retryable,
                        });
                    }
                    return Ok(reply.ok.unwrap_or(Value::Null));
                }
                Some(ServerFrame::Reply(reply)) => {
                    warn!(seq = reply.seq, "dropping stray reply");
                }
                None => {}
            }
        }
    }

    /// Drain inbound pushes without blocking. Returns the number queued.
    pub fn pump(&self) -> Result<usize, ConnError> {
        let mut inner = self.lock_inner()?;
        if inner.state != ConnState::Open {
            return Ok(0);
        }

        let mut queued = 0;
        loop {
            match inner.transport.recv_line(Wait::NonBlocking) {
                Ok(Some(line)) => match self.decode(&inner, &line) {
                    Some(ServerFrame::Event(event)) => {
                        let _ = inner.events_tx.send(ServerEvent {
                            name: event.event,
                            data: event.data,
                        });
                        queued += 1;
                    }
                    Some(ServerFrame::Reply(reply)) => {
                        warn!(seq = reply.seq, "dropping stray reply");
                    }
                    None => {}
                },
                Ok(None) => return Ok(queued),
                Err(e) => {
                    self.mark_broken(&mut inner);
                    return Err(e.into());
                }
            }
        }
    }

    /// Re-establish the session with exponential backoff.
    ///
    /// This restores the transport only; the subscription manager owns
    /// re-establishing live queries afterwards.
    pub fn reconnect(&self) -> Result<(), ConnError> {
        let mut inner = self.lock_inner()?;
        if inner.state == ConnState::Open {
            return Ok(());
        }
        self.set_state(&mut inner, ConnState::Reconnecting);

        let cfg = inner.reconnect.clone();
        let mut delay = Duration::from_millis(cfg.backoff_base_ms.max(1));
        for attempt in 1..=cfg.max_attempts.max(1) {
            match inner.transport.open() {
                Ok(()) => {
                    self.set_state(&mut inner, ConnState::Open);
                    return Ok(());
                }
                Err(e) => {
                    debug!(attempt, error = %e, "reconnect attempt failed");
                    if attempt == cfg.max_attempts.max(1) {
                        break;
                    }
                    std::thread::sleep(jittered(delay));
                    delay = (delay * 2).min(Duration::from_millis(cfg.backoff_max_ms.max(1)));
                }
            }
        }

        self.set_state(&mut inner, ConnState::Closed);
        Err(ConnError::ReconnectExhausted {
            attempts: cfg.max_attempts.max(1),
        })
    }

    /// Tear the session down for good.
    pub fn close(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.transport.shutdown();
            self.set_state(&mut inner, ConnState::Closed);
        }
    }

    pub fn state(&self) -> ConnState {
        self.inner
            .lock()
            .map(|inner| inner.state)
            .unwrap_or(ConnState::Closed)
    }

    /// Feed of state transitions for UI feedback.
    pub fn watch_state(&self) -> Receiver<ConnState> {
        let (tx, rx) = unbounded();
        if let Ok(mut watchers) = self.watchers.lock() {
            watchers.push(tx);
        }
        rx
    }

    fn decode(&self, inner: &Inner, line: &str) -> Option<ServerFrame> {
        if line.len() > inner.max_frame_bytes {
            warn!(bytes = line.len(), "dropping oversized frame");
            return None;
        }
        match decode_server_frame(line) {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!(error = %e, "dropping undecodable frame");
                None
            }
        }
    }

    fn mark_broken(&self, inner: &mut Inner) {
        self.set_state(inner, ConnState::Reconnecting);
    }

    fn set_state(&self, inner: &mut Inner, next: ConnState) {
        if inner.state == next {
            return;
        }
        inner.state = next;
        if let Ok(mut watchers) = self.watchers.lock() {
            watchers.retain(|tx| tx.send(next).is_ok());
        }
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, Inner>, ConnError> {
        self.inner.lock().map_err(|_| ConnError::LockPoisoned)
    }
}

fn jittered(delay: Duration) -> Duration {
    use rand::Rng;

    let quarter = (delay.as_millis() as u64 / 4).max(1);
    let jitter = rand::rng().random_range(0..=quarter);
    delay + Duration::from_millis(jitter)
}

// =============================================================================
// Test transport
// =============================================================================

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    use super::transport::{Transport, TransportError, Wait};

    /// Shared handles into a `ScriptedTransport` after it moves into a
    /// `Connection`.
    #[derive(Clone)]
    pub(crate) struct ScriptHandle {
        pub sent: Arc<Mutex<Vec<String>>>,
        pub inbound: Arc<Mutex<VecDeque<String>>>,
        pub open_results: Arc<Mutex<VecDeque<Result<(), TransportError>>>>,
        pub open_calls: Arc<AtomicU32>,
    }

    impl ScriptHandle {
        pub fn push_line(&self, line: impl Into<String>) {
            self.inbound.lock().unwrap().push_back(line.into());
        }

        pub fn sent_lines(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }

        pub fn sent_ops(&self) -> Vec<String> {
            self.sent_lines()
                .iter()
                .map(|line| {
                    let v: serde_json::Value = serde_json::from_str(line).unwrap();
                    v["op"].as_str().unwrap().to_string()
                })
                .collect()
        }

        pub fn fail_next_opens(&self, n: usize) {
            let mut opens = self.open_results.lock().unwrap();
            for _ in 0..n {
                opens.push_back(Err(TransportError::Closed));
            }
        }
    }

    /// In-process transport driven entirely by the test.
    pub(crate) struct ScriptedTransport {
        handle: ScriptHandle,
        /// Reply `{"seq":N,"ok":{}}` to every request automatically.
        auto_ack: bool,
        /// Blocking recv waits for a scripted line instead of failing.
        block_on_empty: bool,
    }

    impl ScriptedTransport {
        pub fn new(auto_ack: bool) -> (Self, ScriptHandle) {
            let handle = ScriptHandle {
                sent: Arc::new(Mutex::new(Vec::new())),
                inbound: Arc::new(Mutex::new(VecDeque::new())),
                open_results: Arc::new(Mutex::new(VecDeque::new())),
                open_calls: Arc::new(AtomicU32::new(0)),
            };
            (
                Self {
                    handle: handle.clone(),
                    auto_ack,
                    block_on_empty: false,
                },
                handle,
            )
        }

        /// Make blocking receives park until the test scripts a line. Lets a
        /// test hold a call open mid-round-trip.
        pub fn block_on_empty(&mut self) {
            self.block_on_empty = true;
        }
    }

    impl Transport for ScriptedTransport {
        fn open(&mut self) -> Result<(), TransportError> {
            self.handle.open_calls.fetch_add(1, Ordering::SeqCst);
            self.handle
                .open_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(()))
        }

        fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
            self.handle.sent.lock().unwrap().push(line.to_string());
            if self.auto_ack {
                let v: serde_json::Value = serde_json::from_str(line).unwrap();
                let seq = v["seq"].as_u64().unwrap();
                self.handle
                    .inbound
                    .lock()
                    .unwrap()
                    .push_back(format!(r#"{{"seq":{seq},"ok":{{}}}}"#));
            }
            Ok(())
        }

        fn recv_line(&mut self, wait: Wait) -> Result<Option<String>, TransportError> {
            loop {
                let popped = self.handle.inbound.lock().unwrap().pop_front();
                match (popped, wait) {
                    (Some(line), _) => return Ok(Some(line)),
                    (None, Wait::NonBlocking) => return Ok(None),
                    (None, Wait::Blocking) if self.block_on_empty => {
                        std::thread::sleep(std::time::Duration::from_millis(1));
                    }
                    (None, Wait::Blocking) => return Err(TransportError::Closed),
                }
            }
        }

        fn shutdown(&mut self) {}
    }
}
