//! In-process workspace daemon speaking the UI wire protocol.
//!
//! The loopback transport hands each request line straight to the server
//! core on the caller's thread and reads replies from a queue, so tests are
//! deterministic without sockets. `hold_acks` keeps a subscribe in flight
//! to expose the pending window; `disconnect` simulates a dropped session.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};

use skein_client::conn::{Transport, TransportError, Wait};

pub struct ServerCore {
    inbound: Mutex<VecDeque<String>>,
    ops: Mutex<Vec<String>>,
    subs: Mutex<BTreeMap<String, Value>>,
    auto_snapshot: Mutex<HashMap<String, Value>>,
    held: Mutex<Vec<u64>>,
    hold_acks: AtomicBool,
    closed: AtomicBool,
    opens: AtomicU32,
}

#[derive(Clone)]
pub struct FakeServer {
    core: Arc<ServerCore>,
}

impl FakeServer {
    pub fn new() -> (Self, LoopbackTransport) {
        let core = Arc::new(ServerCore {
            inbound: Mutex::new(VecDeque::new()),
            ops: Mutex::new(Vec::new()),
            subs: Mutex::new(BTreeMap::new()),
            auto_snapshot: Mutex::new(HashMap::new()),
            held: Mutex::new(Vec::new()),
            hold_acks: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            opens: AtomicU32::new(0),
        });
        (
            Self {
                core: Arc::clone(&core),
            },
            LoopbackTransport { core },
        )
    }

    /// Ops received, in order.
    pub fn ops(&self) -> Vec<String> {
        self.core.ops.lock().unwrap().clone()
    }

    pub fn subscribe_count(&self) -> usize {
        self.ops().iter().filter(|op| op.as_str() == "subscribe").count()
    }

    /// The spec currently subscribed under `key`, if any.
    pub fn spec_for(&self, key: &str) -> Option<Value> {
        self.core.subs.lock().unwrap().get(key).cloned()
    }

    /// Queue a push envelope for the client.
    pub fn push(&self, envelope: Value) {
        self.queue_event("push", envelope);
    }

    pub fn push_snapshot(&self, key: &str, items: Value) {
        self.push(json!({"key": key, "kind": "snapshot", "items": items}));
    }

    pub fn push_upsert(&self, key: &str, items: Value) {
        self.push(json!({"key": key, "kind": "upsert", "items": items}));
    }

    pub fn push_delete(&self, key: &str, ids: Value) {
        self.push(json!({"key": key, "kind": "delete", "ids": ids}));
    }

    /// Queue an out-of-band notice.
    pub fn queue_event(&self, name: &str, data: Value) {
        let line = serde_json::to_string(&json!({"event": name, "data": data})).unwrap();
        self.core.inbound.lock().unwrap().push_back(line);
    }

    /// Answer every subscribe under `key` with this snapshot immediately
    /// after the ack, the way the real daemon seeds a fresh subscription.
    pub fn auto_snapshot(&self, key: &str, items: Value) {
        self.core
            .auto_snapshot
            .lock()
            .unwrap()
            .insert(key.to_string(), items);
    }

    /// Park subscribe acks until `release_held_acks`.
    pub fn hold_acks(&self, hold: bool) {
        self.core.hold_acks.store(hold, Ordering::SeqCst);
    }

    pub fn release_held_acks(&self) {
        let held: Vec<u64> = self.core.held.lock().unwrap().drain(..).collect();
        for seq in held {
            self.core.ack(seq);
        }
    }

    /// Kill the session. Queued-but-undelivered lines are gone with it.
    pub fn disconnect(&self) {
        self.core.closed.store(true, Ordering::SeqCst);
        self.core.inbound.lock().unwrap().clear();
    }

    pub fn open_count(&self) -> u32 {
        self.core.opens.load(Ordering::SeqCst)
    }
}

impl ServerCore {
    fn ack(&self, seq: u64) {
        self.inbound
            .lock()
            .unwrap()
            .push_back(format!(r#"{{"seq":{seq},"ok":{{}}}}"#));
    }

    fn handle_line(&self, line: &str) {
        let frame: Value = serde_json::from_str(line).expect("client sent valid json");
        let seq = frame["seq"].as_u64().expect("client frame has seq");
        let op = frame["op"].as_str().expect("client frame has op").to_string();
        self.ops.lock().unwrap().push(op.clone());

        match op.as_str() {
            "subscribe" => {
                let key = frame["params"]["key"].as_str().unwrap().to_string();
                self.subs
                    .lock()
                    .unwrap()
                    .insert(key.clone(), frame["params"]["spec"].clone());
                if self.hold_acks.load(Ordering::SeqCst) {
                    self.held.lock().unwrap().push(seq);
                } else {
                    self.ack(seq);
                    let seeded = self.auto_snapshot.lock().unwrap().get(&key).cloned();
                    if let Some(items) = seeded {
                        let line = serde_json::to_string(&json!({
                            "event": "push",
                            "data": {"key": key, "kind": "snapshot", "items": items},
                        }))
                        .unwrap();
                        self.inbound.lock().unwrap().push_back(line);
                    }
                }
            }
            "release" => {
                let key = frame["params"]["key"].as_str().unwrap().to_string();
                self.subs.lock().unwrap().remove(&key);
                self.ack(seq);
            }
            _ => self.ack(seq),
        }
    }
}

pub struct LoopbackTransport {
    core: Arc<ServerCore>,
}

impl Transport for LoopbackTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        self.core.opens.fetch_add(1, Ordering::SeqCst);
        self.core.closed.store(false, Ordering::SeqCst);
        self.core.inbound.lock().unwrap().clear();
        Ok(())
    }

    fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
        if self.core.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.core.handle_line(line);
        Ok(())
    }

    fn recv_line(&mut self, wait: Wait) -> Result<Option<String>, TransportError> {
        loop {
            if self.core.closed.load(Ordering::SeqCst) {
                return Err(TransportError::Closed);
            }
            if let Some(line) = self.core.inbound.lock().unwrap().pop_front() {
                return Ok(Some(line));
            }
            match wait {
                Wait::NonBlocking => return Ok(None),
                Wait::Blocking => std::thread::sleep(Duration::from_millis(1)),
            }
        }
    }

    fn shutdown(&mut self) {
        self.core.closed.store(true, Ordering::SeqCst);
    }
}
