//! Subscription lifecycle: an explicit state machine per key plus an
//! in-flight set, so the no-double-subscribe invariant is structural.
//!
//! A record is `pending` from the moment a subscribe call is initiated,
//! `active` once the server acknowledges, and dropped when released -
//! absence is the closed state. Duplicate subscribes for a pending key are
//! suppressed: equal specs join the in-flight attempt and share its release
//! handle, so rapid view switching costs one transport round-trip, not two
//! racing server-side subscriptions.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crossbeam::channel::{Sender, unbounded};
use thiserror::Error;
use tracing::{debug, warn};

use crate::api::mutate::send_request;
use crate::api::wire::Request;
use crate::conn::Connection;
use crate::core::{Fingerprint, QuerySpec, SubKey};
use crate::error::{Effect, Transience};

/// Subscription lifecycle errors.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum SubError {
    /// A subscribe for this key is already in flight with a different spec.
    #[error("subscribe already pending for `{key}`")]
    SubscribePending { key: SubKey },

    #[error("subscribe failed for `{key}`: {message}")]
    SubscribeFailed {
        key: SubKey,
        message: String,
        retryable: bool,
    },

    /// The unsubscribe call failed. Local bookkeeping was cleared anyway.
    #[error("release failed for `{key}`: {message}")]
    ReleaseFailed { key: SubKey, message: String },
}

impl SubError {
    pub fn transience(&self) -> Transience {
        match self {
            SubError::SubscribePending { .. } | SubError::ReleaseFailed { .. } => {
                Transience::Retryable
            }
            SubError::SubscribeFailed { retryable, .. } => {
                if *retryable {
                    Transience::Retryable
                } else {
                    Transience::Permanent
                }
            }
        }
    }

    pub fn effect(&self) -> Effect {
        match self {
            SubError::SubscribePending { .. } => Effect::None,
            // The server may or may not have registered/kept the subscription.
            SubError::SubscribeFailed { .. } | SubError::ReleaseFailed { .. } => Effect::Unknown,
        }
    }
}

/// Observable lifecycle states. Released records are dropped entirely.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubStatus {
    Pending,
    Active,
}

type SubResult = Result<ReleaseHandle, SubError>;

struct SubRecord {
    spec: QuerySpec,
    fingerprint: Fingerprint,
    status: SubStatus,
    release: Option<ReleaseHandle>,
    waiters: Vec<Sender<SubResult>>,
}

impl SubRecord {
    fn pending(spec: QuerySpec, fingerprint: Fingerprint) -> Self {
        Self {
            spec,
            fingerprint,
            status: SubStatus::Pending,
            release: None,
            waiters: Vec::new(),
        }
    }
}

struct ManagerInner {
    conn: Arc<Connection>,
    state: Mutex<HashMap<SubKey, SubRecord>>,
}

impl ManagerInner {
    // Transport round-trips never happen under this lock, only bookkeeping.
    fn lock_state(&self) -> MutexGuard<'_, HashMap<SubKey, SubRecord>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Maps caller-chosen subscription keys to server-side live queries.
#[derive(Clone)]
pub struct SubscriptionManager {
    inner: Arc<ManagerInner>,
}

enum Plan {
    Reuse(ReleaseHandle),
    Join(crossbeam::channel::Receiver<SubResult>),
    Replace(ReleaseHandle),
    Fresh,
}

impl SubscriptionManager {
    pub fn new(conn: Arc<Connection>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                conn,
                state: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Establish (or reuse) the live query for `key`.
    ///
    /// - active with an equal spec: returns the existing release handle,
    ///   no network traffic.
    /// - active with a different spec: full replacement - unsubscribe the
    ///   old query, then subscribe the new one, in that order.
    /// - pending with an equal spec: joins the in-flight attempt and
    ///   receives the same handle it produces.
    /// - pending with a different spec: suppressed with a recoverable error.
    ///
    /// The caller must have registered the mirror store for `key` before
    /// calling this; otherwise the initial snapshot races store creation.
    pub fn subscribe_list(&self, key: &SubKey, spec: QuerySpec) -> SubResult {
        let fingerprint = spec.fingerprint();

        let plan = {
            let mut state = self.inner.lock_state();
            match state.get_mut(key) {
                Some(rec) if rec.status == SubStatus::Active => {
                    let handle = rec
                        .release
                        .clone()
                        .expect("active record carries a release handle");
                    if rec.fingerprint == fingerprint {
                        Plan::Reuse(handle)
                    } else {
                        Plan::Replace(handle)
                    }
                }
                Some(rec) => {
                    if rec.fingerprint == fingerprint {
                        let (tx, rx) = unbounded();
                        rec.waiters.push(tx);
                        Plan::Join(rx)
                    } else {
                        return Err(SubError::SubscribePending { key: key.clone() });
                    }
                }
                None => {
                    state.insert(key.clone(), SubRecord::pending(spec.clone(), fingerprint));
                    Plan::Fresh
                }
            }
        };

        match plan {
            Plan::Reuse(handle) => {
                debug!(key = %key, "subscribe reused active record");
                Ok(handle)
            }
            Plan::Join(rx) => rx.recv().unwrap_or_else(|_| {
                Err(SubError::SubscribeFailed {
                    key: key.clone(),
                    message: "pending subscribe abandoned".into(),
                    retryable: true,
                })
            }),
            Plan::Replace(old) => {
                debug!(key = %key, "spec changed, replacing subscription");
                if let Err(e) = old.release() {
                    warn!(key = %key, error = %e, "release of replaced subscription failed");
                }
                {
                    let mut state = self.inner.lock_state();
                    if state.contains_key(key) {
                        return Err(SubError::SubscribePending { key: key.clone() });
                    }
                    state.insert(key.clone(), SubRecord::pending(spec.clone(), fingerprint));
                }
                self.finish_subscribe(key, spec)
            }
            Plan::Fresh => self.finish_subscribe(key, spec),
        }
    }

    /// Release the live query for `key`, if any.
    pub fn release(&self, key: &SubKey) -> Result<(), SubError> {
        let handle = {
            let state = self.inner.lock_state();
            state.get(key).and_then(|rec| rec.release.clone())
        };
        match handle {
            Some(handle) => handle.release(),
            None => Ok(()),
        }
    }

    /// Re-issue subscribe calls for every active record.
    ///
    /// After a reconnect every previously active subscription is
    /// presumptively stale server-side; the stores keep their data and the
    /// post-resubscribe snapshots replace it wholesale. Returns the keys
    /// that could not be re-established.
    pub fn resubscribe_all(&self) -> Vec<(SubKey, SubError)> {
        let active: Vec<(SubKey, QuerySpec)> = {
            let state = self.inner.lock_state();
            state
                .iter()
                .filter(|(_, rec)| rec.status == SubStatus::Active)
                .map(|(key, rec)| (key.clone(), rec.spec.clone()))
                .collect()
        };

        let mut failures = Vec::new();
        for (key, spec) in active {
            let request = Request::Subscribe {
                key: key.clone(),
                spec,
            };
            if let Err(e) = send_request(&self.inner.conn, &request) {
                warn!(key = %key, error = %e, "resubscribe failed");
                failures.push((
                    key.clone(),
                    SubError::SubscribeFailed {
                        key,
                        message: e.to_string(),
                        retryable: e.transience().is_retryable(),
                    },
                ));
            }
        }
        failures
    }

    pub fn status_of(&self, key: &SubKey) -> Option<SubStatus> {
        self.inner.lock_state().get(key).map(|rec| rec.status)
    }

    pub fn is_active(&self, key: &SubKey) -> bool {
        self.status_of(key) == Some(SubStatus::Active)
    }

    pub fn active_keys(&self) -> Vec<SubKey> {
        self.inner
            .lock_state()
            .iter()
            .filter(|(_, rec)| rec.status == SubStatus::Active)
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.lock_state().len()
    }

    fn finish_subscribe(&self, key: &SubKey, spec: QuerySpec) -> SubResult {
        let request = Request::Subscribe {
            key: key.clone(),
            spec,
        };
        let result = send_request(&self.inner.conn, &request);

        let mut state = self.inner.lock_state();
        match result {
            Ok(_ack) => {
                let handle = ReleaseHandle {
                    shared: Arc::new(ReleaseShared {
                        key: key.clone(),
                        manager: Arc::clone(&self.inner),
                        released: AtomicBool::new(false),
                    }),
                };
                let rec = state
                    .get_mut(key)
                    .expect("pending record exists until its attempt resolves");
                rec.status = SubStatus::Active;
                rec.release = Some(handle.clone());
                for waiter in rec.waiters.drain(..) {
                    let _ = waiter.send(Ok(handle.clone()));
                }
                Ok(handle)
            }
            Err(e) => {
                let sub_err = SubError::SubscribeFailed {
                    key: key.clone(),
                    message: e.to_string(),
                    retryable: e.transience().is_retryable(),
                };
                if let Some(rec) = state.remove(key) {
                    for waiter in rec.waiters {
                        let _ = waiter.send(Err(sub_err.clone()));
                    }
                }
                Err(sub_err)
            }
        }
    }

    #[cfg(test)]
    fn waiter_count(&self, key: &SubKey) -> usize {
        self.inner
            .lock_state()
            .get(key)
            .map(|rec| rec.waiters.len())
            .unwrap_or(0)
    }
}

struct ReleaseShared {
    key: SubKey,
    manager: Arc<ManagerInner>,
    released: AtomicBool,
}

/// Shared handle that tears one subscription down.
///
/// Clones refer to the same subscription; callers that raced into the same
/// subscribe receive clones of one handle.
#[derive(Clone)]
pub struct ReleaseHandle {
    shared: Arc<ReleaseShared>,
}

impl ReleaseHandle {
    pub fn key(&self) -> &SubKey {
        &self.shared.key
    }

    pub fn is_released(&self) -> bool {
        self.shared.released.load(Ordering::SeqCst)
    }

    /// Unsubscribe and drop local bookkeeping.
    ///
    /// Safe to call more than once (later calls are no-ops). Local state is
    /// cleared before the network call, so a failed unsubscribe never leaks
    /// UI-visible subscription state; the failure is reported only through
    /// the returned result.
    pub fn release(&self) -> Result<(), SubError> {
        if self.shared.released.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        {
            let mut state = self.shared.manager.lock_state();
            let owns_record = state
                .get(&self.shared.key)
                .and_then(|rec| rec.release.as_ref())
                .is_some_and(|current| Arc::ptr_eq(&current.shared, &self.shared));
            if owns_record {
                state.remove(&self.shared.key);
            }
        }

        let request = Request::Release {
            key: self.shared.key.clone(),
        };
        match send_request(&self.shared.manager.conn, &request) {
            Ok(_) => Ok(()),
            Err(e) => Err(SubError::ReleaseFailed {
                key: self.shared.key.clone(),
                message: e.to_string(),
            }),
        }
    }
}

impl PartialEq for ReleaseHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for ReleaseHandle {}

impl fmt::Debug for ReleaseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleaseHandle")
            .field("key", &self.shared.key)
            .field("released", &self.is_released())
            .finish()
    }
}
