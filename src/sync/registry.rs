//! Mirror registry: owns every mirror store, routes envelopes, and fans a
//! change note out to watchers once per applied envelope.
//!
//! The registry is the sole mutator of store state. Routing and application
//! happen synchronously under one lock, so a reader never observes a store
//! between membership and entity updates.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use crossbeam::channel::{Receiver, Sender, unbounded};
use thiserror::Error;
use tracing::{debug, warn};

use crate::api::envelope::{EnvelopeKind, PushEnvelope};
use crate::config::Limits;
use crate::core::{Issue, QuerySpec, SubKey};
use crate::error::{Effect, Transience};

use super::mirror::MirrorStore;

/// One note per applied envelope, batched per envelope rather than per item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeNote {
    pub key: SubKey,
    pub kind: EnvelopeKind,
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RegistryError {
    #[error("watcher limit reached ({max_watchers})")]
    WatcherLimitReached { max_watchers: usize },

    #[error("registry lock poisoned")]
    LockPoisoned,
}

impl RegistryError {
    pub fn transience(&self) -> Transience {
        match self {
            RegistryError::WatcherLimitReached { .. } => Transience::Retryable,
            RegistryError::LockPoisoned => Transience::Permanent,
        }
    }

    pub fn effect(&self) -> Effect {
        Effect::None
    }
}

struct RegistryState {
    stores: HashMap<SubKey, MirrorStore>,
    next_watcher_id: u64,
    watchers: BTreeMap<u64, Sender<ChangeNote>>,
    max_watchers: usize,
}

pub struct MirrorRegistry {
    inner: Mutex<RegistryState>,
}

impl MirrorRegistry {
    pub fn new(limits: &Limits) -> Self {
        Self {
            inner: Mutex::new(RegistryState {
                stores: HashMap::new(),
                next_watcher_id: 1,
                watchers: BTreeMap::new(),
                max_watchers: limits.max_watchers,
            }),
        }
    }

    /// Create a store for `key` if absent. Idempotent: a second registration
    /// during rapid view toggling leaves the existing store untouched.
    pub fn register(&self, key: SubKey, spec: QuerySpec) {
        let mut state = self.lock_state();
        state
            .stores
            .entry(key.clone())
            .or_insert_with(|| MirrorStore::new(key, spec));
    }

    /// Refresh the spec recorded on an existing store, after a spec-change
    /// resubscription kept the store but replaced the live query behind it.
    /// No-op on an unknown key.
    pub fn update_spec(&self, key: &SubKey, spec: QuerySpec) {
        let mut state = self.lock_state();
        if let Some(store) = state.stores.get_mut(key) {
            store.set_spec(spec);
        }
    }

    /// Destroy the store for `key`. No-op on an unknown key.
    pub fn unregister(&self, key: &SubKey) {
        let mut state = self.lock_state();
        if state.stores.remove(key).is_some() {
            debug!(key = %key, "mirror unregistered");
        }
    }

    /// Route one envelope to its store and notify watchers exactly once.
    ///
    /// Returns false when the envelope was dropped: unknown key (the
    /// subscription was torn down between send and receipt - not an error)
    /// or malformed content (logged, nothing mutated).
    pub fn apply_push(&self, envelope: &PushEnvelope) -> bool {
        if let Err(e) = envelope.validate() {
            warn!(error = %e, "dropping malformed envelope");
            return false;
        }

        let mut state = self.lock_state();
        let Some(store) = state.stores.get_mut(&envelope.key) else {
            debug!(key = %envelope.key, "dropping envelope for unregistered key");
            return false;
        };
        store.apply(envelope);

        let note = ChangeNote {
            key: envelope.key.clone(),
            kind: envelope.kind,
        };
        let dead: Vec<u64> = state
            .watchers
            .iter()
            .filter(|(_, tx)| tx.send(note.clone()).is_err())
            .map(|(id, _)| *id)
            .collect();
        for id in dead {
            state.watchers.remove(&id);
        }

        true
    }

    /// Current membership of `key` as records, in membership order. Empty
    /// for unknown keys.
    pub fn snapshot_for(&self, key: &SubKey) -> Vec<Issue> {
        let state = self.lock_state();
        state
            .stores
            .get(key)
            .map(MirrorStore::snapshot)
            .unwrap_or_default()
    }

    pub fn member_count(&self, key: &SubKey) -> Option<usize> {
        let state = self.lock_state();
        state.stores.get(key).map(MirrorStore::len)
    }

    pub fn contains(&self, key: &SubKey) -> bool {
        self.lock_state().stores.contains_key(key)
    }

    pub fn spec_for(&self, key: &SubKey) -> Option<QuerySpec> {
        let state = self.lock_state();
        state.stores.get(key).map(|store| store.spec().clone())
    }

    pub fn keys(&self) -> Vec<SubKey> {
        self.lock_state().stores.keys().cloned().collect()
    }

    /// Subscribe to change notes. One note is delivered per applied
    /// envelope, so downstream re-render scheduling is O(1) per push.
    pub fn watch(&self) -> Result<Receiver<ChangeNote>, RegistryError> {
        let mut state = self.lock_state();
        if state.watchers.len() >= state.max_watchers {
            return Err(RegistryError::WatcherLimitReached {
                max_watchers: state.max_watchers,
            });
        }
        let (tx, rx) = unbounded();
        let id = state.next_watcher_id;
        state.next_watcher_id = state.next_watcher_id.saturating_add(1);
        state.watchers.insert(id, tx);
        Ok(rx)
    }

    // register/unregister/apply are infallible by contract; a poisoned
    // guard is recovered, every mutation completes before the lock drops.
    fn lock_state(&self) -> MutexGuard<'_, RegistryState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
