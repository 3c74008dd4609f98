//! Client facade: wires Connection, SubscriptionManager and MirrorRegistry
//! together and enforces the cross-component contracts none of them can
//! enforce alone.
//!
//! The load-bearing one: the mirror store for a key is registered BEFORE
//! the subscribe call goes out. Registering afterwards opens a window where
//! the server's initial snapshot arrives with no store to receive it and is
//! silently dropped as stale.

use std::sync::Arc;

use crossbeam::channel::{Receiver, Sender, unbounded};
use tracing::{debug, warn};

use crate::api::envelope::PushEnvelope;
use crate::config::Config;
use crate::conn::{Connection, ServerEvent, Transport};
use crate::core::{Issue, QuerySpec, SubKey};
use crate::sync::{MirrorRegistry, ReleaseHandle, SubscriptionManager};
use crate::{Error, Result};

/// Event name carrying push envelopes.
const EVENT_PUSH: &str = "push";

pub struct SyncClient {
    conn: Arc<Connection>,
    manager: SubscriptionManager,
    registry: MirrorRegistry,
    events: Receiver<ServerEvent>,
    notices: Receiver<ServerEvent>,
    notices_tx: Sender<ServerEvent>,
}

impl SyncClient {
    /// Open the session and assemble the sync stack.
    pub fn connect(transport: Box<dyn Transport>, config: &Config) -> Result<Self> {
        let (conn, events) = Connection::connect(transport, config).map_err(Error::from)?;
        let conn = Arc::new(conn);
        let (notices_tx, notices) = unbounded();
        Ok(Self {
            manager: SubscriptionManager::new(Arc::clone(&conn)),
            registry: MirrorRegistry::new(&config.limits),
            conn,
            events,
            notices,
            notices_tx,
        })
    }

    /// Open (or reuse) a live view: register the mirror, then subscribe.
    ///
    /// If the subscribe call fails and the key was not already tracked, the
    /// store registered here is torn down again so a failed first subscribe
    /// leaves nothing behind.
    pub fn subscribe_view(&self, key: &SubKey, spec: QuerySpec) -> Result<ReleaseHandle> {
        self.registry.register(key.clone(), spec.clone());

        match self.manager.subscribe_list(key, spec.clone()) {
            Ok(handle) => {
                self.registry.update_spec(key, spec);
                Ok(handle)
            }
            Err(e) => {
                if self.manager.status_of(key).is_none() {
                    self.registry.unregister(key);
                }
                Err(e.into())
            }
        }
    }

    /// Release the live view and destroy its mirror.
    ///
    /// Local state is gone regardless of the unsubscribe call's fate; the
    /// returned error only reports that the server may still hold the query.
    pub fn release_view(&self, key: &SubKey) -> Result<()> {
        let released = self.manager.release(key);
        self.registry.unregister(key);
        released.map_err(Error::from)
    }

    /// Drain inbound pushes and apply them to the mirrors, in arrival order.
    ///
    /// Returns the number of envelopes applied. Non-push events (workspace
    /// notices and the like) are parked on the notice queue.
    pub fn pump(&self) -> Result<usize> {
        self.conn.pump().map_err(Error::from)?;

        let mut applied = 0;
        while let Ok(event) = self.events.try_recv() {
            if event.name == EVENT_PUSH {
                match serde_json::from_value::<PushEnvelope>(event.data) {
                    Ok(envelope) => {
                        if self.registry.apply_push(&envelope) {
                            applied += 1;
                        }
                    }
                    Err(e) => warn!(error = %e, "dropping undecodable push envelope"),
                }
            } else {
                let _ = self.notices_tx.send(event);
            }
        }
        Ok(applied)
    }

    /// Restore the session after a drop, then re-establish every live query.
    pub fn recover(&self) -> Result<()> {
        self.conn.reconnect().map_err(Error::from)?;
        let failures = self.manager.resubscribe_all();
        for (key, error) in &failures {
            warn!(key = %key, error = %error, "subscription not restored");
        }
        debug!(
            restored = self.manager.active_keys().len() - failures.len(),
            failed = failures.len(),
            "session recovered"
        );
        Ok(())
    }

    /// Next out-of-band server notice, if one is queued.
    pub fn poll_notice(&self) -> Option<ServerEvent> {
        self.notices.try_recv().ok()
    }

    pub fn membership_size(&self, key: &SubKey) -> Option<usize> {
        self.registry.member_count(key)
    }

    pub fn snapshot_for(&self, key: &SubKey) -> Vec<Issue> {
        self.registry.snapshot_for(key)
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.conn
    }

    pub fn manager(&self) -> &SubscriptionManager {
        &self.manager
    }

    pub fn registry(&self) -> &MirrorRegistry {
        &self.registry
    }
}
