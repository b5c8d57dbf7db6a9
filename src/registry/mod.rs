//! Subscription Registry.
//!
//! Single point of truth for "what watches are currently open". Every open
//! watch is keyed by the deterministic topic key of its target; opening the
//! same topic again replaces the prior watch instead of stacking a
//! duplicate. Each watch gets one forwarding task that drains the store's
//! snapshot channel and invokes the caller's callback, so snapshots within
//! one topic are delivered in store emission order while distinct topics
//! run concurrently.
//!
//! Concurrency notes:
//! - `open` / `close` / `close_all` may race freely; the handle table mutex
//!   serializes them and cancellation is idempotent
//! - cancellation is cooperative: a callback already in flight completes

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::store::{RemoteStore, Snapshot, WatchCanceller, WatchStream, WatchTarget};
use crate::utils::SyncError;

/// Callback invoked for every snapshot, including the initial one. An `Err`
/// return is logged and the watch continues.
pub type SnapshotCallback = Arc<dyn Fn(Snapshot) -> Result<(), SyncError> + Send + Sync>;

/// Handle to one open watch. Cheap to clone; closing goes through the
/// registry so double-close stays a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    topic_key: String,
}

impl Subscription {
    pub fn topic_key(&self) -> &str {
        &self.topic_key
    }
}

struct OpenWatch {
    canceller: WatchCanceller,
}

pub struct SubscriptionRegistry {
    store: Arc<dyn RemoteStore>,
    handles: Arc<Mutex<HashMap<String, OpenWatch>>>,
}

impl SubscriptionRegistry {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            handles: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Begin watching `target`, invoking `on_change` on every emitted
    /// snapshot. If a watch for the same topic key is already open it is
    /// cancelled and replaced.
    pub fn open(
        &self,
        target: WatchTarget,
        on_change: SnapshotCallback,
    ) -> Result<Subscription, SyncError> {
        let topic_key = target.topic_key();
        let WatchStream {
            mut snapshots,
            canceller,
        } = self.store.watch(target)?;

        let task_key = topic_key.clone();
        tokio::spawn(async move {
            while let Some(snapshot) = snapshots.recv().await {
                if let Err(e) = on_change(snapshot) {
                    warn!("watch callback for {task_key} failed: {e}");
                }
            }
            debug!("watch {task_key} drained");
        });

        let mut handles = self.handles.lock().unwrap();
        if let Some(mut previous) = handles.insert(topic_key.clone(), OpenWatch { canceller }) {
            previous.canceller.cancel();
            debug!("replaced existing subscription for {topic_key}");
        }
        debug!("subscription opened for {topic_key}");

        Ok(Subscription { topic_key })
    }

    /// Cancel one subscription. Closing an already-closed handle is a no-op.
    pub fn close(&self, subscription: &Subscription) {
        let removed = self
            .handles
            .lock()
            .unwrap()
            .remove(&subscription.topic_key);
        match removed {
            Some(mut watch) => {
                watch.canceller.cancel();
                debug!("subscription closed for {}", subscription.topic_key);
            }
            None => debug!(
                "close on unknown subscription {}, ignoring",
                subscription.topic_key
            ),
        }
    }

    /// Cancel every open subscription and clear the table. Safe on an empty
    /// registry and safe to call twice.
    pub fn close_all(&self) {
        let drained: Vec<(String, OpenWatch)> =
            self.handles.lock().unwrap().drain().collect();
        let count = drained.len();
        for (topic_key, mut watch) in drained {
            watch.canceller.cancel();
            debug!("subscription closed for {topic_key}");
        }
        if count > 0 {
            debug!("closed {count} subscriptions");
        }
    }

    /// Whether a watch is currently open for this topic key.
    pub fn is_open(&self, topic_key: &str) -> bool {
        self.handles.lock().unwrap().contains_key(topic_key)
    }

    pub fn len(&self) -> usize {
        self.handles.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.lock().unwrap().is_empty()
    }
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("open", &self.len())
            .finish()
    }
}
