//! Store implementation backed by `sled`.
//!
//! One sled tree per collection, documents stored as JSON-encoded objects
//! under their id. A watcher table pushes a fresh snapshot to every watch
//! whose target covers a mutated document. This is the reference
//! implementation behind the `RemoteStore` trait; the test suite and the
//! demo binary run against it.
//!
//! Concurrency notes:
//! - the watcher table lock is held while snapshots are built and sent so
//!   that one watch never observes emissions out of store order; sends go
//!   over unbounded channels and cannot block
//! - a watch whose receiver has been dropped is pruned on the next send

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::document::{Document, DocumentData};
use super::query::{Query, WatchTarget};
use super::{RemoteStore, Snapshot, WatchCanceller, WatchStream};
use crate::utils::SyncError;

struct Watcher {
    target: WatchTarget,
    tx: mpsc::UnboundedSender<Snapshot>,
}

pub struct LocalStore {
    db: sled::Db,
    watchers: Arc<Mutex<HashMap<u64, Watcher>>>,
    next_watch_id: AtomicU64,
}

impl LocalStore {
    /// Open or create a sled database at `path`.
    pub fn open(path: &str) -> Result<Self, SyncError> {
        let db = sled::open(path)?;
        Ok(Self {
            db,
            watchers: Arc::new(Mutex::new(HashMap::new())),
            next_watch_id: AtomicU64::new(0),
        })
    }

    fn read(&self, collection: &str, id: &str) -> Result<Option<Document>, SyncError> {
        let tree = self.db.open_tree(collection)?;
        match tree.get(id.as_bytes())? {
            None => Ok(None),
            Some(bytes) => {
                let data: DocumentData = serde_json::from_slice(&bytes)?;
                Ok(Some(Document::new(id, data)))
            }
        }
    }

    fn write(&self, collection: &str, id: &str, data: DocumentData) -> Result<(), SyncError> {
        let tree = self.db.open_tree(collection)?;
        let bytes = serde_json::to_vec(&Value::Object(data))?;
        tree.insert(id.as_bytes(), bytes)?;
        Ok(())
    }

    fn run_query(&self, query: &Query) -> Result<Vec<Document>, SyncError> {
        let tree = self.db.open_tree(&query.collection)?;
        let mut matched = Vec::new();
        for entry in tree.iter() {
            let (key, value) = entry?;
            let id = String::from_utf8_lossy(&key).to_string();
            let data: DocumentData = match serde_json::from_slice(&value) {
                Ok(data) => data,
                Err(e) => {
                    warn!(
                        "skipping undecodable document {}/{id}: {e}",
                        query.collection
                    );
                    continue;
                }
            };
            if query.matches(&data) {
                matched.push(Document::new(id, data));
            }
        }
        matched.sort_by(|a, b| query.compare(&a.data, &b.data));
        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    fn snapshot_for(&self, target: &WatchTarget) -> Result<Snapshot, SyncError> {
        match target {
            WatchTarget::Document { collection, id } => {
                Ok(Snapshot::Document(self.read(collection, id)?))
            }
            WatchTarget::Query(query) => Ok(Snapshot::Batch(self.run_query(query)?)),
        }
    }

    /// Push a fresh snapshot to every watcher whose target covers the
    /// mutated document.
    fn notify(&self, collection: &str, id: &str) {
        let mut watchers = self.watchers.lock().unwrap();
        let mut dropped = Vec::new();
        for (watch_id, watcher) in watchers.iter() {
            let relevant = match &watcher.target {
                WatchTarget::Document {
                    collection: c,
                    id: i,
                } => c == collection && i == id,
                // Any mutation in the collection can change query membership
                WatchTarget::Query(query) => query.collection == collection,
            };
            if !relevant {
                continue;
            }
            let snapshot = match self.snapshot_for(&watcher.target) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!("failed to build snapshot for watch {watch_id}: {e}");
                    continue;
                }
            };
            if watcher.tx.send(snapshot).is_err() {
                dropped.push(*watch_id);
            }
        }
        for watch_id in dropped {
            watchers.remove(&watch_id);
            debug!("watch {watch_id} receiver gone, removed");
        }
    }
}

impl RemoteStore for LocalStore {
    fn get<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Document>, SyncError>> {
        Box::pin(async move { self.read(collection, id) })
    }

    fn set<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        data: DocumentData,
    ) -> BoxFuture<'a, Result<(), SyncError>> {
        Box::pin(async move {
            self.write(collection, id, data)?;
            self.notify(collection, id);
            Ok(())
        })
    }

    fn add<'a>(
        &'a self,
        collection: &'a str,
        data: DocumentData,
    ) -> BoxFuture<'a, Result<String, SyncError>> {
        Box::pin(async move {
            let id = Uuid::new_v4().to_string();
            self.write(collection, &id, data)?;
            self.notify(collection, &id);
            Ok(id)
        })
    }

    fn update<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        patch: DocumentData,
    ) -> BoxFuture<'a, Result<(), SyncError>> {
        Box::pin(async move {
            let mut document = self.read(collection, id)?.ok_or_else(|| SyncError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
            for (field, value) in patch {
                document.data.insert(field, value);
            }
            self.write(collection, id, document.data)?;
            self.notify(collection, id);
            Ok(())
        })
    }

    fn delete<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, Result<(), SyncError>> {
        Box::pin(async move {
            let tree = self.db.open_tree(collection)?;
            if tree.remove(id.as_bytes())?.is_some() {
                self.notify(collection, id);
            }
            Ok(())
        })
    }

    fn query<'a>(&'a self, query: &'a Query) -> BoxFuture<'a, Result<Vec<Document>, SyncError>> {
        Box::pin(async move { self.run_query(query) })
    }

    fn watch(&self, target: WatchTarget) -> Result<WatchStream, SyncError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let watch_id = self.next_watch_id.fetch_add(1, Ordering::Relaxed);

        // Hold the watcher lock across the initial read and the insert so no
        // mutation can slip between the initial snapshot and live delivery.
        let mut watchers = self.watchers.lock().unwrap();
        let initial = self.snapshot_for(&target)?;
        let _ = tx.send(initial);
        watchers.insert(watch_id, Watcher { target, tx });
        drop(watchers);

        let watchers = Arc::clone(&self.watchers);
        let canceller = WatchCanceller::new(move || {
            watchers.lock().unwrap().remove(&watch_id);
            debug!("watch {watch_id} cancelled");
        });
        debug!("watch {watch_id} opened");
        Ok(WatchStream {
            snapshots: rx,
            canceller,
        })
    }
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("db", &"sled::Db")
            .field("watchers", &self.watchers.lock().unwrap().len())
            .finish()
    }
}
