//! Remote document store contract.
//!
//! The sync core does not talk to any particular backend; it depends on the
//! `RemoteStore` trait: point reads/writes, filtered queries, and a *watch*
//! primitive that streams an initial snapshot plus every subsequent change
//! until cancelled. `LocalStore` is the sled-backed reference implementation
//! used by the test suite and the demo binary; a deployment binds its own.

pub mod document;
pub mod local;
pub mod query;

use futures::future::BoxFuture;
use tokio::sync::mpsc;

use crate::utils::SyncError;

pub use document::{Document, DocumentData, encode};
pub use local::LocalStore;
pub use query::{Direction, Filter, Query, WatchTarget};

/// Collection names shared by the three client apps.
pub mod collections {
    pub const STUDENTS: &str = "students";
    pub const BUSES: &str = "buses";
    pub const ROUTES: &str = "routes";
    pub const SCHEDULES: &str = "schedules";
    pub const DRIVERS: &str = "drivers";
    pub const SUPERVISORS: &str = "supervisors";
    pub const MESSAGES: &str = "cross_app_messages";
    pub const ATTENDANCE: &str = "attendance";
}

/// One emission of a watch: the current state of the watched target.
#[derive(Debug, Clone)]
pub enum Snapshot {
    /// State of a single watched document; `None` when it does not exist.
    Document(Option<Document>),
    /// Current result set of a watched query.
    Batch(Vec<Document>),
}

/// Cancels the watch it came from. Cancellation is cooperative: it stops
/// future emissions but does not retract a snapshot already in flight.
pub struct WatchCanceller {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl WatchCanceller {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Idempotent: only the first call cancels.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for WatchCanceller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchCanceller")
            .field("cancelled", &self.cancel.is_none())
            .finish()
    }
}

/// A live watch: the snapshot channel plus its canceller. The first
/// snapshot (current state at registration time) is already queued when
/// `watch` returns.
#[derive(Debug)]
pub struct WatchStream {
    pub snapshots: mpsc::UnboundedReceiver<Snapshot>,
    pub canceller: WatchCanceller,
}

/// What the core requires from the remote document store.
///
/// All operations are non-blocking; `watch` registers synchronously and
/// delivers asynchronously over the returned channel.
pub trait RemoteStore: Send + Sync {
    /// Point read; `Ok(None)` when the document does not exist.
    fn get<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Document>, SyncError>>;

    /// Write the full document under a caller-chosen id.
    fn set<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        data: DocumentData,
    ) -> BoxFuture<'a, Result<(), SyncError>>;

    /// Write under a generated id; returns the id.
    fn add<'a>(
        &'a self,
        collection: &'a str,
        data: DocumentData,
    ) -> BoxFuture<'a, Result<String, SyncError>>;

    /// Partial field update; fails with `NotFound` when the document is
    /// missing.
    fn update<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        patch: DocumentData,
    ) -> BoxFuture<'a, Result<(), SyncError>>;

    fn delete<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, Result<(), SyncError>>;

    /// Run a filtered query once.
    fn query<'a>(&'a self, query: &'a Query) -> BoxFuture<'a, Result<Vec<Document>, SyncError>>;

    /// Begin watching a document or query. The stream starts with the
    /// current state and then emits on every change until cancelled.
    fn watch(&self, target: WatchTarget) -> Result<WatchStream, SyncError>;
}

#[cfg(test)]
mod tests;
