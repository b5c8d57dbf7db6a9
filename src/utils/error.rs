//! Error types for the sync core.
//!
//! One enum covers the whole taxonomy: precondition failures (rejected
//! before any store call), store-operation failures, and decode failures.
//! Nothing here is fatal to a session: callers degrade to "this message
//! or update did not get through".

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// A required message field was empty or missing before a send.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A value failed strict parsing (priority, role, message kind, ...).
    #[error("invalid {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    /// A document expected to exist was not found.
    #[error("not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    /// Backing store failure.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// A stored document could not be decoded into an entity.
    #[error("decode error in {collection}: {source}")]
    Decode {
        collection: String,
        #[source]
        source: serde_json::Error,
    },

    /// Serialization of an outbound document failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
