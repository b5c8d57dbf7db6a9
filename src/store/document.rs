//! Document representation.
//!
//! Documents are flat JSON objects; entities and messages round-trip
//! through `serde_json::Value` so the store stays schema-free while the
//! model layer keeps strict types.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Field map of one stored document.
pub type DocumentData = serde_json::Map<String, Value>;

/// A stored document together with its id.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: DocumentData,
}

impl Document {
    pub fn new(id: impl Into<String>, data: DocumentData) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Decode the document into a typed entity.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.data.clone()))
    }
}

/// Encode a typed value as document data. Values that do not serialize to a
/// JSON object (scalars, arrays) are rejected.
pub fn encode<T: Serialize>(value: &T) -> Result<DocumentData, serde_json::Error> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(serde::ser::Error::custom(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}
