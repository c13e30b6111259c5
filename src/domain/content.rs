//! CMS content entries, treated as opaque bags of fields.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::DomainError;

pub type ContentFields = Map<String, Value>;

/// One CMS record. The core never interprets its fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentEntry(Value);

impl ContentEntry {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Fields of the entry; entries that are not JSON objects cannot be merged.
    pub fn into_fields(self) -> Result<ContentFields, DomainError> {
        match self.0 {
            Value::Object(fields) => Ok(fields),
            other => Err(DomainError::invariant(format!(
                "content entry is not an object: {other}"
            ))),
        }
    }
}

/// Entries of one content type as returned by the delivery service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryCollection {
    pub entries: Vec<ContentEntry>,
    pub count: u64,
}

impl EntryCollection {
    pub fn new(entries: Vec<ContentEntry>) -> Self {
        let count = entries.len() as u64;
        Self { entries, count }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
