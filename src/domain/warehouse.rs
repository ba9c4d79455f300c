//! Warehouse entity model
//!
//! A transform turns one receiving record into zero or more entities. The
//! core never looks inside `body`; it only needs `(kind, key)` to be unique
//! within the record so that re-applying the same set is an upsert.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Normalized output row of a transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseEntity {
    /// Entity kind, e.g. "encounter" or "sample"
    pub kind: String,

    /// Natural key of the entity within its source record
    pub key: String,

    /// Normalized content
    pub body: Value,
}

impl WarehouseEntity {
    /// Create a new entity
    pub fn new(kind: impl Into<String>, key: impl Into<String>, body: Value) -> Self {
        Self {
            kind: kind.into(),
            key: key.into(),
            body,
        }
    }

    /// `(kind, key)` identity within a record
    pub fn identity(&self) -> (&str, &str) {
        (&self.kind, &self.key)
    }
}
