//! Domain identifier types with validation
//!
//! Newtype wrappers keep receiving ids, record keys, and worker ids from
//! being mixed up with each other or with plain integers.

use super::document::DocumentType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Receiving record identifier
///
/// Assigned by the receiving store at insert time. Positive, monotonically
/// increasing and unique within one document-type partition.
///
/// # Examples
///
/// ```
/// use harbor::domain::ids::RecordId;
/// use std::str::FromStr;
///
/// let id = RecordId::from_str("42").unwrap();
/// assert_eq!(id.value(), 42);
/// assert!(RecordId::new(0).is_err());
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RecordId(i64);

impl RecordId {
    /// Creates a new RecordId
    ///
    /// # Returns
    ///
    /// Returns `Err` if the id is not positive
    pub fn new(id: i64) -> Result<Self, String> {
        if id <= 0 {
            return Err(format!("Record ID must be positive, got {id}"));
        }
        Ok(Self(id))
    }

    /// Returns the numeric value
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id: i64 = s
            .trim()
            .parse()
            .map_err(|e| format!("Invalid record ID '{s}': {e}"))?;
        Self::new(id)
    }
}

/// Fully qualified receiving record key: `(document_type, id)`
///
/// The processing log and the warehouse are keyed by this pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    /// Partition the record lives in
    pub document_type: DocumentType,

    /// Identifier within the partition
    pub id: RecordId,
}

impl RecordKey {
    /// Create a new record key
    pub fn new(document_type: DocumentType, id: RecordId) -> Self {
        Self { document_type, id }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.document_type, self.id)
    }
}

/// Identity of one orchestrator worker, recorded in its claims
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(Uuid);

impl WorkerId {
    /// Generate a fresh random worker id
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WorkerId {
    fn default() -> Self {
        Self::generate()
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_rejects_non_positive() {
        assert!(RecordId::new(0).is_err());
        assert!(RecordId::new(-3).is_err());
        assert_eq!(RecordId::new(1).unwrap().value(), 1);
    }

    #[test]
    fn test_record_id_from_str() {
        assert_eq!(RecordId::from_str(" 17 ").unwrap().value(), 17);
        assert!(RecordId::from_str("abc").is_err());
    }

    #[test]
    fn test_record_id_ordering() {
        let a = RecordId::new(2).unwrap();
        let b = RecordId::new(10).unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_record_key_display() {
        let key = RecordKey::new(DocumentType::RedcapDet, RecordId::new(5).unwrap());
        assert_eq!(key.to_string(), "redcap-det/5");
    }

    #[test]
    fn test_worker_ids_are_unique() {
        assert_ne!(WorkerId::generate(), WorkerId::generate());
    }
}
