//! Receiving record model

use super::document::DocumentType;
use super::ids::{RecordId, RecordKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One received document
///
/// `payload` holds the body exactly as the producer sent it. It is never
/// normalized or rewritten; transforms parse it on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivingRecord {
    /// Identifier within the document type's partition
    pub id: RecordId,

    /// Partition / transform selector
    pub document_type: DocumentType,

    /// Raw received text
    pub payload: String,

    /// SHA-256 (hex) of the payload bytes at insert time
    pub checksum: String,

    /// When the record was appended
    pub received_at: DateTime<Utc>,
}

impl ReceivingRecord {
    /// Key of this record in the processing log and warehouse
    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.document_type, self.id)
    }

    /// Parse the payload as JSON
    pub fn document(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(payload: &str) -> ReceivingRecord {
        ReceivingRecord {
            id: RecordId::new(3).unwrap(),
            document_type: DocumentType::Enrollment,
            payload: payload.to_string(),
            checksum: String::new(),
            received_at: Utc::now(),
        }
    }

    #[test]
    fn test_key() {
        let key = record("{}").key();
        assert_eq!(key.document_type, DocumentType::Enrollment);
        assert_eq!(key.id.value(), 3);
    }

    #[test]
    fn test_document_parses_payload() {
        let doc = record(r#"{"participant": "abc"}"#).document().unwrap();
        assert_eq!(doc["participant"], "abc");
    }
}
