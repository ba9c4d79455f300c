//! Transforms
//!
//! A transform turns one immutable receiving record into the warehouse
//! entities it implies. The orchestrator only cares about the classified
//! result; what a transform does with the payload is its own business.

use crate::domain::document::DocumentType;
use crate::domain::errors::TransformError;
use crate::domain::record::ReceivingRecord;
use crate::domain::warehouse::WarehouseEntity;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Result of a successful transform
#[derive(Debug, Clone, PartialEq)]
pub enum TransformOutput {
    /// Entities to apply for the record
    Entities(Vec<WarehouseEntity>),

    /// Nothing to write; the record is deliberately ignored
    Skipped(String),
}

impl TransformOutput {
    /// Entities to apply
    pub fn entities(entities: Vec<WarehouseEntity>) -> Self {
        TransformOutput::Entities(entities)
    }

    /// Skip the record with a reason
    pub fn skipped(reason: impl Into<String>) -> Self {
        TransformOutput::Skipped(reason.into())
    }
}

/// Type-specific transform
#[async_trait]
pub trait Transform: Send + Sync {
    /// Document type this transform handles
    fn document_type(&self) -> DocumentType;

    /// Revision of the transform's rules
    ///
    /// Records that succeeded at an older revision are processed again.
    fn revision(&self) -> u32;

    /// Transform one record
    ///
    /// Must be a function of the record alone, or of external state that
    /// only ever grows, so a re-run after a crash produces the same set.
    ///
    /// # Errors
    ///
    /// Returns a classified [`TransformError`].
    async fn transform(&self, record: &ReceivingRecord)
        -> Result<TransformOutput, TransformError>;
}

/// Transforms by document type
#[derive(Clone, Default)]
pub struct TransformRegistry {
    transforms: HashMap<DocumentType, Arc<dyn Transform>>,
}

impl TransformRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with [`DocumentTransform`] for every document type
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for document_type in DocumentType::ALL {
            registry.register(Arc::new(DocumentTransform::new(document_type)));
        }
        registry
    }

    /// Register a transform, replacing any previous one for its type
    pub fn register(&mut self, transform: Arc<dyn Transform>) -> &mut Self {
        self.transforms.insert(transform.document_type(), transform);
        self
    }

    /// Transform for a document type
    pub fn get(&self, document_type: DocumentType) -> Option<Arc<dyn Transform>> {
        self.transforms.get(&document_type).cloned()
    }

    /// Registered document types, sorted
    pub fn document_types(&self) -> Vec<DocumentType> {
        let mut types: Vec<DocumentType> = self.transforms.keys().copied().collect();
        types.sort();
        types
    }
}

/// Built-in transform projecting a payload into a single `document` entity
pub struct DocumentTransform {
    document_type: DocumentType,
}

impl DocumentTransform {
    /// Entity kind written by this transform
    pub const KIND: &'static str = "document";

    /// Current revision
    pub const REVISION: u32 = 1;

    /// Create the transform for one document type
    pub fn new(document_type: DocumentType) -> Self {
        Self { document_type }
    }
}

#[async_trait]
impl Transform for DocumentTransform {
    fn document_type(&self) -> DocumentType {
        self.document_type
    }

    fn revision(&self) -> u32 {
        Self::REVISION
    }

    async fn transform(
        &self,
        record: &ReceivingRecord,
    ) -> Result<TransformOutput, TransformError> {
        // Payloads were validated on the way in; failing to parse now means
        // the stored bytes are damaged and retrying will not help
        let body = record
            .document()
            .map_err(|e| TransformError::terminal(format!("stored payload unreadable: {e}")))?;

        Ok(TransformOutput::entities(vec![WarehouseEntity::new(
            Self::KIND,
            record.id.to_string(),
            body,
        )]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::RecordId;
    use chrono::Utc;
    use serde_json::json;

    fn record(payload: &str) -> ReceivingRecord {
        ReceivingRecord {
            id: RecordId::new(7).unwrap(),
            document_type: DocumentType::Enrollment,
            payload: payload.to_string(),
            checksum: String::new(),
            received_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_document_transform_emits_one_entity() {
        let transform = DocumentTransform::new(DocumentType::Enrollment);
        let output = transform
            .transform(&record("{\"participant\":\"abc\"}"))
            .await
            .unwrap();

        assert_eq!(
            output,
            TransformOutput::Entities(vec![WarehouseEntity::new(
                "document",
                "7",
                json!({"participant": "abc"})
            )])
        );
    }

    #[tokio::test]
    async fn test_document_transform_damaged_payload_is_terminal() {
        let transform = DocumentTransform::new(DocumentType::Enrollment);
        let err = transform.transform(&record("{oops")).await.unwrap_err();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_registry_defaults_cover_every_type() {
        let registry = TransformRegistry::with_defaults();
        assert_eq!(registry.document_types(), DocumentType::ALL.to_vec());
        assert_eq!(
            registry.get(DocumentType::Kit).unwrap().document_type(),
            DocumentType::Kit
        );
    }
}
