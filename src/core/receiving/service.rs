//! Receiving service
//!
//! The producer-facing entry point: validate, checksum, append.

use crate::adapters::database::traits::ReceivingStorage;
use crate::core::receiving::checksum::payload_checksum;
use crate::core::receiving::validator::DocumentValidator;
use crate::domain::document::DocumentType;
use crate::domain::errors::ValidationError;
use crate::domain::ids::{RecordId, RecordKey};
use crate::domain::record::ReceivingRecord;
use crate::domain::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Validating front of the receiving store
pub struct ReceivingService {
    storage: Arc<dyn ReceivingStorage + Send + Sync>,
    validator: DocumentValidator,
}

impl ReceivingService {
    /// Create a service with the default validator
    pub fn new(storage: Arc<dyn ReceivingStorage + Send + Sync>) -> Self {
        Self::with_validator(storage, DocumentValidator::new())
    }

    /// Create a service with a custom validator
    pub fn with_validator(
        storage: Arc<dyn ReceivingStorage + Send + Sync>,
        validator: DocumentValidator,
    ) -> Self {
        Self { storage, validator }
    }

    /// Validate and append one payload
    ///
    /// The payload is stored exactly as given, not re-serialized.
    ///
    /// # Errors
    ///
    /// Returns `HarborError::Validation` when the payload fails its type's
    /// structural invariant; nothing is persisted in that case. Storage
    /// failures propagate unchanged.
    pub async fn append(&self, document_type: DocumentType, payload: &str) -> Result<RecordId> {
        if let Err(e) = self.validator.validate(document_type, payload) {
            tracing::warn!(
                document_type = %document_type,
                error = %e,
                "Rejected document"
            );
            return Err(e.into());
        }

        let checksum = payload_checksum(payload);
        let id = self
            .storage
            .append(document_type, payload, &checksum, Utc::now())
            .await?;

        tracing::info!(
            document_type = %document_type,
            record_id = %id,
            bytes = payload.len(),
            "Received document"
        );
        Ok(id)
    }

    /// Append every non-blank line of newline-delimited JSON as its own record
    ///
    /// All lines are validated before anything is written, so one bad line
    /// rejects the whole batch.
    ///
    /// # Errors
    ///
    /// Returns `HarborError::Validation` wrapping [`ValidationError::Line`]
    /// with the 1-based line number of the first invalid line.
    pub async fn append_ndjson<R>(
        &self,
        document_type: DocumentType,
        reader: R,
    ) -> Result<Vec<RecordId>>
    where
        R: AsyncBufRead + Unpin + Send,
    {
        let mut lines = reader.lines();
        let mut batch = Vec::new();
        let mut line_number = 0usize;

        while let Some(line) = lines.next_line().await? {
            line_number += 1;
            if line.trim().is_empty() {
                continue;
            }

            self.validator
                .validate(document_type, &line)
                .map_err(|e| ValidationError::Line {
                    line: line_number,
                    source: Box::new(e),
                })?;

            let checksum = payload_checksum(&line);
            batch.push((line, checksum));
        }

        if batch.is_empty() {
            tracing::info!(document_type = %document_type, "NDJSON input had no documents");
            return Ok(Vec::new());
        }

        let ids = self
            .storage
            .append_many(document_type, &batch, Utc::now())
            .await?;

        tracing::info!(
            document_type = %document_type,
            count = ids.len(),
            "Received NDJSON batch"
        );
        Ok(ids)
    }

    /// Fetch one record
    pub async fn get(&self, key: RecordKey) -> Result<Option<ReceivingRecord>> {
        self.storage.get(key).await
    }

    /// Number of records in a partition
    pub async fn count(&self, document_type: DocumentType) -> Result<u64> {
        self.storage.count(document_type).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::domain::HarborError;

    fn service() -> ReceivingService {
        ReceivingService::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_append_preserves_payload_bytes() {
        let service = service();
        let payload = "{ \"participant\" : \"abc\" }";
        let id = service
            .append(DocumentType::Enrollment, payload)
            .await
            .unwrap();

        let record = service
            .get(RecordKey::new(DocumentType::Enrollment, id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.payload, payload);
        assert_eq!(record.checksum, payload_checksum(payload));
    }

    #[tokio::test]
    async fn test_rejected_append_persists_nothing() {
        let service = service();
        let err = service
            .append(DocumentType::Fhir, "[1,2,3]")
            .await
            .unwrap_err();

        assert!(matches!(err, HarborError::Validation(_)));
        assert_eq!(service.count(DocumentType::Fhir).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ndjson_skips_blank_lines() {
        let service = service();
        let input = "{\"n\":1}\n\n{\"n\":2}\n   \n{\"n\":3}\n";
        let ids = service
            .append_ndjson(DocumentType::ConsensusGenome, input.as_bytes())
            .await
            .unwrap();

        assert_eq!(ids.len(), 3);
        assert_eq!(ids[2].value(), 3);
    }

    #[tokio::test]
    async fn test_ndjson_rejects_whole_batch() {
        let service = service();
        let input = "{\"n\":1}\n{\"n\":2}\n[3]\n";
        let err = service
            .append_ndjson(DocumentType::ConsensusGenome, input.as_bytes())
            .await
            .unwrap_err();

        match err {
            HarborError::Validation(ValidationError::Line { line, source }) => {
                assert_eq!(line, 3);
                assert!(matches!(*source, ValidationError::WrongShape { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(
            service.count(DocumentType::ConsensusGenome).await.unwrap(),
            0
        );
    }
}
