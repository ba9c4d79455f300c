//! Storage abstraction traits
//!
//! This module defines the traits that storage backends must implement to
//! work with Harbor. A backend provides three things: the append-only
//! receiving store, the per-record processing log, and the warehouse
//! writer. The orchestrator only ever sees these traits.

use crate::domain::document::DocumentType;
use crate::domain::errors::WarehouseError;
use crate::domain::ids::{RecordId, RecordKey};
use crate::domain::log::{NewLogEntry, ProcessingLogEntry};
use crate::domain::record::ReceivingRecord;
use crate::domain::warehouse::WarehouseEntity;
use crate::domain::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Backend lifecycle operations
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Test the connection
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable.
    async fn test_connection(&self) -> Result<()>;

    /// Ensure every receiving partition, the processing log, and the
    /// warehouse tables exist
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    async fn ensure_schema(&self) -> Result<()>;

    /// Backend name used in logs and status output
    fn backend_name(&self) -> &str;
}

/// Append-only receiving store, one partition per document type
///
/// There is deliberately no update or delete operation.
#[async_trait]
pub trait ReceivingStorage: Send + Sync {
    /// Append an already-validated payload and return its new id
    ///
    /// The id is unique and strictly greater than every id previously
    /// assigned in the same partition. The append is durable when this
    /// returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails; nothing is persisted then.
    async fn append(
        &self,
        document_type: DocumentType,
        payload: &str,
        checksum: &str,
        received_at: DateTime<Utc>,
    ) -> Result<RecordId>;

    /// Append several already-validated payloads atomically
    ///
    /// Either every payload is persisted or none is.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn append_many(
        &self,
        document_type: DocumentType,
        payloads: &[(String, String)],
        received_at: DateTime<Utc>,
    ) -> Result<Vec<RecordId>>;

    /// Fetch one record
    async fn get(&self, key: RecordKey) -> Result<Option<ReceivingRecord>>;

    /// List records with id greater than `after`, in increasing id order
    async fn list(
        &self,
        document_type: DocumentType,
        after: Option<RecordId>,
        limit: usize,
    ) -> Result<Vec<ReceivingRecord>>;

    /// Number of records in a partition
    async fn count(&self, document_type: DocumentType) -> Result<u64>;
}

/// Per-record processing log
///
/// Logs are keyed by [`RecordKey`] and never own or block deletion of the
/// receiving record they describe.
#[async_trait]
pub trait ProcessingLogStorage: Send + Sync {
    /// Append an entry after whatever is currently last and return its
    /// sequence number
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn append(&self, key: RecordKey, entry: NewLogEntry) -> Result<u64>;

    /// Append an entry only if the record's latest sequence number is still
    /// `expected` (`None` meaning "no entries yet")
    ///
    /// # Returns
    ///
    /// `Ok(Some(sequence))` when appended, `Ok(None)` when another writer got
    /// there first.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails for any other reason.
    async fn append_if_latest(
        &self,
        key: RecordKey,
        expected: Option<u64>,
        entry: NewLogEntry,
    ) -> Result<Option<u64>>;

    /// All entries for a record in sequence order
    async fn history(&self, key: RecordKey) -> Result<Vec<ProcessingLogEntry>>;

    /// The last entry for a record
    async fn latest(&self, key: RecordKey) -> Result<Option<ProcessingLogEntry>> {
        Ok(self.history(key).await?.pop())
    }

    /// Histories of several records of one partition at once
    ///
    /// Records without entries are absent from the map.
    async fn histories(
        &self,
        document_type: DocumentType,
        ids: &[RecordId],
    ) -> Result<HashMap<RecordId, Vec<ProcessingLogEntry>>> {
        let mut out = HashMap::with_capacity(ids.len());
        for id in ids {
            let history = self.history(RecordKey::new(document_type, *id)).await?;
            if !history.is_empty() {
                out.insert(*id, history);
            }
        }
        Ok(out)
    }
}

/// Idempotent warehouse writer
#[async_trait]
pub trait WarehouseWriter: Send + Sync {
    /// Apply a record's entity set
    ///
    /// Must be idempotent under `key`: applying the same set twice leaves
    /// the warehouse as applying it once. Entities previously written for
    /// `key` that are absent from `entities` are removed.
    ///
    /// # Errors
    ///
    /// Returns a classified [`WarehouseError`].
    async fn apply(
        &self,
        key: RecordKey,
        entities: &[WarehouseEntity],
    ) -> std::result::Result<(), WarehouseError>;

    /// Entities currently stored for a record, ordered by `(kind, key)`
    async fn entities(&self, key: RecordKey) -> Result<Vec<WarehouseEntity>>;
}
