//! In-process storage backend
//!
//! Each receiving partition is an arena: a `Vec` of records where a record's
//! id is its index plus one. Logs and warehouse rows are maps keyed by
//! [`RecordKey`]. All state sits behind one `Mutex` per concern, so every
//! append is atomic with its id assignment.

use crate::adapters::database::traits::{
    ProcessingLogStorage, ReceivingStorage, StorageBackend, WarehouseWriter,
};
use crate::domain::document::DocumentType;
use crate::domain::errors::{HarborError, WarehouseError};
use crate::domain::ids::{RecordId, RecordKey};
use crate::domain::log::{NewLogEntry, ProcessingLogEntry};
use crate::domain::record::ReceivingRecord;
use crate::domain::warehouse::WarehouseEntity;
use crate::domain::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

type EntityRows = BTreeMap<(String, String), WarehouseEntity>;

/// Memory-backed implementation of every storage trait
#[derive(Default)]
pub struct MemoryStore {
    partitions: Mutex<HashMap<DocumentType, Vec<ReceivingRecord>>>,
    logs: Mutex<HashMap<RecordKey, Vec<ProcessingLogEntry>>>,
    warehouse: Mutex<HashMap<RecordKey, EntityRows>>,
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|_| HarborError::Database(format!("{what} lock poisoned")))
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn push_record(
        partitions: &mut HashMap<DocumentType, Vec<ReceivingRecord>>,
        document_type: DocumentType,
        payload: &str,
        checksum: &str,
        received_at: DateTime<Utc>,
    ) -> Result<RecordId> {
        let arena = partitions.entry(document_type).or_default();
        let id = RecordId::new(arena.len() as i64 + 1).map_err(HarborError::Database)?;
        arena.push(ReceivingRecord {
            id,
            document_type,
            payload: payload.to_string(),
            checksum: checksum.to_string(),
            received_at,
        });
        Ok(id)
    }
}

#[async_trait]
impl StorageBackend for MemoryStore {
    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}

#[async_trait]
impl ReceivingStorage for MemoryStore {
    async fn append(
        &self,
        document_type: DocumentType,
        payload: &str,
        checksum: &str,
        received_at: DateTime<Utc>,
    ) -> Result<RecordId> {
        let mut partitions = lock(&self.partitions, "receiving")?;
        Self::push_record(&mut partitions, document_type, payload, checksum, received_at)
    }

    async fn append_many(
        &self,
        document_type: DocumentType,
        payloads: &[(String, String)],
        received_at: DateTime<Utc>,
    ) -> Result<Vec<RecordId>> {
        let mut partitions = lock(&self.partitions, "receiving")?;
        payloads
            .iter()
            .map(|(payload, checksum)| {
                Self::push_record(&mut partitions, document_type, payload, checksum, received_at)
            })
            .collect()
    }

    async fn get(&self, key: RecordKey) -> Result<Option<ReceivingRecord>> {
        let partitions = lock(&self.partitions, "receiving")?;
        let index = (key.id.value() - 1) as usize;
        Ok(partitions
            .get(&key.document_type)
            .and_then(|arena| arena.get(index))
            .cloned())
    }

    async fn list(
        &self,
        document_type: DocumentType,
        after: Option<RecordId>,
        limit: usize,
    ) -> Result<Vec<ReceivingRecord>> {
        let partitions = lock(&self.partitions, "receiving")?;
        let start = after.map(|id| id.value() as usize).unwrap_or(0);
        Ok(partitions
            .get(&document_type)
            .map(|arena| arena.iter().skip(start).take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn count(&self, document_type: DocumentType) -> Result<u64> {
        let partitions = lock(&self.partitions, "receiving")?;
        Ok(partitions
            .get(&document_type)
            .map(|arena| arena.len() as u64)
            .unwrap_or(0))
    }
}

#[async_trait]
impl ProcessingLogStorage for MemoryStore {
    async fn append(&self, key: RecordKey, entry: NewLogEntry) -> Result<u64> {
        let mut logs = lock(&self.logs, "processing log")?;
        let log = logs.entry(key).or_default();
        let sequence = log.len() as u64 + 1;
        log.push(entry.into_entry(sequence));
        Ok(sequence)
    }

    async fn append_if_latest(
        &self,
        key: RecordKey,
        expected: Option<u64>,
        entry: NewLogEntry,
    ) -> Result<Option<u64>> {
        let mut logs = lock(&self.logs, "processing log")?;
        let log = logs.entry(key).or_default();
        let current = log.last().map(|e| e.sequence_number);
        if current != expected {
            return Ok(None);
        }
        let sequence = current.unwrap_or(0) + 1;
        log.push(entry.into_entry(sequence));
        Ok(Some(sequence))
    }

    async fn history(&self, key: RecordKey) -> Result<Vec<ProcessingLogEntry>> {
        let logs = lock(&self.logs, "processing log")?;
        Ok(logs.get(&key).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl WarehouseWriter for MemoryStore {
    async fn apply(
        &self,
        key: RecordKey,
        entities: &[WarehouseEntity],
    ) -> std::result::Result<(), WarehouseError> {
        let mut warehouse = self
            .warehouse
            .lock()
            .map_err(|_| WarehouseError::Transient("warehouse lock poisoned".to_string()))?;

        let rows: EntityRows = entities
            .iter()
            .map(|e| ((e.kind.clone(), e.key.clone()), e.clone()))
            .collect();

        if rows.is_empty() {
            warehouse.remove(&key);
        } else {
            warehouse.insert(key, rows);
        }
        Ok(())
    }

    async fn entities(&self, key: RecordKey) -> Result<Vec<WarehouseEntity>> {
        let warehouse = lock(&self.warehouse, "warehouse")?;
        Ok(warehouse
            .get(&key)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default())
    }
}
