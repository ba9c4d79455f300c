//! Row mappings for the PostgreSQL tables
//!
//! Column names here must match `migrations/001_initial_schema.sql`.

use crate::domain::document::DocumentType;
use crate::domain::ids::RecordId;
use crate::domain::log::{ProcessingLogEntry, ProcessingOutcome};
use crate::domain::record::ReceivingRecord;
use crate::domain::warehouse::WarehouseEntity;
use crate::domain::{HarborError, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio_postgres::Row;

/// Columns selected from a receiving partition table
pub const RECEIVING_COLUMNS: &str = "id, payload, checksum, received_at";

/// Columns selected from `receiving.processing_log`
pub const LOG_COLUMNS: &str = "record_id, sequence_number, outcome, detail, revision, logged_at";

/// Fully qualified table name of a receiving partition
///
/// Partition names come from a closed enum, so interpolating them is safe.
pub fn receiving_table(document_type: DocumentType) -> String {
    format!("receiving.{}", document_type.partition())
}

/// Convert a row from a receiving partition into a record
pub fn receiving_record_from_row(document_type: DocumentType, row: &Row) -> Result<ReceivingRecord> {
    let id: i64 = get(row, "id")?;
    Ok(ReceivingRecord {
        id: RecordId::new(id).map_err(HarborError::Database)?,
        document_type,
        payload: get(row, "payload")?,
        checksum: get(row, "checksum")?,
        received_at: get(row, "received_at")?,
    })
}

/// Convert a row from the processing log into `(record id, entry)`
pub fn log_entry_from_row(row: &Row) -> Result<(RecordId, ProcessingLogEntry)> {
    let record_id: i64 = get(row, "record_id")?;
    let sequence_number: i64 = get(row, "sequence_number")?;
    let outcome: String = get(row, "outcome")?;
    let detail: Value = get(row, "detail")?;
    let revision: Option<i32> = get(row, "revision")?;
    let timestamp: DateTime<Utc> = get(row, "logged_at")?;

    let outcome: ProcessingOutcome = outcome.parse().map_err(HarborError::Database)?;

    Ok((
        RecordId::new(record_id).map_err(HarborError::Database)?,
        ProcessingLogEntry {
            sequence_number: sequence_number as u64,
            outcome,
            detail,
            revision: revision.map(|r| r as u32),
            timestamp,
        },
    ))
}

/// Convert a row from `warehouse.entity` into an entity
pub fn warehouse_entity_from_row(row: &Row) -> Result<WarehouseEntity> {
    Ok(WarehouseEntity {
        kind: get(row, "kind")?,
        key: get(row, "key")?,
        body: get(row, "body")?,
    })
}

fn get<'a, T>(row: &'a Row, column: &str) -> Result<T>
where
    T: tokio_postgres::types::FromSql<'a>,
{
    row.try_get(column)
        .map_err(|e| HarborError::Database(format!("Failed to read column '{column}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receiving_table_uses_snake_case_partition() {
        assert_eq!(
            receiving_table(DocumentType::PresenceAbsence),
            "receiving.presence_absence"
        );
        assert_eq!(receiving_table(DocumentType::Fhir), "receiving.fhir");
    }
}
