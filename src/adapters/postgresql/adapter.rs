//! PostgreSQL adapter implementing the storage traits
//!
//! Receiving partitions are one table per document type with an identity
//! column for ids. The processing log is a single table list-partitioned by
//! document type whose primary key `(document_type, record_id,
//! sequence_number)` makes the conditional append race-free.

use crate::adapters::database::traits::{
    ProcessingLogStorage, ReceivingStorage, StorageBackend, WarehouseWriter,
};
use crate::adapters::postgresql::client::{
    classify_warehouse_error, database_error, PostgreSQLClient,
};
use crate::adapters::postgresql::models::{
    log_entry_from_row, receiving_record_from_row, receiving_table, warehouse_entity_from_row,
    LOG_COLUMNS, RECEIVING_COLUMNS,
};
use crate::domain::document::DocumentType;
use crate::domain::errors::WarehouseError;
use crate::domain::ids::{RecordId, RecordKey};
use crate::domain::log::{NewLogEntry, ProcessingLogEntry};
use crate::domain::record::ReceivingRecord;
use crate::domain::warehouse::WarehouseEntity;
use crate::domain::{HarborError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// Attempts made by an unconditional log append before giving up
const APPEND_ATTEMPTS: usize = 8;

/// PostgreSQL implementation of every storage trait
pub struct PostgreSQLAdapter {
    client: Arc<PostgreSQLClient>,
}

impl PostgreSQLAdapter {
    /// Create a new PostgreSQL adapter
    pub fn new(client: PostgreSQLClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

#[async_trait]
impl StorageBackend for PostgreSQLAdapter {
    async fn test_connection(&self) -> Result<()> {
        self.client.test_connection().await
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.client.ensure_schema().await
    }

    fn backend_name(&self) -> &str {
        "postgresql"
    }
}

#[async_trait]
impl ReceivingStorage for PostgreSQLAdapter {
    async fn append(
        &self,
        document_type: DocumentType,
        payload: &str,
        checksum: &str,
        received_at: DateTime<Utc>,
    ) -> Result<RecordId> {
        let statement = format!(
            "INSERT INTO {} (payload, checksum, received_at) VALUES ($1, $2, $3) RETURNING id",
            receiving_table(document_type)
        );

        let rows = self
            .client
            .query(&statement, &[&payload, &checksum, &received_at])
            .await?;
        let row = rows
            .first()
            .ok_or_else(|| HarborError::Database("INSERT returned no id".to_string()))?;
        let id: i64 = row.try_get("id").map_err(database_error)?;

        tracing::debug!(
            document_type = %document_type,
            record_id = id,
            "Appended receiving record"
        );

        RecordId::new(id).map_err(HarborError::Database)
    }

    async fn append_many(
        &self,
        document_type: DocumentType,
        payloads: &[(String, String)],
        received_at: DateTime<Utc>,
    ) -> Result<Vec<RecordId>> {
        let statement = format!(
            "INSERT INTO {} (payload, checksum, received_at) VALUES ($1, $2, $3) RETURNING id",
            receiving_table(document_type)
        );

        let mut conn = self.client.get_connection().await?;
        let tx = conn.transaction().await.map_err(database_error)?;
        let prepared = tx.prepare(&statement).await.map_err(database_error)?;

        let mut ids = Vec::with_capacity(payloads.len());
        for (payload, checksum) in payloads {
            let row = tx
                .query_one(&prepared, &[payload, checksum, &received_at])
                .await
                .map_err(database_error)?;
            let id: i64 = row.try_get("id").map_err(database_error)?;
            ids.push(RecordId::new(id).map_err(HarborError::Database)?);
        }

        tx.commit().await.map_err(database_error)?;

        tracing::debug!(
            document_type = %document_type,
            count = ids.len(),
            "Appended receiving records"
        );

        Ok(ids)
    }

    async fn get(&self, key: RecordKey) -> Result<Option<ReceivingRecord>> {
        let query = format!(
            "SELECT {RECEIVING_COLUMNS} FROM {} WHERE id = $1",
            receiving_table(key.document_type)
        );
        let rows = self.client.query(&query, &[&key.id.value()]).await?;

        rows.first()
            .map(|row| receiving_record_from_row(key.document_type, row))
            .transpose()
    }

    async fn list(
        &self,
        document_type: DocumentType,
        after: Option<RecordId>,
        limit: usize,
    ) -> Result<Vec<ReceivingRecord>> {
        let query = format!(
            "SELECT {RECEIVING_COLUMNS} FROM {} WHERE id > $1 ORDER BY id LIMIT $2",
            receiving_table(document_type)
        );
        let after = after.map(|id| id.value()).unwrap_or(0);
        let limit = limit as i64;

        let rows = self.client.query(&query, &[&after, &limit]).await?;
        rows.iter()
            .map(|row| receiving_record_from_row(document_type, row))
            .collect()
    }

    async fn count(&self, document_type: DocumentType) -> Result<u64> {
        let query = format!("SELECT COUNT(*) AS n FROM {}", receiving_table(document_type));
        let rows = self.client.query(&query, &[]).await?;
        let n: i64 = rows
            .first()
            .map(|row| row.try_get("n"))
            .transpose()
            .map_err(database_error)?
            .unwrap_or(0);
        Ok(n as u64)
    }
}

#[async_trait]
impl ProcessingLogStorage for PostgreSQLAdapter {
    async fn append(&self, key: RecordKey, entry: NewLogEntry) -> Result<u64> {
        for _ in 0..APPEND_ATTEMPTS {
            let latest = self.latest(key).await?.map(|e| e.sequence_number);
            if let Some(sequence) = self.append_if_latest(key, latest, entry.clone()).await? {
                return Ok(sequence);
            }
            tracing::debug!(record = %key, "Log append lost a race, retrying");
        }

        Err(HarborError::State(format!(
            "Could not append to processing log of {key} after {APPEND_ATTEMPTS} attempts"
        )))
    }

    async fn append_if_latest(
        &self,
        key: RecordKey,
        expected: Option<u64>,
        entry: NewLogEntry,
    ) -> Result<Option<u64>> {
        let statement = r#"
            INSERT INTO receiving.processing_log (
                document_type, record_id, sequence_number, outcome, detail, revision, logged_at
            )
            SELECT $1::text, $2::bigint, $3::bigint, $4::text, $5::jsonb, $6::integer, $7::timestamptz
            WHERE (
                SELECT COALESCE(MAX(sequence_number), 0)
                FROM receiving.processing_log
                WHERE document_type = $1::text AND record_id = $2::bigint
            ) = $8::bigint
            ON CONFLICT DO NOTHING
        "#;

        let current = expected.unwrap_or(0) as i64;
        let next = current + 1;
        let revision = entry.revision.map(|r| r as i32);

        let inserted = self
            .client
            .execute(
                statement,
                &[
                    &key.document_type.as_str(),
                    &key.id.value(),
                    &next,
                    &entry.outcome.as_str(),
                    &entry.detail,
                    &revision,
                    &entry.timestamp,
                    &current,
                ],
            )
            .await?;

        if inserted == 0 {
            tracing::debug!(record = %key, expected = ?expected, "Conditional log append rejected");
            return Ok(None);
        }

        Ok(Some(next as u64))
    }

    async fn history(&self, key: RecordKey) -> Result<Vec<ProcessingLogEntry>> {
        let query = format!(
            "SELECT {LOG_COLUMNS} FROM receiving.processing_log \
             WHERE document_type = $1 AND record_id = $2 ORDER BY sequence_number"
        );
        let rows = self
            .client
            .query(&query, &[&key.document_type.as_str(), &key.id.value()])
            .await?;

        rows.iter()
            .map(|row| log_entry_from_row(row).map(|(_, entry)| entry))
            .collect()
    }

    async fn latest(&self, key: RecordKey) -> Result<Option<ProcessingLogEntry>> {
        let query = format!(
            "SELECT {LOG_COLUMNS} FROM receiving.processing_log \
             WHERE document_type = $1 AND record_id = $2 \
             ORDER BY sequence_number DESC LIMIT 1"
        );
        let rows = self
            .client
            .query(&query, &[&key.document_type.as_str(), &key.id.value()])
            .await?;

        rows.first()
            .map(|row| log_entry_from_row(row).map(|(_, entry)| entry))
            .transpose()
    }

    async fn histories(
        &self,
        document_type: DocumentType,
        ids: &[RecordId],
    ) -> Result<HashMap<RecordId, Vec<ProcessingLogEntry>>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let query = format!(
            "SELECT {LOG_COLUMNS} FROM receiving.processing_log \
             WHERE document_type = $1 AND record_id = ANY($2) \
             ORDER BY record_id, sequence_number"
        );
        let raw_ids: Vec<i64> = ids.iter().map(RecordId::value).collect();
        let rows = self
            .client
            .query(&query, &[&document_type.as_str(), &raw_ids])
            .await?;

        let mut out: HashMap<RecordId, Vec<ProcessingLogEntry>> = HashMap::new();
        for row in &rows {
            let (id, entry) = log_entry_from_row(row)?;
            out.entry(id).or_default().push(entry);
        }
        Ok(out)
    }
}

#[async_trait]
impl WarehouseWriter for PostgreSQLAdapter {
    async fn apply(
        &self,
        key: RecordKey,
        entities: &[WarehouseEntity],
    ) -> std::result::Result<(), WarehouseError> {
        let mut conn = self
            .client
            .get_connection()
            .await
            .map_err(|e| WarehouseError::Transient(e.to_string()))?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| classify_warehouse_error(&e))?;

        let document_type = key.document_type.as_str();
        let record_id = key.id.value();

        let kinds: Vec<&str> = entities.iter().map(|e| e.kind.as_str()).collect();
        let keys: Vec<&str> = entities.iter().map(|e| e.key.as_str()).collect();

        // Drop rows this record no longer produces
        tx.execute(
            r#"
            DELETE FROM warehouse.entity
            WHERE document_type = $1 AND record_id = $2
              AND (kind, key) NOT IN (SELECT * FROM UNNEST($3::text[], $4::text[]))
            "#,
            &[&document_type, &record_id, &kinds, &keys],
        )
        .await
        .map_err(|e| classify_warehouse_error(&e))?;

        let upsert = tx
            .prepare(
                r#"
                INSERT INTO warehouse.entity (document_type, record_id, kind, key, body, updated_at)
                VALUES ($1, $2, $3, $4, $5, now())
                ON CONFLICT (document_type, record_id, kind, key) DO UPDATE SET
                    body = EXCLUDED.body,
                    updated_at = EXCLUDED.updated_at
                "#,
            )
            .await
            .map_err(|e| classify_warehouse_error(&e))?;

        for entity in entities {
            tx.execute(
                &upsert,
                &[
                    &document_type,
                    &record_id,
                    &entity.kind,
                    &entity.key,
                    &entity.body,
                ],
            )
            .await
            .map_err(|e| classify_warehouse_error(&e))?;
        }

        tx.commit()
            .await
            .map_err(|e| classify_warehouse_error(&e))?;

        tracing::debug!(
            record = %key,
            entities = entities.len(),
            "Applied warehouse entities"
        );
        Ok(())
    }

    async fn entities(&self, key: RecordKey) -> Result<Vec<WarehouseEntity>> {
        let rows = self
            .client
            .query(
                "SELECT kind, key, body FROM warehouse.entity \
                 WHERE document_type = $1 AND record_id = $2 ORDER BY kind, key",
                &[&key.document_type.as_str(), &key.id.value()],
            )
            .await?;

        rows.iter().map(warehouse_entity_from_row).collect()
    }
}
