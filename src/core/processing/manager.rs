//! Processing log manager
//!
//! Thin layer over [`ProcessingLogStorage`] adding derived state and the
//! administrative reset.

use crate::adapters::database::traits::ProcessingLogStorage;
use crate::core::processing::state::ProcessingState;
use crate::domain::document::DocumentType;
use crate::domain::ids::{RecordId, RecordKey};
use crate::domain::log::{NewLogEntry, ProcessingLogEntry, ProcessingOutcome};
use crate::domain::{HarborError, Result};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

/// Processing log manager
pub struct ProcessingLogManager {
    storage: Arc<dyn ProcessingLogStorage + Send + Sync>,
}

impl ProcessingLogManager {
    /// Create a manager over a log storage backend
    pub fn new(storage: Arc<dyn ProcessingLogStorage + Send + Sync>) -> Self {
        Self { storage }
    }

    /// Append an entry unconditionally
    ///
    /// # Errors
    ///
    /// Returns an error if the storage write fails.
    pub async fn append(&self, key: RecordKey, entry: NewLogEntry) -> Result<u64> {
        let outcome = entry.outcome;
        let sequence = self.storage.append(key, entry).await?;

        tracing::debug!(
            record = %key,
            sequence,
            outcome = %outcome,
            "Appended log entry"
        );
        Ok(sequence)
    }

    /// Append only if the latest sequence number is still `expected`
    ///
    /// Returns `None` when another writer appended first.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage write fails.
    pub async fn append_if_latest(
        &self,
        key: RecordKey,
        expected: Option<u64>,
        entry: NewLogEntry,
    ) -> Result<Option<u64>> {
        self.storage.append_if_latest(key, expected, entry).await
    }

    /// Latest entry of a record's log
    pub async fn latest(&self, key: RecordKey) -> Result<Option<ProcessingLogEntry>> {
        self.storage.latest(key).await
    }

    /// Full history of a record's log
    pub async fn history(&self, key: RecordKey) -> Result<Vec<ProcessingLogEntry>> {
        self.storage.history(key).await
    }

    /// Histories of several records of one partition
    pub async fn histories(
        &self,
        document_type: DocumentType,
        ids: &[RecordId],
    ) -> Result<HashMap<RecordId, Vec<ProcessingLogEntry>>> {
        self.storage.histories(document_type, ids).await
    }

    /// Derived state of a record
    pub async fn state(&self, key: RecordKey) -> Result<ProcessingState> {
        let latest = self.latest(key).await?;
        Ok(ProcessingState::derive(latest.as_ref()))
    }

    /// Return a dead record to eligibility
    ///
    /// Appends a `failed-retryable` entry with `detail.status = "reset"`.
    /// The reset entry does not count toward backoff, so the record is
    /// offered on the next pass.
    ///
    /// # Errors
    ///
    /// Returns `HarborError::State` if the record is not dead, or if its log
    /// changed while the reset was being written.
    pub async fn reset(&self, key: RecordKey, reason: &str) -> Result<u64> {
        let latest = self.latest(key).await?;
        let state = ProcessingState::derive(latest.as_ref());
        if state != ProcessingState::Dead {
            return Err(HarborError::State(format!(
                "{key} is {state}; only dead records can be reset"
            )));
        }

        let expected = latest.map(|e| e.sequence_number);
        let entry = NewLogEntry::new(
            ProcessingOutcome::FailedRetryable,
            json!({ "status": "reset", "reason": reason }),
        );

        let sequence = self
            .storage
            .append_if_latest(key, expected, entry)
            .await?
            .ok_or_else(|| {
                HarborError::State(format!("{key} changed while being reset; try again"))
            })?;

        tracing::info!(record = %key, sequence, reason, "Reset dead record");
        Ok(sequence)
    }
}
