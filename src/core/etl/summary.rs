//! Pass summary and reporting

use crate::domain::document::DocumentType;
use serde::Serialize;
use std::time::Duration;

/// Counters for one partition within a pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartitionSummary {
    /// Partition
    pub document_type: Option<DocumentType>,

    /// Records examined
    pub examined: usize,

    /// Records found eligible
    pub candidates: usize,

    /// Claims won
    pub claimed: usize,

    /// Claims lost to another worker
    pub lost_races: usize,

    /// Records that ended `succeeded` with entities applied
    pub succeeded: usize,

    /// Records that ended `succeeded` as skipped
    pub skipped: usize,

    /// Records that ended `failed-retryable`
    pub failed_retryable: usize,

    /// Records that ended `failed-terminal`
    pub failed_terminal: usize,

    /// Infrastructure errors that left a claim unresolved
    pub errors: Vec<String>,
}

impl PartitionSummary {
    /// Empty summary for a partition
    pub fn new(document_type: DocumentType) -> Self {
        Self {
            document_type: Some(document_type),
            ..Self::default()
        }
    }

    /// Records that reached a resolution in this pass
    pub fn resolved(&self) -> usize {
        self.succeeded + self.skipped + self.failed_retryable + self.failed_terminal
    }

    fn absorb(&mut self, other: &PartitionSummary) {
        self.examined += other.examined;
        self.candidates += other.candidates;
        self.claimed += other.claimed;
        self.lost_races += other.lost_races;
        self.succeeded += other.succeeded;
        self.skipped += other.skipped;
        self.failed_retryable += other.failed_retryable;
        self.failed_terminal += other.failed_terminal;
        self.errors.extend(other.errors.iter().cloned());
    }
}

/// Summary of one orchestrator pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct PassSummary {
    /// Per-partition results, in partition order
    pub partitions: Vec<PartitionSummary>,

    /// Whether the pass wrote nothing
    pub dry_run: bool,

    /// Whether shutdown cut the pass short
    pub interrupted: bool,

    /// Wall-clock duration
    #[serde(skip)]
    pub duration: Duration,
}

impl PassSummary {
    /// Create an empty summary
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Counters summed over all partitions
    pub fn totals(&self) -> PartitionSummary {
        let mut totals = PartitionSummary::default();
        for partition in &self.partitions {
            totals.absorb(partition);
        }
        totals
    }

    /// Counters for one partition
    pub fn partition(&self, document_type: DocumentType) -> Option<&PartitionSummary> {
        self.partitions
            .iter()
            .find(|p| p.document_type == Some(document_type))
    }

    /// Whether the pass hit no infrastructure errors
    pub fn is_successful(&self) -> bool {
        self.partitions.iter().all(|p| p.errors.is_empty())
    }

    /// Whether the pass did any work
    pub fn is_idle(&self) -> bool {
        self.partitions.iter().all(|p| p.candidates == 0)
    }

    /// Log the summary
    pub fn log_summary(&self) {
        let totals = self.totals();
        tracing::info!(
            examined = totals.examined,
            candidates = totals.candidates,
            claimed = totals.claimed,
            lost_races = totals.lost_races,
            succeeded = totals.succeeded,
            skipped = totals.skipped,
            failed_retryable = totals.failed_retryable,
            failed_terminal = totals.failed_terminal,
            dry_run = self.dry_run,
            interrupted = self.interrupted,
            duration_ms = self.duration.as_millis() as u64,
            "ETL pass completed"
        );

        if !totals.errors.is_empty() {
            tracing::warn!(error_count = totals.errors.len(), "ETL pass completed with errors");
            for error in &totals.errors {
                tracing::warn!(message = %error, "ETL pass error");
            }
        }
    }
}

/// Summary of a long-running worker
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Passes completed
    pub passes: usize,

    /// Counters summed over every pass
    pub totals: PartitionSummary,
}

impl RunSummary {
    /// Fold a pass into the running totals
    pub fn record(&mut self, pass: &PassSummary) {
        self.passes += 1;
        self.totals.absorb(&pass.totals());
    }

    /// Merge another worker's summary
    pub fn merge(&mut self, other: &RunSummary) {
        self.passes += other.passes;
        self.totals.absorb(&other.totals);
    }
}
