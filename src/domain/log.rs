//! Processing log entry model
//!
//! Each receiving record owns an ordered, append-only journal of ETL
//! attempts and their outcomes. Entries are never rewritten.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Outcome recorded by one processing log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessingOutcome {
    /// A worker claimed the record and started processing it
    Attempted,
    /// Transform and warehouse apply completed
    Succeeded,
    /// Failed in a way expected to resolve on its own
    FailedRetryable,
    /// Failed in a way that needs an operator
    FailedTerminal,
}

impl ProcessingOutcome {
    /// Wire name stored in the log
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingOutcome::Attempted => "attempted",
            ProcessingOutcome::Succeeded => "succeeded",
            ProcessingOutcome::FailedRetryable => "failed-retryable",
            ProcessingOutcome::FailedTerminal => "failed-terminal",
        }
    }
}

impl fmt::Display for ProcessingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "attempted" => Ok(ProcessingOutcome::Attempted),
            "succeeded" => Ok(ProcessingOutcome::Succeeded),
            "failed-retryable" => Ok(ProcessingOutcome::FailedRetryable),
            "failed-terminal" => Ok(ProcessingOutcome::FailedTerminal),
            other => Err(format!("Unknown processing outcome '{other}'")),
        }
    }
}

/// One entry of a record's processing log, as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingLogEntry {
    /// Position within the record's log, starting at 1
    pub sequence_number: u64,

    /// What happened
    pub outcome: ProcessingOutcome,

    /// Structured diagnostics (error cause, entities written, worker id, ...)
    pub detail: Value,

    /// Revision of the transform that produced this entry, if any
    pub revision: Option<u32>,

    /// When the entry was appended
    pub timestamp: DateTime<Utc>,
}

impl ProcessingLogEntry {
    /// `detail.status`, if present
    pub fn status(&self) -> Option<&str> {
        self.detail.get("status").and_then(Value::as_str)
    }

    /// Whether this entry is an administrative reset
    pub fn is_reset(&self) -> bool {
        self.outcome == ProcessingOutcome::FailedRetryable && self.status() == Some("reset")
    }
}

/// An entry about to be appended; the store assigns the sequence number
#[derive(Debug, Clone, PartialEq)]
pub struct NewLogEntry {
    /// What happened
    pub outcome: ProcessingOutcome,

    /// Structured diagnostics
    pub detail: Value,

    /// Revision of the transform involved
    pub revision: Option<u32>,

    /// Entry timestamp
    pub timestamp: DateTime<Utc>,
}

impl NewLogEntry {
    /// Create a new entry stamped with the current time
    pub fn new(outcome: ProcessingOutcome, detail: Value) -> Self {
        Self {
            outcome,
            detail,
            revision: None,
            timestamp: Utc::now(),
        }
    }

    /// Set the transform revision
    pub fn with_revision(mut self, revision: u32) -> Self {
        self.revision = Some(revision);
        self
    }

    /// Override the timestamp
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Materialize the stored entry once a sequence number is assigned
    pub fn into_entry(self, sequence_number: u64) -> ProcessingLogEntry {
        ProcessingLogEntry {
            sequence_number,
            outcome: self.outcome,
            detail: self.detail,
            revision: self.revision,
            timestamp: self.timestamp,
        }
    }
}
