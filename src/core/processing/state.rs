//! Derived processing state
//!
//! State is never stored. It is recomputed from a record's log every time it
//! is needed, so a crash can never leave it out of sync with the log.

use crate::domain::log::{ProcessingLogEntry, ProcessingOutcome};
use serde::Serialize;
use std::fmt;

/// Processing state of one receiving record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessingState {
    /// No log entries yet
    Unprocessed,
    /// Latest entry is `attempted`
    InFlight,
    /// Latest entry is `succeeded`
    Done,
    /// Latest entry is `failed-retryable`
    Retryable,
    /// Latest entry is `failed-terminal`
    Dead,
}

impl ProcessingState {
    /// All states, in display order
    pub const ALL: [ProcessingState; 5] = [
        ProcessingState::Unprocessed,
        ProcessingState::InFlight,
        ProcessingState::Done,
        ProcessingState::Retryable,
        ProcessingState::Dead,
    ];

    /// Derive the state from the latest log entry
    ///
    /// # Examples
    ///
    /// ```
    /// use harbor::core::processing::ProcessingState;
    ///
    /// assert_eq!(ProcessingState::derive(None), ProcessingState::Unprocessed);
    /// ```
    pub fn derive(latest: Option<&ProcessingLogEntry>) -> Self {
        match latest.map(|e| e.outcome) {
            None => ProcessingState::Unprocessed,
            Some(ProcessingOutcome::Attempted) => ProcessingState::InFlight,
            Some(ProcessingOutcome::Succeeded) => ProcessingState::Done,
            Some(ProcessingOutcome::FailedRetryable) => ProcessingState::Retryable,
            Some(ProcessingOutcome::FailedTerminal) => ProcessingState::Dead,
        }
    }

    /// Derive the state from a full history
    pub fn from_history(history: &[ProcessingLogEntry]) -> Self {
        Self::derive(history.last())
    }

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingState::Unprocessed => "unprocessed",
            ProcessingState::InFlight => "in-flight",
            ProcessingState::Done => "done",
            ProcessingState::Retryable => "retryable",
            ProcessingState::Dead => "dead",
        }
    }
}

impl fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The current run of retryable failures at the tail of a log
///
/// The run starts after the last `succeeded`, `failed-terminal`, or
/// administrative reset entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryStreak {
    /// `failed-retryable` entries in the run
    pub failures: u32,
    /// `attempted` entries in the run
    pub attempts: u32,
}

impl RetryStreak {
    /// Measure the streak at the end of a history
    pub fn measure(history: &[ProcessingLogEntry]) -> Self {
        let mut streak = Self::default();
        for entry in history.iter().rev() {
            match entry.outcome {
                ProcessingOutcome::Attempted => streak.attempts += 1,
                ProcessingOutcome::FailedRetryable if entry.is_reset() => break,
                ProcessingOutcome::FailedRetryable => streak.failures += 1,
                ProcessingOutcome::Succeeded | ProcessingOutcome::FailedTerminal => break,
            }
        }
        streak
    }
}
