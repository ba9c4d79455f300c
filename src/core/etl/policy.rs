//! Per-type ETL policy
//!
//! Decides when a record is offered to a worker: how long a claim may sit
//! unresolved before another worker may take it over, how long a retryable
//! failure waits before the next attempt, and whether repeated retryable
//! failures are ever escalated to terminal.

use crate::config::schema::{EtlConfig, PolicyConfig, PolicyOverride};
use crate::core::processing::state::{ProcessingState, RetryStreak};
use crate::domain::document::DocumentType;
use crate::domain::log::ProcessingLogEntry;
use crate::domain::{HarborError, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

/// Why a record is being offered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Candidate {
    /// Never processed
    Unprocessed,
    /// Retryable failure whose backoff has elapsed
    Retry,
    /// Claimed by a worker that did not resolve it in time
    StaleClaim,
    /// Succeeded under an older transform revision
    StaleRevision,
}

impl Candidate {
    /// Name used in logs and log entry details
    pub fn as_str(&self) -> &'static str {
        match self {
            Candidate::Unprocessed => "unprocessed",
            Candidate::Retry => "retry",
            Candidate::StaleClaim => "stale-claim",
            Candidate::StaleRevision => "stale-revision",
        }
    }
}

/// Scheduling policy for one document type
#[derive(Debug, Clone, PartialEq)]
pub struct EtlPolicy {
    /// Age after which an unresolved claim may be taken over
    pub stale_after: Duration,

    /// Delay before the first retry
    pub backoff_initial: Duration,

    /// Growth factor between consecutive retries
    pub backoff_multiplier: f64,

    /// Upper bound on the retry delay
    pub backoff_max: Duration,

    /// Escalate to terminal after this many attempts in one retry run
    pub terminal_after_attempts: Option<u32>,
}

impl Default for EtlPolicy {
    fn default() -> Self {
        Self::from(&PolicyConfig::default())
    }
}

impl From<&PolicyConfig> for EtlPolicy {
    fn from(config: &PolicyConfig) -> Self {
        Self {
            stale_after: Duration::from_secs(config.stale_after_seconds),
            backoff_initial: Duration::from_secs(config.backoff_initial_seconds),
            backoff_multiplier: config.backoff_multiplier,
            backoff_max: Duration::from_secs(config.backoff_max_seconds),
            terminal_after_attempts: config.terminal_after_attempts,
        }
    }
}

impl EtlPolicy {
    /// Apply a partial override on top of this policy
    pub fn merged(&self, o: &PolicyOverride) -> Self {
        Self {
            stale_after: o
                .stale_after_seconds
                .map(Duration::from_secs)
                .unwrap_or(self.stale_after),
            backoff_initial: o
                .backoff_initial_seconds
                .map(Duration::from_secs)
                .unwrap_or(self.backoff_initial),
            backoff_multiplier: o.backoff_multiplier.unwrap_or(self.backoff_multiplier),
            backoff_max: o
                .backoff_max_seconds
                .map(Duration::from_secs)
                .unwrap_or(self.backoff_max),
            terminal_after_attempts: o
                .terminal_after_attempts
                .or(self.terminal_after_attempts),
        }
    }

    /// Delay before retry number `failures`
    ///
    /// `min(initial * multiplier^(failures - 1), max)`, and zero when there
    /// have been no failures.
    ///
    /// # Examples
    ///
    /// ```
    /// use harbor::core::etl::EtlPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = EtlPolicy {
    ///     backoff_initial: Duration::from_secs(10),
    ///     backoff_multiplier: 2.0,
    ///     backoff_max: Duration::from_secs(60),
    ///     ..EtlPolicy::default()
    /// };
    /// assert_eq!(policy.backoff_delay(1), Duration::from_secs(10));
    /// assert_eq!(policy.backoff_delay(3), Duration::from_secs(40));
    /// assert_eq!(policy.backoff_delay(4), Duration::from_secs(60));
    /// ```
    pub fn backoff_delay(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(failures - 1).unwrap_or(i32::MAX);
        let secs = self.backoff_initial.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.backoff_max.as_secs_f64() {
            self.backoff_max
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    /// Whether a record with this history should be offered at `now`
    ///
    /// `revision` is the current revision of the record's transform.
    pub fn candidate(
        &self,
        history: &[ProcessingLogEntry],
        revision: u32,
        now: DateTime<Utc>,
    ) -> Option<Candidate> {
        let Some(latest) = history.last() else {
            return Some(Candidate::Unprocessed);
        };
        let age = now.signed_duration_since(latest.timestamp);

        match ProcessingState::derive(Some(latest)) {
            ProcessingState::Unprocessed => Some(Candidate::Unprocessed),
            ProcessingState::InFlight => {
                elapsed(age, self.stale_after).then_some(Candidate::StaleClaim)
            }
            ProcessingState::Retryable => {
                let streak = RetryStreak::measure(history);
                elapsed(age, self.backoff_delay(streak.failures)).then_some(Candidate::Retry)
            }
            ProcessingState::Done => match latest.revision {
                Some(done_at) if done_at < revision => Some(Candidate::StaleRevision),
                _ => None,
            },
            ProcessingState::Dead => None,
        }
    }

    /// Whether a retryable failure on the attempt just made should be
    /// recorded as terminal instead
    ///
    /// `history` is the log before the failure is appended, so it ends with
    /// the claim of the attempt.
    pub fn escalates(&self, history: &[ProcessingLogEntry]) -> bool {
        match self.terminal_after_attempts {
            Some(limit) => RetryStreak::measure(history).attempts >= limit,
            None => false,
        }
    }
}

fn elapsed(age: chrono::Duration, threshold: Duration) -> bool {
    match chrono::Duration::from_std(threshold) {
        Ok(threshold) => age >= threshold,
        Err(_) => false,
    }
}

/// Default policy plus per-type overrides
#[derive(Debug, Clone, Default)]
pub struct PolicySet {
    default: EtlPolicy,
    overrides: HashMap<DocumentType, EtlPolicy>,
}

impl PolicySet {
    /// Same policy for every type
    pub fn uniform(policy: EtlPolicy) -> Self {
        Self {
            default: policy,
            overrides: HashMap::new(),
        }
    }

    /// Build from the `[etl]` configuration section
    ///
    /// # Errors
    ///
    /// Returns `HarborError::Configuration` if an override names an unknown
    /// document type.
    pub fn from_config(config: &EtlConfig) -> Result<Self> {
        let default = EtlPolicy::from(&config.policy);
        let mut set = Self::uniform(default.clone());

        for (name, o) in &config.policies {
            let document_type = DocumentType::from_str(name).map_err(|e| {
                HarborError::Configuration(format!("etl.policies.{name}: {e}"))
            })?;
            set = set.with_override(document_type, default.merged(o));
        }

        Ok(set)
    }

    /// Override the policy for one type
    pub fn with_override(mut self, document_type: DocumentType, policy: EtlPolicy) -> Self {
        self.overrides.insert(document_type, policy);
        self
    }

    /// Policy in force for a type
    pub fn for_type(&self, document_type: DocumentType) -> &EtlPolicy {
        self.overrides.get(&document_type).unwrap_or(&self.default)
    }
}
