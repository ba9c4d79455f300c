//! Logging and observability
//!
//! Structured logging built on `tracing`:
//! - Console output for operators
//! - JSON-formatted file logs with daily or hourly rotation
//! - Level from configuration, overridable with `RUST_LOG`
//!
//! # Example
//!
//! ```no_run
//! use harbor::logging::init_logging;
//! use harbor::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!(document_type = "fhir", "Application started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log the start of an ETL pass
///
/// # Example
///
/// ```no_run
/// use harbor::log_pass_start;
/// use harbor::domain::WorkerId;
///
/// let worker_id = WorkerId::generate();
/// log_pass_start!(&worker_id, 3, false);
/// ```
#[macro_export]
macro_rules! log_pass_start {
    ($worker_id:expr, $partitions:expr, $dry_run:expr) => {
        tracing::info!(
            worker_id = %$worker_id,
            partitions = $partitions,
            dry_run = $dry_run,
            "Starting ETL pass"
        );
    };
}

/// Log the completion of an ETL pass
///
/// # Example
///
/// ```no_run
/// use harbor::log_pass_complete;
/// use harbor::domain::WorkerId;
/// use std::time::Duration;
///
/// let worker_id = WorkerId::generate();
/// log_pass_complete!(&worker_id, 12, Duration::from_millis(250));
/// ```
#[macro_export]
macro_rules! log_pass_complete {
    ($worker_id:expr, $resolved:expr, $duration:expr) => {
        tracing::info!(
            worker_id = %$worker_id,
            resolved = $resolved,
            duration_ms = $duration.as_millis() as u64,
            "ETL pass finished"
        );
    };
}

/// Log the outcome appended for one record
///
/// # Example
///
/// ```no_run
/// use harbor::log_record_outcome;
/// use harbor::domain::{DocumentType, ProcessingOutcome, RecordId, RecordKey};
///
/// let key = RecordKey::new(DocumentType::Fhir, RecordId::new(1).unwrap());
/// log_record_outcome!(&key, 2, ProcessingOutcome::Succeeded);
/// ```
#[macro_export]
macro_rules! log_record_outcome {
    ($key:expr, $sequence:expr, $outcome:expr) => {
        match $outcome {
            $crate::domain::ProcessingOutcome::FailedTerminal => tracing::warn!(
                record = %$key,
                sequence = $sequence,
                outcome = %$outcome,
                "Record failed terminally"
            ),
            _ => tracing::info!(
                record = %$key,
                sequence = $sequence,
                outcome = %$outcome,
                "Record processed"
            ),
        }
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use harbor::log_error_with_context;
/// use harbor::domain::HarborError;
///
/// let error = HarborError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}
