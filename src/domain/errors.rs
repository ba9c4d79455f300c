//! Domain error types
//!
//! This module defines the error hierarchy for Harbor. Ingestion-time
//! structural failures ([`ValidationError`]) are kept apart from the
//! transform-time classification ([`TransformError`], [`WarehouseError`])
//! because they travel to different audiences: the former goes back to the
//! producer, the latter only ever lands in the processing log.

use thiserror::Error;

/// Main Harbor error type
///
/// This is the primary error type used throughout the application.
#[derive(Debug, Error)]
pub enum HarborError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Payload failed its document type's structural invariant
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Database-related errors (generic)
    #[error("Database error: {0}")]
    Database(String),

    /// Network/connection errors
    #[error("Connection error: {0}")]
    Connection(String),

    /// Processing state errors (e.g. resetting a record that is not dead)
    #[error("State error: {0}")]
    State(String),

    /// Requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl HarborError {
    /// Whether this error came from the storage layer being unreachable or
    /// failing, as opposed to a problem with the caller's input.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, HarborError::Database(_) | HarborError::Connection(_))
    }
}

/// Structural validation failure raised while appending to the receiving store
///
/// Nothing is persisted when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The payload was empty or whitespace only
    #[error("{document_type} document is empty")]
    Empty { document_type: String },

    /// The payload could not be decoded as a JSON document
    #[error("{document_type} document is not well-formed JSON: {reason}")]
    Malformed {
        document_type: String,
        reason: String,
    },

    /// The payload decoded but has the wrong top-level shape
    #[error("{document_type} document must be a JSON {expected}, got {found}")]
    WrongShape {
        document_type: String,
        expected: String,
        found: String,
    },

    /// One line of an NDJSON batch failed validation
    #[error("line {line}: {source}")]
    Line {
        line: usize,
        #[source]
        source: Box<ValidationError>,
    },

    /// Unknown document type name
    #[error("unknown document type '{0}'")]
    UnknownDocumentType(String),
}

/// Classified failure of a type-specific transform
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    /// Reattempt is expected to succeed once external state changes
    /// (e.g. a referenced sample has not been received yet)
    #[error("retryable: {0}")]
    Retryable(String),

    /// The payload itself is semantically invalid
    #[error("terminal: {0}")]
    Terminal(String),
}

impl TransformError {
    /// Create a retryable error
    pub fn retryable(message: impl Into<String>) -> Self {
        TransformError::Retryable(message.into())
    }

    /// Create a terminal error
    pub fn terminal(message: impl Into<String>) -> Self {
        TransformError::Terminal(message.into())
    }

    /// Whether the error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransformError::Retryable(_))
    }
}

/// Classified failure of a warehouse apply
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WarehouseError {
    /// The warehouse could not commit right now (connection loss, lock
    /// timeout, serialization failure)
    #[error("transient warehouse failure: {0}")]
    Transient(String),

    /// The entity set can never be applied (constraint the data violates)
    #[error("terminal warehouse failure: {0}")]
    Terminal(String),
}

// Conversion from std::io::Error
impl From<std::io::Error> for HarborError {
    fn from(err: std::io::Error) -> Self {
        HarborError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for HarborError {
    fn from(err: serde_json::Error) -> Self {
        HarborError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for HarborError {
    fn from(err: toml::de::Error) -> Self {
        HarborError::Configuration(format!("TOML parse error: {err}"))
    }
}

impl From<WarehouseError> for HarborError {
    fn from(err: WarehouseError) -> Self {
        HarborError::Database(err.to_string())
    }
}
