//! Domain models and types for Harbor.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Document types** ([`DocumentType`]) with their structural invariant ([`DocumentShape`])
//! - **Strongly-typed identifiers** ([`RecordId`], [`RecordKey`], [`WorkerId`])
//! - **Receiving and log models** ([`ReceivingRecord`], [`ProcessingLogEntry`])
//! - **Warehouse output** ([`WarehouseEntity`])
//! - **Error types** ([`HarborError`], [`ValidationError`], [`TransformError`], [`WarehouseError`])
//! - **Result type alias** ([`Result`])
//!
//! # Type Safety
//!
//! ```rust
//! use harbor::domain::{DocumentType, RecordId, RecordKey};
//!
//! let key = RecordKey::new(DocumentType::Fhir, RecordId::new(12).unwrap());
//! assert_eq!(key.to_string(), "fhir/12");
//! ```

pub mod document;
pub mod errors;
pub mod ids;
pub mod log;
pub mod record;
pub mod result;
pub mod warehouse;

// Re-export commonly used types for convenience
pub use document::{DocumentShape, DocumentType};
pub use errors::{HarborError, TransformError, ValidationError, WarehouseError};
pub use ids::{RecordId, RecordKey, WorkerId};
pub use log::{NewLogEntry, ProcessingLogEntry, ProcessingOutcome};
pub use record::ReceivingRecord;
pub use result::Result;
pub use warehouse::WarehouseEntity;
