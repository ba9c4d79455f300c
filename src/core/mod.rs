//! Core business logic for Harbor.
//!
//! # Modules
//!
//! - [`receiving`] - Validation and append into the receiving store
//! - [`processing`] - Processing logs and derived record state
//! - [`etl`] - Transform orchestration into the warehouse
//!
//! # Flow
//!
//! 1. **Receive**: a producer's payload is validated and appended verbatim
//! 2. **Select**: each pass derives every record's state from its log
//! 3. **Claim**: an `attempted` entry is appended if nobody else got there first
//! 4. **Transform**: the type's transform turns the payload into entities
//! 5. **Apply**: the warehouse writer upserts the entity set idempotently
//! 6. **Resolve**: the outcome is appended to the log
//!
//! # Example
//!
//! ```rust
//! use harbor::adapters::database::Storage;
//! use harbor::core::etl::{EtlOrchestrator, EtlSettings, TransformRegistry};
//! use harbor::core::receiving::ReceivingService;
//! use harbor::domain::DocumentType;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = Storage::in_memory();
//! let receiving = ReceivingService::new(storage.receiving.clone());
//! receiving.append(DocumentType::Enrollment, r#"{"participant":"abc"}"#).await?;
//!
//! let etl = EtlOrchestrator::new(&storage, TransformRegistry::with_defaults(), EtlSettings::default())?;
//! let summary = etl.run_pass().await;
//! assert_eq!(summary.totals().succeeded, 1);
//! # Ok(())
//! # }
//! ```

pub mod etl;
pub mod processing;
pub mod receiving;
