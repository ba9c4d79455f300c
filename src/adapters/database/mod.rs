//! Storage abstraction layer
//!
//! Trait-based abstraction over the receiving store, the processing log, and
//! the warehouse, allowing Harbor to run against PostgreSQL or in memory.

pub mod factory;
pub mod traits;

pub use factory::{create_storage, Storage};
pub use traits::{ProcessingLogStorage, ReceivingStorage, StorageBackend, WarehouseWriter};
