//! Storage backends for Harbor.
//!
//! - [`database`] - Storage traits and the backend factory
//! - [`postgresql`] - PostgreSQL implementation
//! - [`memory`] - In-process implementation
//!
//! # Design Pattern
//!
//! Backends follow the **Adapter Pattern**: the core only sees the traits in
//! [`database::traits`], so every orchestrator behavior can be exercised
//! against [`memory::MemoryStore`] without a database.
//!
//! ```rust
//! use harbor::adapters::database::Storage;
//!
//! let storage = Storage::in_memory();
//! assert_eq!(storage.backend.backend_name(), "memory");
//! ```

pub mod database;
pub mod memory;
pub mod postgresql;
