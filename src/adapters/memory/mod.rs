//! In-process storage backend
//!
//! Used by the test suite, by dry experiments (`database_target = "memory"`),
//! and when embedding Harbor in another process.

pub mod store;

pub use store::MemoryStore;
