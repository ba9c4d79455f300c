//! PostgreSQL storage backend
//!
//! Stores receiving partitions, the processing log, and the warehouse in a
//! single PostgreSQL database, in the `receiving` and `warehouse` schemas.

pub mod adapter;
pub mod client;
pub mod models;

pub use adapter::PostgreSQLAdapter;
pub use client::PostgreSQLClient;
