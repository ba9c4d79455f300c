// Harbor - Receiving Store and Warehouse ETL
// Copyright (c) 2025 Harbor Contributors
// Licensed under the MIT License

//! # Harbor - Receiving Store and Warehouse ETL
//!
//! Harbor accepts heterogeneous documents from producers into an append-only,
//! type-partitioned receiving store, then moves them into a normalized
//! warehouse with an ETL process that can crash, retry and run concurrently
//! without losing or duplicating work.
//!
//! ## Overview
//!
//! - **Receiving**: payloads are structurally validated and stored verbatim
//! - **Processing log**: every record carries an append-only journal of
//!   attempts and outcomes; its processing state is derived from that journal
//!   and never stored
//! - **ETL**: passes select eligible records, claim them with a conditional
//!   log append, run the document type's transform and apply the resulting
//!   entities to the warehouse idempotently
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Receiving, processing log and ETL orchestration
//! - [`adapters`] - Storage backends (PostgreSQL, in-memory)
//! - [`domain`] - Core domain types and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use harbor::adapters::database::create_storage;
//! use harbor::config::load_config;
//! use harbor::core::etl::{EtlOrchestrator, EtlSettings, TransformRegistry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("harbor.toml")?;
//!     let storage = create_storage(&config).await?;
//!
//!     let settings = EtlSettings::from_config(&config.etl, config.application.dry_run)?;
//!     let etl = EtlOrchestrator::new(&storage, TransformRegistry::with_defaults(), settings)?;
//!
//!     let summary = etl.run_pass().await;
//!     println!("Succeeded: {}", summary.totals().succeeded);
//!     Ok(())
//! }
//! ```
//!
//! ## Failure handling
//!
//! A transform reports [`domain::TransformError::Retryable`] when a later
//! attempt may succeed and [`domain::TransformError::Terminal`] when the
//! payload itself is wrong. Retryable failures are re-offered after an
//! exponential backoff; terminal ones wait for an operator to reset them.
//! A worker that dies mid-record leaves an `attempted` entry behind that
//! other workers take over once it is older than the staleness threshold.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
