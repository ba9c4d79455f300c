//! Configuration management for Harbor.
//!
//! Harbor reads a TOML file with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `HARBOR_<SECTION>_<KEY>` environment overrides
//! - Default values for everything but the database connection
//! - Validation on load
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level and dry-run mode
//! - [`PostgreSQLConfig`] - Connection pool and TLS settings
//! - [`EtlConfig`] - Partitions, paging, workers, and scheduling policy
//! - [`LoggingConfig`] - Local JSON file logging
//!
//! # Example Configuration
//!
//! ```toml
//! database_target = "postgresql"
//!
//! [application]
//! log_level = "info"
//!
//! [postgresql]
//! connection_string = "${HARBOR_DATABASE_URL}"
//! ssl_mode = "require"
//!
//! [etl]
//! document_types = ["enrollment", "fhir"]
//! workers = 2
//!
//! [etl.policy]
//! stale_after_seconds = 900
//! backoff_initial_seconds = 30
//!
//! [etl.policies.fhir]
//! terminal_after_attempts = 10
//! ```
//!
//! # Validation
//!
//! ```rust,no_run
//! use harbor::config::load_config;
//!
//! match load_config("harbor.toml") {
//!     Ok(config) => println!("Configuration valid: {:?}", config.database_target),
//!     Err(e) => eprintln!("Configuration error: {e}"),
//! }
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

pub use loader::{load_config, load_config_str};
pub use schema::{
    ApplicationConfig, DatabaseTarget, EtlConfig, HarborConfig, LoggingConfig, PolicyConfig,
    PolicyOverride, PostgreSQLConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
