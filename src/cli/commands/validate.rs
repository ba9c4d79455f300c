//! Validate config command implementation
//!
//! Loads the configuration file and prints what it resolved to.

use super::{EXIT_CONFIG, EXIT_OK};
use crate::adapters::postgresql::client::redact_connection_string;
use crate::config::load_config;
use crate::config::schema::DatabaseTarget;
use crate::core::etl::{EtlPolicy, EtlSettings};
use clap::Args;
use secrecy::ExposeSecret;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // load_config validates before returning
        let config = match load_config(config_path) {
            Ok(c) => {
                println!("✅ Configuration file loaded successfully");
                c
            }
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        let settings = match EtlSettings::from_config(&config.etl, config.application.dry_run) {
            Ok(s) => s,
            Err(e) => {
                println!("❌ Invalid [etl] section");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Dry Run: {}", config.application.dry_run);

        match config.database_target {
            DatabaseTarget::Memory => {
                println!("  Database Target: memory (library and tests only; CLI commands refuse it)");
            }
            DatabaseTarget::PostgreSQL => {
                if let Some(ref pg_config) = config.postgresql {
                    println!("  Database Target: PostgreSQL");
                    println!(
                        "  PostgreSQL Connection: {}",
                        redact_connection_string(pg_config.connection_string.expose_secret().as_ref())
                    );
                    println!("  Max Connections: {}", pg_config.max_connections);
                    println!("  SSL Mode: {}", pg_config.ssl_mode);
                }
            }
        }

        let types: Vec<&str> = settings.document_types.iter().map(|t| t.as_str()).collect();
        println!("  Document Types: {}", types.join(", "));
        println!("  Batch Size: {}", settings.batch_size);
        println!("  Workers: {}", config.etl.workers);
        println!("  Poll Interval: {}s", settings.poll_interval.as_secs());

        let policy = EtlPolicy::from(&config.etl.policy);
        println!("  Stale After: {}s", policy.stale_after.as_secs());
        println!(
            "  Backoff: {}s x{} up to {}s",
            policy.backoff_initial.as_secs(),
            policy.backoff_multiplier,
            policy.backoff_max.as_secs()
        );
        match policy.terminal_after_attempts {
            Some(n) => println!("  Escalate After: {n} attempts"),
            None => println!("  Escalate After: never"),
        }
        if !config.etl.policies.is_empty() {
            let mut overridden: Vec<&String> = config.etl.policies.keys().collect();
            overridden.sort();
            println!("  Policy Overrides: {overridden:?}");
        }
        println!();

        Ok(EXIT_OK)
    }
}
