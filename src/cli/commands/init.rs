//! Init command implementation
//!
//! Writes a commented starter `harbor.toml`.

use super::{EXIT_CONFIG, EXIT_FATAL, EXIT_OK};
use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "harbor.toml")]
    pub output: String,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing Harbor configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(EXIT_CONFIG);
        }

        match fs::write(&self.output, CONFIG_TEMPLATE) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your settings", self.output);
                println!("  2. Set HARBOR_DATABASE_URL (or put it in a .env file)");
                println!("  3. Validate configuration: harbor validate-config");
                println!("  4. Receive a document: harbor receive enrollment --file doc.json");
                println!("  5. Run the ETL: harbor etl");
                println!();
                Ok(EXIT_OK)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {e}");
                Ok(EXIT_FATAL)
            }
        }
    }
}

const CONFIG_TEMPLATE: &str = r#"# Harbor Configuration File
# Receiving store, processing log and warehouse ETL

# Storage backend (postgresql; memory is for embedding and tests only)
database_target = "postgresql"

[application]
# Log level (trace, debug, info, warn, error)
log_level = "info"

# Derive and transform without writing anything
dry_run = false

[postgresql]
connection_string = "${HARBOR_DATABASE_URL}"
max_connections = 10
connection_timeout_seconds = 30
statement_timeout_seconds = 60
# disable | prefer | require
ssl_mode = "prefer"

[etl]
# Empty list means every document type
document_types = []
batch_size = 100
# max_records_per_pass = 1000
poll_interval_seconds = 30
workers = 1
shutdown_timeout_secs = 30

# Default scheduling policy
[etl.policy]
# An attempt with no outcome after this long may be taken over
stale_after_seconds = 900
# Retry backoff: initial * multiplier^(failures - 1), capped at max
backoff_initial_seconds = 30
backoff_multiplier = 2.0
backoff_max_seconds = 3600
# Mark records dead after this many attempts (unset = never)
# terminal_after_attempts = 10

# Per document type overrides
# [etl.policies.fhir]
# stale_after_seconds = 1800

[logging]
local_enabled = false
local_path = "/var/log/harbor"
# daily | hourly | never
local_rotation = "daily"
"#;
