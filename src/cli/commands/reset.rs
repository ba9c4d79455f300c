//! Reset command implementation
//!
//! Returns a dead record to eligibility so the next pass retries it.

use super::{connect, load, parse_record_key, try_code, EXIT_FATAL, EXIT_OK, EXIT_VALIDATION};
use crate::core::processing::ProcessingLogManager;
use crate::domain::HarborError;
use clap::Args;

/// Arguments for the reset command
#[derive(Args, Debug)]
pub struct ResetArgs {
    /// Document type of the record
    pub document_type: String,

    /// Record id within the document type's partition
    pub id: i64,

    /// Why the record is being reset (kept in the log)
    #[arg(short, long, default_value = "manual reset")]
    pub reason: String,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

impl ResetArgs {
    /// Execute the reset command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let key = try_code!(parse_record_key(&self.document_type, self.id));
        let config = try_code!(load(config_path));
        let storage = try_code!(connect(&config).await);
        let log = ProcessingLogManager::new(storage.log.clone());

        if !self.yes {
            print!("Reset {key} (reason: {})? [y/N]: ", self.reason);
            use std::io::{self, Write};
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Reset cancelled.");
                return Ok(EXIT_OK);
            }
        }

        match log.reset(key, &self.reason).await {
            Ok(sequence) => {
                println!("✅ Reset {key} (log entry {sequence})");
                println!("   It will be retried on the next ETL pass");
                Ok(EXIT_OK)
            }
            Err(HarborError::State(message)) => {
                println!("❌ Cannot reset {key}");
                println!("   {message}");
                Ok(EXIT_VALIDATION)
            }
            Err(e) => {
                tracing::error!(record = %key, error = %e, "Reset failed");
                println!("❌ Failed to reset {key}");
                println!("   Error: {e}");
                Ok(EXIT_FATAL)
            }
        }
    }
}
