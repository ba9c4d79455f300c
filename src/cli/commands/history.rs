//! History command implementation
//!
//! Prints a record's processing log, oldest entry first.

use super::{connect, load, parse_record_key, try_code, EXIT_FATAL, EXIT_OK};
use crate::core::processing::{ProcessingLogManager, ProcessingState};
use crate::domain::{ProcessingLogEntry, RecordKey};
use clap::Args;
use serde::Serialize;

/// Arguments for the history command
#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Document type of the record
    pub document_type: String,

    /// Record id within the document type's partition
    pub id: i64,

    /// Print machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct HistoryReport<'a> {
    record: String,
    received_at: Option<String>,
    state: ProcessingState,
    entries: &'a [ProcessingLogEntry],
}

impl HistoryArgs {
    /// Execute the history command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let key = try_code!(parse_record_key(&self.document_type, self.id));
        let config = try_code!(load(config_path));
        let storage = try_code!(connect(&config).await);

        let record = match storage.receiving.get(key).await {
            Ok(Some(r)) => r,
            Ok(None) => {
                println!("❌ No such record: {key}");
                return Ok(EXIT_FATAL);
            }
            Err(e) => {
                println!("❌ Failed to load record {key}");
                println!("   Error: {e}");
                return Ok(EXIT_FATAL);
            }
        };

        let log = ProcessingLogManager::new(storage.log.clone());
        let history = match log.history(key).await {
            Ok(h) => h,
            Err(e) => {
                println!("❌ Failed to load processing log for {key}");
                println!("   Error: {e}");
                return Ok(EXIT_FATAL);
            }
        };
        let state = ProcessingState::from_history(&history);

        if self.json {
            let report = HistoryReport {
                record: key.to_string(),
                received_at: Some(record.received_at.to_rfc3339()),
                state,
                entries: &history,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_history(key, &record.received_at.format("%Y-%m-%d %H:%M:%S").to_string(), state, &history);
        }

        Ok(EXIT_OK)
    }
}

fn print_history(key: RecordKey, received_at: &str, state: ProcessingState, history: &[ProcessingLogEntry]) {
    println!("📜 Processing history for {key}");
    println!("  Received: {received_at}");
    println!("  State: {state}");
    println!();

    if history.is_empty() {
        println!("No processing log entries yet.");
        return;
    }

    println!(
        "{:<5} {:<18} {:<10} {:<21} Detail",
        "Seq", "Outcome", "Revision", "Logged At"
    );
    println!("{}", "-".repeat(100));
    for entry in history {
        let revision = entry
            .revision
            .map(|r| r.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<5} {:<18} {:<10} {:<21} {}",
            entry.sequence_number,
            entry.outcome.as_str(),
            revision,
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.detail
        );
    }
    println!();
}
