//! Status command implementation
//!
//! Shows, per partition, how many records are in each derived state.

use super::{connect, load, parse_document_type, try_code, EXIT_FATAL, EXIT_OK};
use crate::adapters::database::Storage;
use crate::core::processing::ProcessingState;
use crate::domain::{DocumentType, Result};
use clap::Args;
use std::collections::BTreeMap;

const PAGE_SIZE: usize = 500;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Only show this document type
    #[arg(long)]
    pub document_type: Option<String>,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking processing status");

        let types = match &self.document_type {
            Some(name) => vec![try_code!(parse_document_type(name))],
            None => DocumentType::ALL.to_vec(),
        };

        let config = try_code!(load(config_path));
        let storage = try_code!(connect(&config).await);

        println!("📊 Processing Status");
        println!();
        println!(
            "{:<20} {:>8} {:>12} {:>10} {:>8} {:>10} {:>8}",
            "Document Type", "Total", "Unprocessed", "In Flight", "Done", "Retryable", "Dead"
        );
        println!("{}", "-".repeat(82));

        for document_type in types {
            let counts = match count_states(&storage, document_type).await {
                Ok(c) => c,
                Err(e) => {
                    println!("❌ Failed to read {document_type}");
                    println!("   Error: {e}");
                    return Ok(EXIT_FATAL);
                }
            };
            let get = |state| counts.get(&state).copied().unwrap_or(0);
            let total: u64 = counts.values().sum();

            println!(
                "{:<20} {:>8} {:>12} {:>10} {:>8} {:>10} {:>8}",
                document_type.as_str(),
                total,
                get(ProcessingState::Unprocessed),
                get(ProcessingState::InFlight),
                get(ProcessingState::Done),
                get(ProcessingState::Retryable),
                get(ProcessingState::Dead),
            );
        }

        println!();
        Ok(EXIT_OK)
    }
}

/// Count a partition's records by derived state
pub async fn count_states(
    storage: &Storage,
    document_type: DocumentType,
) -> Result<BTreeMap<ProcessingState, u64>> {
    let mut counts = BTreeMap::new();
    let mut after = None;

    loop {
        let page = storage
            .receiving
            .list(document_type, after, PAGE_SIZE)
            .await?;
        let Some(last) = page.last() else {
            break;
        };
        after = Some(last.id);

        let ids: Vec<_> = page.iter().map(|r| r.id).collect();
        let histories = storage.log.histories(document_type, &ids).await?;

        for id in &ids {
            let state = histories
                .get(id)
                .map(|h| ProcessingState::from_history(h))
                .unwrap_or(ProcessingState::Unprocessed);
            *counts.entry(state).or_insert(0) += 1;
        }

        if page.len() < PAGE_SIZE {
            break;
        }
    }

    Ok(counts)
}
