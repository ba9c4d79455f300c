//! ETL command implementation
//!
//! Runs the orchestrator, either for a single pass (`--once`) or as a
//! long-running worker pool until a shutdown signal arrives.

use super::{connect, load, parse_document_type, try_code, EXIT_CONFIG, EXIT_FATAL, EXIT_OK};
use crate::core::etl::{EtlOrchestrator, EtlSettings, PartitionSummary, RunSummary, TransformRegistry};
use clap::Args;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Arguments for the etl command
#[derive(Args, Debug)]
pub struct EtlArgs {
    /// Run a single pass and exit
    #[arg(long)]
    pub once: bool,

    /// Derive and transform, but write nothing to the log or warehouse
    #[arg(long)]
    pub dry_run: bool,

    /// Restrict to these document types
    #[arg(long = "document-type", value_delimiter = ',')]
    pub document_types: Vec<String>,

    /// Number of concurrent workers (overrides etl.workers)
    #[arg(short, long)]
    pub workers: Option<usize>,
}

impl EtlArgs {
    /// Execute the etl command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting etl command");

        let config = try_code!(load(config_path));
        let dry_run = self.dry_run || config.application.dry_run;

        let mut settings = match EtlSettings::from_config(&config.etl, dry_run) {
            Ok(s) => s,
            Err(e) => {
                println!("❌ Invalid ETL configuration");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        if !self.document_types.is_empty() {
            let mut types = Vec::with_capacity(self.document_types.len());
            for name in &self.document_types {
                types.push(try_code!(parse_document_type(name)));
            }
            tracing::info!(document_types = ?types, "Overriding document types from CLI");
            settings = settings.with_document_types(types);
        }

        let workers = self.workers.unwrap_or(config.etl.workers).max(1);
        let shutdown_timeout = Duration::from_secs(config.etl.shutdown_timeout_secs);

        let storage = try_code!(connect(&config).await);
        let transforms = TransformRegistry::with_defaults();
        tracing::debug!(
            document_types = ?transforms.document_types(),
            "Registered transforms"
        );
        let orchestrator = match EtlOrchestrator::new(&storage, transforms, settings) {
            Ok(o) => o.with_shutdown(shutdown_signal.clone()),
            Err(e) => {
                println!("❌ Failed to initialize ETL");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        if dry_run {
            println!("🔍 DRY RUN MODE - No data will be written to the database");
            println!();
        }

        let partitions: Vec<&str> = orchestrator
            .settings()
            .document_types
            .iter()
            .map(|t| t.as_str())
            .collect();
        println!("🚀 Starting ETL ({workers} worker(s))");
        println!("  Partitions: {}", partitions.join(", "));
        if !self.once {
            println!(
                "  Poll interval: {}s (Ctrl+C to stop)",
                orchestrator.settings().poll_interval.as_secs()
            );
        }
        println!();

        let started = Instant::now();
        let run = async {
            if self.once {
                let mut run = RunSummary::default();
                for pass in orchestrator.run_pass_with_workers(workers).await {
                    pass.log_summary();
                    run.record(&pass);
                }
                run
            } else {
                orchestrator.run_workers(workers).await
            }
        };

        let summary = tokio::select! {
            summary = run => summary,
            _ = shutdown_deadline(shutdown_signal.clone(), shutdown_timeout) => {
                tracing::error!(
                    timeout_secs = shutdown_timeout.as_secs(),
                    "Workers did not stop within the shutdown timeout"
                );
                println!("❌ Workers did not stop within {}s; exiting", shutdown_timeout.as_secs());
                println!("   Claims left in flight will be taken over once stale");
                return Ok(EXIT_FATAL);
            }
        };

        print_summary(&summary.totals, summary.passes, started.elapsed(), dry_run);

        if *shutdown_signal.borrow() {
            println!("⚠️  ETL stopped by shutdown signal");
            println!("   Unfinished records will be picked up on the next run");
        }

        if summary.totals.errors.is_empty() {
            println!("✅ ETL completed successfully!");
            Ok(EXIT_OK)
        } else {
            println!("⚠️  ETL completed with errors:");
            for error in summary.totals.errors.iter().take(10) {
                println!("  - {error}");
            }
            if summary.totals.errors.len() > 10 {
                println!("  ... and {} more", summary.totals.errors.len() - 10);
            }
            Ok(EXIT_FATAL)
        }
    }
}

/// Resolves `timeout` after shutdown is requested; never resolves otherwise
async fn shutdown_deadline(mut signal: watch::Receiver<bool>, timeout: Duration) {
    if signal.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
    tokio::time::sleep(timeout).await;
}

fn print_summary(totals: &PartitionSummary, passes: usize, elapsed: Duration, dry_run: bool) {
    println!();
    println!("📊 ETL Summary:");
    println!("  Passes: {passes}");
    println!("  Examined: {}", totals.examined);
    println!("  Candidates: {}", totals.candidates);
    if dry_run {
        println!("  Would succeed: {}", totals.succeeded);
        println!("  Would skip: {}", totals.skipped);
        println!("  Would fail (retryable): {}", totals.failed_retryable);
        println!("  Would fail (terminal): {}", totals.failed_terminal);
    } else {
        println!("  Claimed: {}", totals.claimed);
        println!("  Lost races: {}", totals.lost_races);
        println!("  Succeeded: {}", totals.succeeded);
        println!("  Skipped: {}", totals.skipped);
        println!("  Failed (retryable): {}", totals.failed_retryable);
        println!("  Failed (terminal): {}", totals.failed_terminal);
    }
    println!("  Duration: {:.2}s", elapsed.as_secs_f64());
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deadline_waits_for_signal() {
        let (tx, rx) = watch::channel(false);
        let deadline = shutdown_deadline(rx, Duration::from_millis(10));
        tokio::pin!(deadline);

        let early = tokio::time::timeout(Duration::from_millis(50), &mut deadline).await;
        assert!(early.is_err());

        tx.send(true).unwrap();
        let fired = tokio::time::timeout(Duration::from_millis(500), &mut deadline).await;
        assert!(fired.is_ok());
    }

    #[tokio::test]
    async fn test_deadline_never_fires_without_sender() {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        let fired =
            tokio::time::timeout(Duration::from_millis(50), shutdown_deadline(rx, Duration::ZERO))
                .await;
        assert!(fired.is_err());
    }
}
