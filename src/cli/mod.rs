//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Harbor using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Harbor - receiving store and warehouse ETL
#[derive(Parser, Debug)]
#[command(name = "harbor")]
#[command(version, about, long_about = None)]
#[command(author = "Harbor Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "harbor.toml", env = "HARBOR_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "HARBOR_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate and append documents to the receiving store
    Receive(commands::receive::ReceiveArgs),

    /// Process received documents into the warehouse
    Etl(commands::etl::EtlArgs),

    /// Show a record's processing log
    History(commands::history::HistoryArgs),

    /// Make a dead record eligible for processing again
    Reset(commands::reset::ResetArgs),

    /// Show record counts by processing state
    Status(commands::status::StatusArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_etl() {
        let cli = Cli::parse_from(["harbor", "etl"]);
        assert_eq!(cli.config, "harbor.toml");
        match cli.command {
            Commands::Etl(args) => {
                assert!(!args.once);
                assert!(args.document_types.is_empty());
                assert!(args.workers.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_etl_overrides() {
        let cli = Cli::parse_from([
            "harbor",
            "etl",
            "--once",
            "--dry-run",
            "--document-type",
            "fhir,kit",
            "--workers",
            "3",
        ]);
        let Commands::Etl(args) = cli.command else {
            panic!("expected etl");
        };
        assert!(args.once);
        assert!(args.dry_run);
        assert_eq!(args.document_types, vec!["fhir", "kit"]);
        assert_eq!(args.workers, Some(3));
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli = Cli::parse_from(["harbor", "--config", "custom.toml", "status"]);
        assert_eq!(cli.config, "custom.toml");
    }

    #[test]
    fn test_cli_parse_with_log_level() {
        let cli = Cli::parse_from(["harbor", "--log-level", "debug", "status"]);
        assert_eq!(cli.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_cli_parse_receive() {
        let cli = Cli::parse_from(["harbor", "receive", "enrollment", "--file", "a.ndjson", "--ndjson"]);
        let Commands::Receive(args) = cli.command else {
            panic!("expected receive");
        };
        assert_eq!(args.document_type, "enrollment");
        assert!(args.ndjson);
        assert_eq!(args.file.as_deref(), Some(std::path::Path::new("a.ndjson")));
    }

    #[test]
    fn test_cli_parse_history_and_reset() {
        let cli = Cli::parse_from(["harbor", "history", "fhir", "12", "--json"]);
        assert!(matches!(cli.command, Commands::History(ref a) if a.id == 12 && a.json));

        let cli = Cli::parse_from(["harbor", "reset", "fhir", "12", "--reason", "fixed", "--yes"]);
        assert!(matches!(cli.command, Commands::Reset(ref a) if a.reason == "fixed" && a.yes));
    }

    #[test]
    fn test_cli_requires_record_id() {
        assert!(Cli::try_parse_from(["harbor", "history", "fhir"]).is_err());
        assert!(Cli::try_parse_from(["harbor", "history", "fhir", "abc"]).is_err());
    }

    #[test]
    fn test_cli_parse_validate_config() {
        let cli = Cli::parse_from(["harbor", "validate-config"]);
        assert!(matches!(cli.command, Commands::ValidateConfig(_)));
    }

    #[test]
    fn test_cli_parse_init() {
        let cli = Cli::parse_from(["harbor", "init", "--force"]);
        assert!(matches!(cli.command, Commands::Init(ref a) if a.force && a.output == "harbor.toml"));
    }
}
