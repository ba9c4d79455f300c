//! CLI command implementations
//!
//! Every command returns a process exit code:
//! 0 ok, 2 configuration error, 3 validation error, 4 connection error,
//! 5 fatal error.

pub mod etl;
pub mod history;
pub mod init;
pub mod receive;
pub mod reset;
pub mod status;
pub mod validate;

use crate::adapters::database::{create_storage, Storage};
use crate::config::{load_config, DatabaseTarget, HarborConfig};
use crate::domain::{DocumentType, RecordId, RecordKey};
use crate::log_error_with_context;
use std::str::FromStr;

/// Exit code: success
pub const EXIT_OK: i32 = 0;
/// Exit code: configuration could not be loaded or is invalid
pub const EXIT_CONFIG: i32 = 2;
/// Exit code: input failed validation
pub const EXIT_VALIDATION: i32 = 3;
/// Exit code: the database could not be reached
pub const EXIT_CONNECTION: i32 = 4;
/// Exit code: anything else
pub const EXIT_FATAL: i32 = 5;

/// Load the configuration, printing the failure
fn load(config_path: &str) -> Result<HarborConfig, i32> {
    load_config(config_path).map_err(|e| {
        println!("❌ Failed to load configuration file");
        println!("   Error: {e}");
        EXIT_CONFIG
    })
}

/// Connect to the configured backend and make sure the schema exists
///
/// The memory backend is refused: nothing a command writes to it survives
/// the process.
async fn connect(config: &HarborConfig) -> Result<Storage, i32> {
    if config.database_target == DatabaseTarget::Memory {
        println!("❌ database_target = \"memory\" is not durable");
        println!("   Commands need a persistent backend; set database_target = \"postgresql\"");
        return Err(EXIT_CONFIG);
    }

    let storage = create_storage(config).await.map_err(|e| {
        log_error_with_context!(&e, "Failed to create storage");
        println!("❌ Failed to connect to database");
        println!("   Error: {e}");
        EXIT_CONNECTION
    })?;

    if let Err(e) = storage.backend.test_connection().await {
        log_error_with_context!(&e, "Database connection test failed");
        println!("❌ Database connection test failed");
        println!("   Error: {e}");
        return Err(EXIT_CONNECTION);
    }

    if let Err(e) = storage.backend.ensure_schema().await {
        log_error_with_context!(&e, "Schema migration failed");
        println!("❌ Failed to prepare database schema");
        println!("   Error: {e}");
        return Err(EXIT_FATAL);
    }

    Ok(storage)
}

/// Parse a document type argument, printing the failure
fn parse_document_type(value: &str) -> Result<DocumentType, i32> {
    DocumentType::from_str(value).map_err(|e| {
        println!("❌ {e}");
        let known: Vec<&str> = DocumentType::ALL.iter().map(|t| t.as_str()).collect();
        println!("   Known types: {}", known.join(", "));
        EXIT_VALIDATION
    })
}

/// Parse a `<type> <id>` pair into a record key
fn parse_record_key(document_type: &str, id: i64) -> Result<RecordKey, i32> {
    let document_type = parse_document_type(document_type)?;
    let id = RecordId::new(id).map_err(|e| {
        println!("❌ Invalid record id: {e}");
        EXIT_VALIDATION
    })?;
    Ok(RecordKey::new(document_type, id))
}

/// Collapse an early-exit `Result` into its exit code
macro_rules! try_code {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(code) => return Ok(code),
        }
    };
}
pub(crate) use try_code;
