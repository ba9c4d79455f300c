//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{DatabaseTarget, HarborConfig};
use super::secret::secret_string;
use crate::domain::errors::HarborError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (`${VAR}` syntax)
/// 3. Parses the TOML into [`HarborConfig`]
/// 4. Applies environment variable overrides (`HARBOR_*` prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns `HarborError::Configuration` if the file cannot be read, a
/// referenced variable is unset, parsing fails, or validation fails.
///
/// # Examples
///
/// ```no_run
/// use harbor::config::loader::load_config;
///
/// let config = load_config("harbor.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<HarborConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(HarborError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        HarborError::Configuration(format!(
            "Failed to read configuration file {}: {e}",
            path.display()
        ))
    })?;

    load_config_str(&contents)
}

/// Loads configuration from TOML text
///
/// # Errors
///
/// Same as [`load_config`], minus file access.
pub fn load_config_str(contents: &str) -> Result<HarborConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: HarborConfig = toml::from_str(&contents)
        .map_err(|e| HarborError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        HarborError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format `${VAR_NAME}`
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error naming every referenced variable that is not set.
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| HarborError::Other(format!("Invalid substitution pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let processed = re.replace_all(line, |caps: &regex::Captures<'_>| {
            let var_name = &caps[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                    caps[0].to_string()
                }
            }
        });
        result.push_str(&processed);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(HarborError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(val) => val.parse().map(Some).map_err(|_| {
            HarborError::Configuration(format!("Invalid value '{val}' for {name}"))
        }),
        Err(_) => Ok(None),
    }
}

/// Applies environment variable overrides using the `HARBOR_*` prefix
///
/// Variables follow the pattern `HARBOR_<SECTION>_<KEY>`, for example
/// `HARBOR_ETL_BATCH_SIZE` or `HARBOR_POSTGRESQL_CONNECTION_STRING`.
fn apply_env_overrides(config: &mut HarborConfig) -> Result<()> {
    // Application overrides
    if let Ok(val) = std::env::var("HARBOR_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Some(val) = env_parse("HARBOR_APPLICATION_DRY_RUN")? {
        config.application.dry_run = val;
    }

    if let Ok(val) = std::env::var("HARBOR_DATABASE_TARGET") {
        config.database_target = match val.to_lowercase().as_str() {
            "postgresql" => DatabaseTarget::PostgreSQL,
            "memory" => DatabaseTarget::Memory,
            other => {
                return Err(HarborError::Configuration(format!(
                    "Invalid HARBOR_DATABASE_TARGET '{other}'. Must be postgresql or memory"
                )))
            }
        };
    }

    // PostgreSQL overrides (only if PostgreSQL is configured)
    if let Some(ref mut pg) = config.postgresql {
        if let Ok(val) = std::env::var("HARBOR_POSTGRESQL_CONNECTION_STRING") {
            pg.connection_string = secret_string(val);
        }
        if let Some(val) = env_parse("HARBOR_POSTGRESQL_MAX_CONNECTIONS")? {
            pg.max_connections = val;
        }
        if let Some(val) = env_parse("HARBOR_POSTGRESQL_STATEMENT_TIMEOUT_SECONDS")? {
            pg.statement_timeout_seconds = val;
        }
        if let Ok(val) = std::env::var("HARBOR_POSTGRESQL_SSL_MODE") {
            pg.ssl_mode = val;
        }
    }

    // ETL overrides
    if let Ok(val) = std::env::var("HARBOR_ETL_DOCUMENT_TYPES") {
        config.etl.document_types = val
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
    }
    if let Some(val) = env_parse("HARBOR_ETL_BATCH_SIZE")? {
        config.etl.batch_size = val;
    }
    if let Some(val) = env_parse("HARBOR_ETL_POLL_INTERVAL_SECONDS")? {
        config.etl.poll_interval_seconds = val;
    }
    if let Some(val) = env_parse("HARBOR_ETL_WORKERS")? {
        config.etl.workers = val;
    }
    if let Some(val) = env_parse("HARBOR_ETL_STALE_AFTER_SECONDS")? {
        config.etl.policy.stale_after_seconds = val;
    }

    // Logging overrides
    if let Some(val) = env_parse("HARBOR_LOGGING_LOCAL_ENABLED")? {
        config.logging.local_enabled = val;
    }
    if let Ok(val) = std::env::var("HARBOR_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Environment variables are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn test_substitute_env_vars() {
        let _lock = ENV_MUTEX.lock().unwrap();
        std::env::set_var("HARBOR_TEST_VAR", "test_value");
        let input = "password = \"${HARBOR_TEST_VAR}\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, "password = \"test_value\"\n");
        std::env::remove_var("HARBOR_TEST_VAR");
    }

    #[test]
    fn test_substitute_env_vars_missing() {
        let _lock = ENV_MUTEX.lock().unwrap();
        std::env::remove_var("HARBOR_MISSING_VAR");
        let input = "password = \"${HARBOR_MISSING_VAR}\"";
        let err = substitute_env_vars(input).unwrap_err();
        assert!(err.to_string().contains("HARBOR_MISSING_VAR"));
    }

    #[test]
    fn test_substitute_skips_comments() {
        let _lock = ENV_MUTEX.lock().unwrap();
        std::env::remove_var("HARBOR_COMMENTED_VAR");
        let input = "# connection_string = \"${HARBOR_COMMENTED_VAR}\"";
        assert!(substitute_env_vars(input).is_ok());
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent.toml");
        assert!(matches!(result, Err(HarborError::Configuration(_))));
    }

    #[test]
    fn test_load_config_valid() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let toml_content = r#"
database_target = "memory"

[application]
log_level = "debug"

[etl]
document_types = ["enrollment", "fhir"]
batch_size = 50

[etl.policy]
stale_after_seconds = 120
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.application.log_level, "debug");
        assert_eq!(config.database_target, DatabaseTarget::Memory);
        assert_eq!(config.etl.batch_size, 50);
        assert_eq!(config.etl.policy.stale_after_seconds, 120);
    }

    #[test]
    fn test_env_override_applies() {
        let _lock = ENV_MUTEX.lock().unwrap();
        std::env::set_var("HARBOR_ETL_WORKERS", "4");
        let config = load_config_str("database_target = \"memory\"");
        std::env::remove_var("HARBOR_ETL_WORKERS");

        assert_eq!(config.unwrap().etl.workers, 4);
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let _lock = ENV_MUTEX.lock().unwrap();
        std::env::set_var("HARBOR_ETL_BATCH_SIZE", "lots");
        let result = load_config_str("database_target = \"memory\"");
        std::env::remove_var("HARBOR_ETL_BATCH_SIZE");

        assert!(result.is_err());
    }
}
