//! Storage factory
//!
//! Builds the storage bundle for the configured `database_target`.

use crate::adapters::database::traits::{
    ProcessingLogStorage, ReceivingStorage, StorageBackend, WarehouseWriter,
};
use crate::adapters::memory::MemoryStore;
use crate::adapters::postgresql::adapter::PostgreSQLAdapter;
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::config::schema::{DatabaseTarget, HarborConfig};
use crate::domain::{HarborError, Result};
use std::sync::Arc;

/// Every storage concern, backed by one shared backend
///
/// The four handles point at the same adapter so a single connection pool
/// serves receiving, the processing log, and the warehouse.
#[derive(Clone)]
pub struct Storage {
    /// Lifecycle operations
    pub backend: Arc<dyn StorageBackend + Send + Sync>,

    /// Append-only receiving store
    pub receiving: Arc<dyn ReceivingStorage + Send + Sync>,

    /// Per-record processing logs
    pub log: Arc<dyn ProcessingLogStorage + Send + Sync>,

    /// Warehouse writer
    pub warehouse: Arc<dyn WarehouseWriter + Send + Sync>,
}

impl Storage {
    /// Share one adapter across all four handles
    pub fn from_backend<T>(backend: Arc<T>) -> Self
    where
        T: StorageBackend + ReceivingStorage + ProcessingLogStorage + WarehouseWriter + 'static,
    {
        Self {
            backend: backend.clone(),
            receiving: backend.clone(),
            log: backend.clone(),
            warehouse: backend,
        }
    }

    /// Fresh in-memory storage
    pub fn in_memory() -> Self {
        Self::from_backend(Arc::new(MemoryStore::new()))
    }
}

/// Create the storage bundle based on the configuration
///
/// # Errors
///
/// Returns an error if the selected backend is not configured or its client
/// cannot be created.
pub async fn create_storage(config: &HarborConfig) -> Result<Storage> {
    match config.database_target {
        DatabaseTarget::Memory => {
            tracing::info!("Creating in-memory storage");
            Ok(Storage::in_memory())
        }
        DatabaseTarget::PostgreSQL => {
            let pg_config = config.postgresql.as_ref().ok_or_else(|| {
                HarborError::Configuration(
                    "postgresql configuration is required when database_target = 'postgresql'"
                        .to_string(),
                )
            })?;

            tracing::info!("Creating PostgreSQL storage");
            let client = PostgreSQLClient::new(pg_config.clone()).await?;
            let adapter = Arc::new(PostgreSQLAdapter::new(client));

            Ok(Storage::from_backend(adapter))
        }
    }
}
