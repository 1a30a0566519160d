//! # Record Store
//!
//! Keyed storage for vehicle records, plus the two derived queries the
//! admission rules need (lookup by plate+type, count by type).
//!
//! ## Backends
//!
//! - [`MemoryStore`] - ordered in-process map, the default
//! - [`SqliteStore`] - SQLx-backed SQLite table

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::config::StoreConfig;
use crate::error::Result;
use crate::vehicle::{VehicleId, VehicleRecord, VehicleType};
use async_trait::async_trait;
use std::sync::Arc;

/// Storage collaborator of the vehicle registry
///
/// Implementations perform no rule checks of their own.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All records sharing the `(plate, type)` pair
    async fn find_by_plate_and_type(
        &self,
        plate: &str,
        vehicle_type: VehicleType,
    ) -> Result<Vec<VehicleRecord>>;

    /// Number of records of the given type currently stored
    async fn count_by_type(&self, vehicle_type: VehicleType) -> Result<u64>;

    /// Insert when `record.id` is unset (assigning a fresh id), otherwise
    /// overwrite the record stored under that id
    async fn save(&self, record: VehicleRecord) -> Result<VehicleRecord>;

    /// Record stored under `id`, if any
    async fn find_by_id(&self, id: VehicleId) -> Result<Option<VehicleRecord>>;

    /// Every stored record, in ascending id order
    async fn find_all(&self) -> Result<Vec<VehicleRecord>>;

    /// Remove the record stored under `id`; returns whether one existed
    async fn delete_by_id(&self, id: VehicleId) -> Result<bool>;

    /// Backend name for logging
    fn backend(&self) -> &'static str;
}

/// Open the store described by the configuration
///
/// # Errors
///
/// Returns `Error::Database` if the SQLite database cannot be opened or migrated.
pub async fn open(config: &StoreConfig) -> Result<Arc<dyn RecordStore>> {
    match config {
        StoreConfig::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreConfig::Sqlite {
            url,
            max_connections,
        } => {
            let store = SqliteStore::connect(url, *max_connections).await?;
            Ok(Arc::new(store))
        }
    }
}
