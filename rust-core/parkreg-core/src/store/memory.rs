//! In-memory record store.

use super::RecordStore;
use crate::error::{Error, Result};
use crate::vehicle::{VehicleId, VehicleRecord, VehicleType};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

/// Ordered map of records keyed by id
///
/// Ids start at 1 and are never reused, even after deletion.
#[derive(Debug)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Debug)]
struct Inner {
    records: BTreeMap<VehicleId, VehicleRecord>,
    /// `None` once `VehicleId::MAX` has been handed out
    next_id: Option<VehicleId>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                records: BTreeMap::new(),
                next_id: Some(1),
            }),
        }
    }

    /// Number of stored records
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .len()
    }

    /// Check if the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn find_by_plate_and_type(
        &self,
        plate: &str,
        vehicle_type: VehicleType,
    ) -> Result<Vec<VehicleRecord>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(inner
            .records
            .values()
            .filter(|r| r.same_vehicle(plate, vehicle_type))
            .cloned()
            .collect())
    }

    async fn count_by_type(&self, vehicle_type: VehicleType) -> Result<u64> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(inner
            .records
            .values()
            .filter(|r| r.vehicle_type == vehicle_type)
            .count() as u64)
    }

    async fn save(&self, mut record: VehicleRecord) -> Result<VehicleRecord> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let id = match record.id {
            Some(id) => {
                // Keep the sequence ahead of ids chosen by callers.
                if let Some(next) = inner.next_id {
                    if id >= next {
                        inner.next_id = id.checked_add(1);
                    }
                }
                id
            }
            None => {
                let id = inner.next_id.ok_or_else(|| Error::Database {
                    message: "vehicle id sequence exhausted".to_string(),
                })?;
                inner.next_id = id.checked_add(1);
                id
            }
        };
        record.id = Some(id);
        inner.records.insert(id, record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: VehicleId) -> Result<Option<VehicleRecord>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.records.get(&id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<VehicleRecord>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.records.values().cloned().collect())
    }

    async fn delete_by_id(&self, id: VehicleId) -> Result<bool> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.records.remove(&id).is_some())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
