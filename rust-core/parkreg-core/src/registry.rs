//! # Vehicle Registry
//!
//! Admission control for the parking lot. A vehicle is admitted only when
//!
//! 1. it carries no id yet,
//! 2. no present vehicle shares its `(plate, type)` pair, and
//! 3. its type still has a free slot.
//!
//! Capacity is always derived from the live count in the store, so deleting a
//! record frees its slot immediately.
//!
//! The check-then-insert sequence of [`VehicleRegistry::register`] runs under
//! an async admission lock. Two concurrent registrations therefore never both
//! pass the duplicate or capacity check within one process.

use crate::config::CapacityConfig;
use crate::store::RecordStore;
use crate::vehicle::{VehicleId, VehicleRecord, VehicleType};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Result type alias for registry operations
pub type AdmissionResult<T> = std::result::Result<T, AdmissionError>;

/// Why a registry operation was refused
#[derive(Error, Debug)]
pub enum AdmissionError {
    /// A new vehicle was submitted with an id already set
    #[error("A new vehicle cannot already have an ID")]
    AlreadyIdentified,

    /// A vehicle with the same plate and type is already parked
    #[error("Vehicle {plate} ({vehicle_type}) is already in the parking lot")]
    DuplicateVehicle {
        /// Offending plate
        plate: String,
        /// Offending type
        vehicle_type: VehicleType,
    },

    /// No free slot left for this vehicle type
    #[error("No {0} spaces left")]
    CapacityExceeded(VehicleType),

    /// No record with this id
    #[error("Vehicle {0} not found")]
    NotFound(VehicleId),

    /// The record store failed
    #[error(transparent)]
    Store(#[from] crate::error::Error),
}

impl AdmissionError {
    /// Machine-readable error key surfaced to clients
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::AlreadyIdentified => "idexists",
            Self::DuplicateVehicle { .. } => "placaexist",
            Self::CapacityExceeded(VehicleType::Motorcycle) => "motomax",
            Self::CapacityExceeded(VehicleType::Car) => "carromax",
            Self::NotFound(_) => "notfound",
            Self::Store(_) => "internal",
        }
    }

    /// Whether the caller is at fault (as opposed to the infrastructure)
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}

/// Live usage of one vehicle type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Occupancy {
    /// Vehicle type
    #[serde(rename = "type")]
    pub vehicle_type: VehicleType,
    /// Records currently present
    pub count: u64,
    /// Configured limit, `None` when unlimited
    pub capacity: Option<u64>,
    /// Free slots, `None` when unlimited
    pub available: Option<u64>,
}

/// Admission-controlled front of a [`RecordStore`]
pub struct VehicleRegistry {
    store: Arc<dyn RecordStore>,
    capacity: CapacityConfig,
    admission: Mutex<()>,
}

impl std::fmt::Debug for VehicleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VehicleRegistry")
            .field("store", &self.store.backend())
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl VehicleRegistry {
    /// Create a registry over a store with the given per-type limits
    pub fn new(store: Arc<dyn RecordStore>, capacity: CapacityConfig) -> Self {
        Self {
            store,
            capacity,
            admission: Mutex::new(()),
        }
    }

    /// Configured limits
    #[must_use]
    pub const fn capacity(&self) -> &CapacityConfig {
        &self.capacity
    }

    /// Admit a new vehicle
    ///
    /// Rules are evaluated before the store is touched, so a refusal leaves
    /// the store unchanged.
    ///
    /// # Errors
    ///
    /// - `AlreadyIdentified` if `candidate.id` is set
    /// - `DuplicateVehicle` if the `(plate, type)` pair is already present
    /// - `CapacityExceeded` if the type has no free slot
    /// - `Store` if the backend fails
    pub async fn register(&self, candidate: VehicleRecord) -> AdmissionResult<VehicleRecord> {
        if candidate.id.is_some() {
            warn!(plate = %candidate.plate, "Rejected registration carrying an id");
            return Err(AdmissionError::AlreadyIdentified);
        }

        let _admission = self.admission.lock().await;

        let existing = self
            .store
            .find_by_plate_and_type(&candidate.plate, candidate.vehicle_type)
            .await?;
        if !existing.is_empty() {
            warn!(
                plate = %candidate.plate,
                vehicle_type = %candidate.vehicle_type,
                "Rejected duplicate vehicle"
            );
            return Err(AdmissionError::DuplicateVehicle {
                plate: candidate.plate,
                vehicle_type: candidate.vehicle_type,
            });
        }

        if let Some(limit) = self.capacity.limit(candidate.vehicle_type) {
            let present = self.store.count_by_type(candidate.vehicle_type).await?;
            if present >= limit {
                warn!(
                    vehicle_type = %candidate.vehicle_type,
                    present,
                    limit,
                    "Rejected vehicle, capacity reached"
                );
                return Err(AdmissionError::CapacityExceeded(candidate.vehicle_type));
            }
        }

        let stored = self.store.save(candidate).await?;
        info!(
            id = ?stored.id,
            plate = %stored.plate,
            vehicle_type = %stored.vehicle_type,
            "Vehicle admitted"
        );
        Ok(stored)
    }

    /// Update a vehicle, or register it when it has no id yet
    ///
    /// Records with an id are written as-is; the admission rules are not
    /// re-evaluated on this path.
    ///
    /// # Errors
    ///
    /// Any [`register`](Self::register) error on the insert path, `Store` otherwise.
    pub async fn update(&self, record: VehicleRecord) -> AdmissionResult<VehicleRecord> {
        if record.id.is_none() {
            debug!(plate = %record.plate, "Update without id, registering instead");
            return self.register(record).await;
        }

        let stored = self.store.save(record).await?;
        debug!(id = ?stored.id, plate = %stored.plate, "Vehicle updated");
        Ok(stored)
    }

    /// Fetch a vehicle by id
    ///
    /// # Errors
    ///
    /// `NotFound` if no such record exists.
    pub async fn get(&self, id: VehicleId) -> AdmissionResult<VehicleRecord> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(AdmissionError::NotFound(id))
    }

    /// All vehicles in store order
    ///
    /// # Errors
    ///
    /// `Store` if the backend fails.
    pub async fn list(&self) -> AdmissionResult<Vec<VehicleRecord>> {
        Ok(self.store.find_all().await?)
    }

    /// Remove a vehicle, freeing its slot
    ///
    /// # Errors
    ///
    /// `NotFound` if no such record exists.
    pub async fn delete(&self, id: VehicleId) -> AdmissionResult<()> {
        if self.store.delete_by_id(id).await? {
            info!(id, "Vehicle removed");
            Ok(())
        } else {
            Err(AdmissionError::NotFound(id))
        }
    }

    /// Live count and free slots per vehicle type
    ///
    /// # Errors
    ///
    /// `Store` if the backend fails.
    pub async fn occupancy(&self) -> AdmissionResult<Vec<Occupancy>> {
        let mut report = Vec::with_capacity(VehicleType::ALL.len());
        for vehicle_type in VehicleType::ALL {
            let count = self.store.count_by_type(vehicle_type).await?;
            let capacity = self.capacity.limit(vehicle_type);
            report.push(Occupancy {
                vehicle_type,
                count,
                capacity,
                available: capacity.map(|limit| limit.saturating_sub(count)),
            });
        }
        Ok(report)
    }
}
