//! # Vehicle Model
//!
//! The record kept for every vehicle parked in the lot.
//!
//! Wire names follow the REST API: `id`, `plate`, `type`, `owner`, `entryTime`.
//! The legacy type names `CARRO` and `MOTO` are accepted on input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Store-assigned vehicle identifier
pub type VehicleId = i64;

/// Kind of vehicle, each with its own capacity pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleType {
    /// Four-wheeled vehicle
    #[serde(alias = "CARRO")]
    Car,
    /// Two-wheeled vehicle
    #[serde(alias = "MOTO")]
    Motorcycle,
}

impl VehicleType {
    /// Every known vehicle type, in display order
    pub const ALL: [Self; 2] = [Self::Car, Self::Motorcycle];

    /// Canonical upper-case name, as stored and serialized
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Car => "CAR",
            Self::Motorcycle => "MOTORCYCLE",
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CAR" | "CARRO" => Ok(Self::Car),
            "MOTORCYCLE" | "MOTO" => Ok(Self::Motorcycle),
            other => Err(format!("unknown vehicle type '{other}'")),
        }
    }
}

/// A vehicle registered in the parking lot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleRecord {
    /// Absent until the record is first persisted
    #[serde(default)]
    pub id: Option<VehicleId>,
    /// Licence plate of the physical vehicle
    pub plate: String,
    /// Vehicle kind
    #[serde(rename = "type")]
    pub vehicle_type: VehicleType,
    /// Owner name, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Time the vehicle entered the lot, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_time: Option<DateTime<Utc>>,
}

impl VehicleRecord {
    /// New, not yet persisted record
    pub fn new(plate: impl Into<String>, vehicle_type: VehicleType) -> Self {
        Self {
            id: None,
            plate: plate.into(),
            vehicle_type,
            owner: None,
            entry_time: None,
        }
    }

    /// Set the owner
    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Set the entry time
    #[must_use]
    pub fn with_entry_time(mut self, at: DateTime<Utc>) -> Self {
        self.entry_time = Some(at);
        self
    }

    /// Set the identifier
    #[must_use]
    pub fn with_id(mut self, id: VehicleId) -> Self {
        self.id = Some(id);
        self
    }

    /// Whether this record shares the uniqueness key `(plate, type)`
    #[must_use]
    pub fn same_vehicle(&self, plate: &str, vehicle_type: VehicleType) -> bool {
        self.vehicle_type == vehicle_type && self.plate == plate
    }
}
