// src/models/driver.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ride::{GeoPoint, VehicleClass};

/// Back-office approval state. Only `Approved` drivers can be matched.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Suspended,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Vehicle {
    pub vehicle_class: VehicleClass,
    pub make: String,
    pub model: String,
    pub year: u16,
    pub color: String,
    pub license_plate: String,
    pub insurance_number: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Driver {
    pub id: String,
    pub user_id: String, // 1:1 with a user account
    pub license_number: String,

    pub is_verified: bool,
    pub approval: ApprovalStatus,

    // These two move in lockstep while a ride is active: a driver has a
    // current_ride iff is_available is false because of that ride.
    pub is_available: bool,
    pub current_ride: Option<String>,

    pub location: GeoPoint,
    pub vehicle: Vehicle,

    pub balance: f64,
    pub completed_rides: u32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DriverRegistration {
    // overwritten with the caller's identity by the handler
    #[serde(default)]
    pub user_id: String,
    pub license_number: String,
    pub vehicle: Vehicle,
    pub location: Option<GeoPoint>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DriverLocationUpdate {
    pub location: GeoPoint,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DriverAvailabilityUpdate {
    pub is_available: bool,
}

#[derive(Debug, Serialize)]
pub struct DriverResponse {
    pub id: String,
    pub user_id: String,
    pub is_verified: bool,
    pub approval: ApprovalStatus,
    pub is_available: bool,
    pub current_ride: Option<String>,
    pub location: GeoPoint,
    pub vehicle: Vehicle,
    pub balance: f64,
    pub completed_rides: u32,
}

impl From<Driver> for DriverResponse {
    fn from(driver: Driver) -> Self {
        Self {
            id: driver.id,
            user_id: driver.user_id,
            is_verified: driver.is_verified,
            approval: driver.approval,
            is_available: driver.is_available,
            current_ride: driver.current_ride,
            location: driver.location,
            vehicle: driver.vehicle,
            balance: driver.balance,
            completed_rides: driver.completed_rides,
        }
    }
}
