// src/models/ride.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a ride. Serialized forms match the values stored by
/// the document store (`"noDriver"`, `"inProgress"`, ...).
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RideStatus {
    Scheduled,  // Future-dated ride, waiting for its time
    Requested,  // Just created, driver search not yet run
    Searching,  // Candidates notified, waiting for an acceptance
    NoDriver,   // Search returned no candidates (terminal)
    Accepted,   // A driver won the acceptance race
    Arrived,    // Driver at the pickup point
    InProgress, // Passenger on board
    Completed,  // Trip finished (terminal)
    Cancelled,  // Cancelled by either party (terminal)
}

impl RideStatus {
    /// No transition is defined out of a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RideStatus::Completed | RideStatus::Cancelled | RideStatus::NoDriver
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VehicleClass {
    Standard,
    Comfort,
    Premium,
    Van,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self { longitude, latitude }
    }

    /// Great-circle distance in meters (haversine).
    pub fn distance_meters(&self, other: &GeoPoint) -> f64 {
        let earth_radius_m = 6_371_000.0;
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = (other.latitude - self.latitude).to_radians();
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        earth_radius_m * c
    }
}

/// A named location: human-readable address plus coordinates.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Place {
    pub address: String,
    pub location: GeoPoint,
}

/// Fare breakdown, computed once at request time and never recomputed.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Price {
    pub base: f64,
    pub distance: f64,
    pub time: f64,
    pub total: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Card,
    Cash,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Pending,
    Completed,
    Failed,
    CashPending,
}

/// Payment settlement evolves independently of ride status: a failed charge
/// does not undo a completed ride.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Payment {
    pub method: PaymentMethod,
    pub status: PaymentState,
    pub transaction_id: Option<String>,
    pub receipt: Option<String>,
}

impl Payment {
    pub fn new(method: PaymentMethod) -> Self {
        Self {
            method,
            status: PaymentState::Pending,
            transaction_id: None,
            receipt: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RouteStep {
    pub distance_meters: f64,
    pub duration_seconds: f64,
    pub instruction: String,
}

/// Display-only route detail; opaque to the lifecycle logic.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RouteInfo {
    pub polyline: String,
    pub steps: Vec<RouteStep>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CancelledBy {
    Passenger,
    Driver,
}

/// One side's rating of the other, settable at most once.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RideRating {
    pub value: u8,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Rating {
    pub by_passenger: Option<RideRating>,
    pub by_driver: Option<RideRating>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Ride {
    pub id: String,
    pub passenger_id: String,
    pub driver_id: Option<String>,
    pub status: RideStatus,

    pub pickup: Place,
    pub destination: Place,
    pub vehicle_class: VehicleClass,
    pub passengers: u32,

    pub price: Price,
    pub distance_meters: f64,
    pub duration_seconds: f64,
    pub route: RouteInfo,

    pub payment: Payment,
    pub rating: Rating,

    pub scheduled_time: Option<DateTime<Utc>>,
    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub arrived_at: Option<DateTime<Utc>>,
    pub pickup_time: Option<DateTime<Utc>>,
    pub dropoff_time: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<CancelledBy>,
    pub cancellation_reason: Option<String>,
}

// Request/Response models

#[derive(Debug, Serialize, Deserialize)]
pub struct RideRequest {
    pub pickup: Place,
    pub destination: Place,
    pub vehicle_class: Option<VehicleClass>,
    pub passengers: Option<u32>,
    pub payment_method: Option<PaymentMethod>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelRideRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RateRideRequest {
    pub rating: u8,
    pub comment: Option<String>,
}

/// Status filter plus page/limit pagination for the ride list endpoints.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct RideListQuery {
    pub status: Option<RideStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct RideListPage {
    pub rides: Vec<Ride>,
    pub total_count: usize,
    pub page: u32,
    pub limit: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(RideStatus::Completed.is_terminal());
        assert!(RideStatus::Cancelled.is_terminal());
        assert!(RideStatus::NoDriver.is_terminal());
        assert!(!RideStatus::Searching.is_terminal());
        assert!(!RideStatus::Scheduled.is_terminal());
    }

    #[test]
    fn status_wire_format_matches_store_values() {
        assert_eq!(
            serde_json::to_string(&RideStatus::NoDriver).unwrap(),
            "\"noDriver\""
        );
        assert_eq!(
            serde_json::to_string(&RideStatus::InProgress).unwrap(),
            "\"inProgress\""
        );
        assert_eq!(
            serde_json::to_string(&PaymentState::CashPending).unwrap(),
            "\"cash_pending\""
        );
    }

    #[test]
    fn haversine_is_roughly_right() {
        // Paris Notre-Dame to Louvre, a bit over 2.5km as the crow flies
        let a = GeoPoint::new(2.3499, 48.8530);
        let b = GeoPoint::new(2.3376, 48.8606);
        let d = a.distance_meters(&b);
        assert!(d > 1000.0 && d < 3000.0, "unexpected distance {}", d);
    }
}
