// src/services/driver_service.rs
use chrono::Utc;
use std::sync::Arc;

use crate::{
    errors::KestrelError as AppError,
    models::{
        driver::{ApprovalStatus, Driver, DriverRegistration},
        ride::{GeoPoint, VehicleClass},
    },
    services::store_service::StoreService,
    utils::id_generator::{IdGenerator, IdType},
};

pub const DEFAULT_SEARCH_RADIUS_M: f64 = 5000.0;

/// Driver Directory: availability, approval, vehicle and position of every
/// driver, plus the proximity query the dispatcher runs.
pub struct DriverService {
    store: Arc<StoreService>,
}

impl DriverService {
    pub fn new(store: Arc<StoreService>) -> Self {
        Self { store }
    }

    pub async fn register_driver(
        &self,
        registration: DriverRegistration,
    ) -> Result<Driver, AppError> {
        if registration.license_number.trim().is_empty() {
            return Err(AppError::validation_error(
                "license_number",
                "License number is required",
            ));
        }
        if self
            .store
            .get_driver_by_user(&registration.user_id)
            .await
            .is_some()
        {
            return Err(AppError::validation_error(
                "user_id",
                "Driver already exists for this user",
            ));
        }

        let now = Utc::now();
        let driver = Driver {
            id: IdGenerator::generate(IdType::Driver),
            user_id: registration.user_id,
            license_number: registration.license_number,
            is_verified: false,
            approval: ApprovalStatus::Pending,
            is_available: false,
            current_ride: None,
            location: registration
                .location
                .unwrap_or(GeoPoint::new(0.0, 0.0)),
            vehicle: registration.vehicle,
            balance: 0.0,
            completed_rides: 0,
            created_at: now,
            updated_at: now,
        };

        self.store.put_driver(driver.clone()).await;
        tracing::info!(driver_id = %driver.id, "driver registered");
        Ok(driver)
    }

    pub async fn get_driver(&self, driver_id: &str) -> Result<Driver, AppError> {
        self.store
            .get_driver(driver_id)
            .await
            .ok_or_else(|| AppError::DriverNotFound(driver_id.to_string()))
    }

    pub async fn get_driver_by_user(&self, user_id: &str) -> Result<Driver, AppError> {
        self.store
            .get_driver_by_user(user_id)
            .await
            .ok_or_else(|| AppError::DriverNotFound(format!("user {}", user_id)))
    }

    /// Drivers eligible for a pickup: available, verified, approved, vehicle
    /// class matching when requested, within the radius. Nearest first. An
    /// empty result is a normal "no driver found" outcome, not an error.
    pub async fn find_candidates(
        &self,
        pickup: &GeoPoint,
        vehicle_class: Option<VehicleClass>,
        max_distance_m: f64,
    ) -> Vec<Driver> {
        let mut matches: Vec<(f64, Driver)> = self
            .store
            .all_drivers()
            .await
            .into_iter()
            .filter(|d| d.is_available && d.is_verified && d.approval == ApprovalStatus::Approved)
            .filter(|d| {
                vehicle_class.is_none_or(|class| d.vehicle.vehicle_class == class)
            })
            .filter_map(|d| {
                let distance = pickup.distance_meters(&d.location);
                (distance <= max_distance_m).then_some((distance, d))
            })
            .collect();

        matches.sort_by(|a, b| a.0.total_cmp(&b.0));
        matches.into_iter().map(|(_, d)| d).collect()
    }

    pub async fn set_availability(
        &self,
        driver_id: &str,
        available: bool,
    ) -> Result<Driver, AppError> {
        self.store
            .update_driver(driver_id, |d| {
                d.is_available = available;
                Ok(())
            })
            .await
    }

    pub async fn set_current_ride(
        &self,
        driver_id: &str,
        ride_id: Option<String>,
    ) -> Result<Driver, AppError> {
        self.store
            .update_driver(driver_id, |d| {
                d.current_ride = ride_id;
                Ok(())
            })
            .await
    }

    /// High-frequency driver ping; holds the write lock only for the field
    /// swap so matching reads are not starved.
    pub async fn update_location(
        &self,
        driver_id: &str,
        location: GeoPoint,
    ) -> Result<(), AppError> {
        self.store
            .update_driver(driver_id, |d| {
                d.location = location;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::driver::Vehicle;
    use crate::test_support::make_driver;

    fn registration(user_id: &str) -> DriverRegistration {
        DriverRegistration {
            user_id: user_id.to_string(),
            license_number: "B123456".to_string(),
            vehicle: Vehicle {
                vehicle_class: VehicleClass::Standard,
                make: "Toyota".to_string(),
                model: "Prius".to_string(),
                year: 2021,
                color: "grey".to_string(),
                license_plate: "AB-123-CD".to_string(),
                insurance_number: "INS-42".to_string(),
            },
            location: Some(GeoPoint::new(2.35, 48.85)),
        }
    }

    #[tokio::test]
    async fn register_rejects_duplicate_user() {
        let store = Arc::new(StoreService::new());
        let service = DriverService::new(store);
        service.register_driver(registration("usr-1")).await.unwrap();
        let err = service
            .register_driver(registration("usr-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn candidates_filter_on_eligibility_and_distance() {
        let store = Arc::new(StoreService::new());
        let pickup = GeoPoint::new(2.3500, 48.8500);

        let mut near = make_driver("drv-near", "usr-1", true);
        near.location = GeoPoint::new(2.3510, 48.8505); // ~130m
        let mut nearer = make_driver("drv-nearer", "usr-2", true);
        nearer.location = GeoPoint::new(2.3502, 48.8501); // ~20m
        let mut far = make_driver("drv-far", "usr-3", true);
        far.location = GeoPoint::new(2.45, 48.95); // >10km
        let mut busy = make_driver("drv-busy", "usr-4", false);
        busy.location = pickup;
        let mut pending = make_driver("drv-pending", "usr-5", true);
        pending.location = pickup;
        pending.approval = ApprovalStatus::Pending;

        for d in [near, nearer, far, busy, pending] {
            store.put_driver(d).await;
        }

        let service = DriverService::new(store);
        let candidates = service
            .find_candidates(&pickup, None, DEFAULT_SEARCH_RADIUS_M)
            .await;

        let ids: Vec<&str> = candidates.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["drv-nearer", "drv-near"]); // nearest first
    }

    #[tokio::test]
    async fn candidates_filter_on_vehicle_class() {
        let store = Arc::new(StoreService::new());
        let pickup = GeoPoint::new(2.3500, 48.8500);

        let mut standard = make_driver("drv-std", "usr-1", true);
        standard.location = pickup;
        let mut van = make_driver("drv-van", "usr-2", true);
        van.location = pickup;
        van.vehicle.vehicle_class = VehicleClass::Van;

        store.put_driver(standard).await;
        store.put_driver(van).await;

        let service = DriverService::new(store);
        let vans = service
            .find_candidates(&pickup, Some(VehicleClass::Van), DEFAULT_SEARCH_RADIUS_M)
            .await;
        assert_eq!(vans.len(), 1);
        assert_eq!(vans[0].id, "drv-van");

        let empty = service
            .find_candidates(&pickup, Some(VehicleClass::Premium), DEFAULT_SEARCH_RADIUS_M)
            .await;
        assert!(empty.is_empty()); // normal outcome, not an error
    }
}
