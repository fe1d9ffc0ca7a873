// src/services/store_service.rs
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::{
    errors::KestrelError as AppError,
    models::{
        driver::{ApprovalStatus, Driver},
        notification::Notification,
        ride::{CancelledBy, Ride, RideStatus},
        user::User,
    },
};

#[derive(Default)]
struct StoreInner {
    rides: HashMap<String, Ride>,
    drivers: HashMap<String, Driver>,
    users: HashMap<String, User>,
    notifications: HashMap<String, Notification>,
}

/// In-memory document store. One lock covers all collections so that the
/// acceptance check-and-set can read and write ride + driver state as a
/// single transaction. Everything else takes the lock only briefly.
pub struct StoreService {
    inner: RwLock<StoreInner>,
}

impl Default for StoreService {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreService {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
        }
    }

    // ----- rides -----

    pub async fn put_ride(&self, ride: Ride) {
        let mut inner = self.inner.write().await;
        inner.rides.insert(ride.id.clone(), ride);
    }

    pub async fn get_ride(&self, ride_id: &str) -> Option<Ride> {
        let inner = self.inner.read().await;
        inner.rides.get(ride_id).cloned()
    }

    /// Apply `f` to a copy of the ride and commit only when it returns Ok.
    /// A guard failure inside `f` leaves the stored ride untouched.
    pub async fn update_ride<F>(&self, ride_id: &str, f: F) -> Result<Ride, AppError>
    where
        F: FnOnce(&mut Ride) -> Result<(), AppError>,
    {
        let mut inner = self.inner.write().await;
        let current = inner
            .rides
            .get(ride_id)
            .ok_or_else(|| AppError::RideNotFound(ride_id.to_string()))?;

        let mut updated = current.clone();
        f(&mut updated)?;
        inner.rides.insert(ride_id.to_string(), updated.clone());
        Ok(updated)
    }

    pub async fn rides_by_passenger(&self, passenger_id: &str) -> Vec<Ride> {
        let inner = self.inner.read().await;
        inner
            .rides
            .values()
            .filter(|r| r.passenger_id == passenger_id)
            .cloned()
            .collect()
    }

    pub async fn rides_by_driver(&self, driver_id: &str) -> Vec<Ride> {
        let inner = self.inner.read().await;
        inner
            .rides
            .values()
            .filter(|r| r.driver_id.as_deref() == Some(driver_id))
            .cloned()
            .collect()
    }

    /// The acceptance race resolver. Under a single write lock: verify the
    /// ride is still `searching` and the driver is still free and approved,
    /// then flip both records. Exactly one concurrent caller can win; every
    /// other observes the post-transition state and gets a conflict error.
    pub async fn try_assign_driver(
        &self,
        ride_id: &str,
        driver_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(Ride, Driver), AppError> {
        let mut inner = self.inner.write().await;

        let ride = inner
            .rides
            .get(ride_id)
            .ok_or_else(|| AppError::RideNotFound(ride_id.to_string()))?;
        if ride.status != RideStatus::Searching {
            return Err(AppError::RideNotAvailable);
        }

        let driver = inner
            .drivers
            .get(driver_id)
            .ok_or_else(|| AppError::DriverNotFound(driver_id.to_string()))?;
        if !driver.is_available || driver.approval != ApprovalStatus::Approved {
            return Err(AppError::DriverNotAvailable);
        }

        let mut ride = ride.clone();
        ride.driver_id = Some(driver_id.to_string());
        ride.status = RideStatus::Accepted;
        ride.accepted_at = Some(now);

        let mut driver = driver.clone();
        driver.is_available = false;
        driver.current_ride = Some(ride_id.to_string());
        driver.updated_at = now;

        inner.rides.insert(ride_id.to_string(), ride.clone());
        inner.drivers.insert(driver_id.to_string(), driver.clone());

        Ok((ride, driver))
    }

    /// Cancel a ride and release its driver under the same write lock. The
    /// driver to free is taken from the ride as it is at commit time, so an
    /// acceptance that raced in just before the cancel is still unwound.
    pub async fn cancel_ride(
        &self,
        ride_id: &str,
        cancelled_by: CancelledBy,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<(Ride, Option<Driver>), AppError> {
        let mut inner = self.inner.write().await;

        let ride = inner
            .rides
            .get(ride_id)
            .ok_or_else(|| AppError::RideNotFound(ride_id.to_string()))?;
        if ride.status.is_terminal() {
            return Err(AppError::invalid_status(ride.status, "cancel"));
        }

        let mut ride = ride.clone();
        ride.status = RideStatus::Cancelled;
        ride.cancelled_by = Some(cancelled_by);
        ride.cancellation_reason = Some(reason);
        ride.cancelled_at = Some(now);
        inner.rides.insert(ride_id.to_string(), ride.clone());

        let assigned = ride
            .driver_id
            .as_deref()
            .and_then(|driver_id| inner.drivers.get(driver_id).cloned());
        let freed = assigned.map(|mut driver| {
            driver.is_available = true;
            driver.current_ride = None;
            driver.updated_at = now;
            inner.drivers.insert(driver.id.clone(), driver.clone());
            driver
        });

        Ok((ride, freed))
    }

    // ----- drivers -----

    pub async fn put_driver(&self, driver: Driver) {
        let mut inner = self.inner.write().await;
        inner.drivers.insert(driver.id.clone(), driver);
    }

    pub async fn get_driver(&self, driver_id: &str) -> Option<Driver> {
        let inner = self.inner.read().await;
        inner.drivers.get(driver_id).cloned()
    }

    pub async fn get_driver_by_user(&self, user_id: &str) -> Option<Driver> {
        let inner = self.inner.read().await;
        inner
            .drivers
            .values()
            .find(|d| d.user_id == user_id)
            .cloned()
    }

    pub async fn update_driver<F>(&self, driver_id: &str, f: F) -> Result<Driver, AppError>
    where
        F: FnOnce(&mut Driver) -> Result<(), AppError>,
    {
        let mut inner = self.inner.write().await;
        let current = inner
            .drivers
            .get(driver_id)
            .ok_or_else(|| AppError::DriverNotFound(driver_id.to_string()))?;

        let mut updated = current.clone();
        f(&mut updated)?;
        updated.updated_at = Utc::now();
        inner.drivers.insert(driver_id.to_string(), updated.clone());
        Ok(updated)
    }

    pub async fn all_drivers(&self) -> Vec<Driver> {
        let inner = self.inner.read().await;
        inner.drivers.values().cloned().collect()
    }

    // ----- users -----

    pub async fn put_user(&self, user: User) {
        let mut inner = self.inner.write().await;
        inner.users.insert(user.id.clone(), user);
    }

    pub async fn get_user(&self, user_id: &str) -> Option<User> {
        let inner = self.inner.read().await;
        inner.users.get(user_id).cloned()
    }

    pub async fn update_user<F>(&self, user_id: &str, f: F) -> Result<User, AppError>
    where
        F: FnOnce(&mut User) -> Result<(), AppError>,
    {
        let mut inner = self.inner.write().await;
        let current = inner
            .users
            .get(user_id)
            .ok_or_else(|| AppError::UserNotFound(user_id.to_string()))?;

        let mut updated = current.clone();
        f(&mut updated)?;
        inner.users.insert(user_id.to_string(), updated.clone());
        Ok(updated)
    }

    // ----- notifications -----

    pub async fn put_notification(&self, notification: Notification) {
        let mut inner = self.inner.write().await;
        inner
            .notifications
            .insert(notification.id.clone(), notification);
    }

    pub async fn notifications_for(&self, recipient: &str) -> Vec<Notification> {
        let inner = self.inner.read().await;
        let mut out: Vec<Notification> = inner
            .notifications
            .values()
            .filter(|n| n.recipient == recipient)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }
}
