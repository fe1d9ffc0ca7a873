// src/services/ride_service.rs
use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;

use crate::{
    errors::KestrelError as AppError,
    models::{
        notification::NotificationEvent,
        ride::{
            CancelledBy, PaymentMethod, PaymentState, Rating, Ride, RideListPage, RideListQuery,
            RideRating, RideRequest, RideStatus, VehicleClass,
        },
        user::UserRole,
    },
    services::{
        driver_service::DriverService,
        notification_service::NotificationService,
        payment_service::PaymentGateway,
        pricing_service,
        realtime_service::RealtimeChannel,
        routing_service::Routing,
        store_service::StoreService,
    },
    utils::id_generator::{IdGenerator, IdType},
};

/// Share of the fare credited to the driver on completion; the platform
/// retains the rest.
const DRIVER_SHARE: f64 = 0.80;
const CURRENCY: &str = "eur";
const DEFAULT_CANCELLATION_REASON: &str = "No reason provided";
const ESTIMATED_PICKUP_MINUTES: i64 = 10;

const DEFAULT_PAGE_LIMIT: u32 = 10;
const MAX_PAGE_LIMIT: u32 = 100;

#[derive(Debug)]
pub struct RideRequestOutcome {
    pub ride: Ride,
    pub drivers_found: usize,
}

/// Ride Lifecycle Manager: validates transitions, persists ride state, and
/// triggers side effects (notifications, driver availability, payment
/// settlement, rating aggregation). Rides are mutated only here.
pub struct RideService {
    store: Arc<StoreService>,
    drivers: Arc<DriverService>,
    notifier: Arc<NotificationService>,
    routing: Arc<dyn Routing>,
    payments: Arc<dyn PaymentGateway>,
    realtime: Arc<dyn RealtimeChannel>,
    search_radius_m: f64,
}

impl RideService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<StoreService>,
        drivers: Arc<DriverService>,
        notifier: Arc<NotificationService>,
        routing: Arc<dyn Routing>,
        payments: Arc<dyn PaymentGateway>,
        realtime: Arc<dyn RealtimeChannel>,
        search_radius_m: f64,
    ) -> Self {
        Self {
            store,
            drivers,
            notifier,
            routing,
            payments,
            realtime,
            search_radius_m,
        }
    }

    /// Create a ride, price it, and if it is immediate run the driver search
    /// and fan out to every candidate. Returns as soon as the fan-out is
    /// dispatched; driver responses arrive through `accept_ride`.
    pub async fn request_ride(
        &self,
        passenger_id: &str,
        request: RideRequest,
    ) -> Result<RideRequestOutcome, AppError> {
        let passengers = request.passengers.unwrap_or(1);
        if passengers < 1 {
            return Err(AppError::validation_error(
                "passengers",
                "must be at least 1",
            ));
        }
        if request.pickup.address.trim().is_empty() {
            return Err(AppError::MissingRequiredField("pickup.address".to_string()));
        }
        if request.destination.address.trim().is_empty() {
            return Err(AppError::MissingRequiredField(
                "destination.address".to_string(),
            ));
        }

        let vehicle_class = request.vehicle_class.unwrap_or(VehicleClass::Standard);
        let payment_method = request.payment_method.unwrap_or(PaymentMethod::Card);

        // Routing failure aborts creation: no distance, no price.
        let estimate = self
            .routing
            .distance_and_duration(&request.pickup.location, &request.destination.location)
            .await?;
        let route = self
            .routing
            .directions(&request.pickup.location, &request.destination.location)
            .await?;

        let price = pricing_service::estimate(
            estimate.distance_meters,
            estimate.duration_seconds,
            vehicle_class,
        );

        let now = Utc::now();
        let scheduled = request.scheduled_time.is_some_and(|t| t > now);

        let ride = Ride {
            id: IdGenerator::generate(IdType::Ride),
            passenger_id: passenger_id.to_string(),
            driver_id: None,
            status: if scheduled {
                RideStatus::Scheduled
            } else {
                RideStatus::Requested
            },
            pickup: request.pickup,
            destination: request.destination,
            vehicle_class,
            passengers,
            price,
            distance_meters: estimate.distance_meters,
            duration_seconds: estimate.duration_seconds,
            route,
            payment: crate::models::ride::Payment::new(payment_method),
            rating: Rating::default(),
            scheduled_time: request.scheduled_time,
            notes: request.notes,
            created_at: now,
            accepted_at: None,
            arrived_at: None,
            pickup_time: None,
            dropoff_time: None,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
        };
        self.store.put_ride(ride.clone()).await;
        tracing::info!(ride_id = %ride.id, total = price.total, "ride created");

        if scheduled {
            // No activation job exists yet; the ride stays `scheduled` until
            // the passenger acts on it.
            let event = NotificationEvent::new(
                "ride_scheduled",
                "Ride scheduled",
                &format!(
                    "Your ride for {} has been scheduled",
                    request.scheduled_time.unwrap_or(now)
                ),
            )
            .with_reference(&ride.id, "Ride");
            self.notifier.notify(passenger_id, &event).await;
            return Ok(RideRequestOutcome {
                ride,
                drivers_found: 0,
            });
        }

        let candidates = self
            .drivers
            .find_candidates(
                &ride.pickup.location,
                Some(vehicle_class),
                self.search_radius_m,
            )
            .await;

        if candidates.is_empty() {
            let ride = self
                .store
                .update_ride(&ride.id, |r| {
                    r.status = RideStatus::NoDriver;
                    Ok(())
                })
                .await?;
            let event = NotificationEvent::new(
                "ride_no_driver",
                "No driver available",
                "No driver is currently available in your area. Please try again later.",
            )
            .with_reference(&ride.id, "Ride");
            self.notifier.notify(passenger_id, &event).await;
            return Ok(RideRequestOutcome {
                ride,
                drivers_found: 0,
            });
        }

        let ride = self
            .store
            .update_ride(&ride.id, |r| {
                r.status = RideStatus::Searching;
                Ok(())
            })
            .await?;

        // Parallel fan-out to every candidate; recipients are independent
        // and partial failure never touches ride state.
        let summary = json!({
            "rideId": ride.id,
            "pickup": ride.pickup,
            "destination": ride.destination,
            "price": ride.price.total,
            "distance": ride.distance_meters,
            "duration": ride.duration_seconds,
        });
        let driver_event = NotificationEvent::new(
            "ride_request",
            "New ride request",
            &format!(
                "New ride from {} to {} - {:.2} {}",
                ride.pickup.address,
                ride.destination.address,
                ride.price.total,
                CURRENCY.to_uppercase()
            ),
        )
        .with_reference(&ride.id, "Ride")
        .with_data(summary);
        let recipients: Vec<String> = candidates.iter().map(|d| d.user_id.clone()).collect();
        self.notifier.notify_many(&recipients, &driver_event).await;

        let passenger_event = NotificationEvent::new(
            "ride_searching",
            "Searching for a driver",
            &format!("{} drivers notified near your pickup point", candidates.len()),
        )
        .with_reference(&ride.id, "Ride")
        .with_data(json!({
            "rideId": ride.id,
            "driversFound": candidates.len(),
        }));
        self.notifier.notify(passenger_id, &passenger_event).await;

        Ok(RideRequestOutcome {
            drivers_found: candidates.len(),
            ride,
        })
    }

    /// First acceptance wins. The searching→accepted transition and the
    /// driver availability flip happen as one check-and-set in the store;
    /// losers of the race get a conflict error.
    pub async fn accept_ride(&self, caller_user_id: &str, ride_id: &str) -> Result<Ride, AppError> {
        // Precondition order: ride exists, ride still searching, then driver
        // checks. The check-and-set below re-validates all of it atomically.
        let ride = self
            .store
            .get_ride(ride_id)
            .await
            .ok_or_else(|| AppError::RideNotFound(ride_id.to_string()))?;
        if ride.status != RideStatus::Searching {
            return Err(AppError::RideNotAvailable);
        }

        let driver = self.drivers.get_driver_by_user(caller_user_id).await?;

        let (ride, driver) = self
            .store
            .try_assign_driver(ride_id, &driver.id, Utc::now())
            .await?;
        tracing::info!(ride_id, driver_id = %driver.id, "ride accepted");

        let driver_name = match self.store.get_user(&driver.user_id).await {
            Some(user) => user.full_name(),
            None => "Your driver".to_string(),
        };
        let estimated_arrival = Utc::now() + Duration::minutes(ESTIMATED_PICKUP_MINUTES);
        let event = NotificationEvent::new(
            "ride_accepted",
            "Ride accepted",
            &format!("{} accepted your ride", driver_name),
        )
        .with_reference(&ride.id, "Ride")
        .with_data(json!({
            "rideId": ride.id,
            "driverId": driver.id,
            "driverName": driver_name,
            "vehicle": driver.vehicle,
            "estimatedArrival": estimated_arrival,
        }));
        self.notifier.notify(&ride.passenger_id, &event).await;

        // Other candidates stop displaying the request.
        self.realtime
            .send_to_driver_pool("ride_taken", json!({ "rideId": ride.id }))
            .await;

        Ok(ride)
    }

    pub async fn arrived_at_pickup(
        &self,
        caller_user_id: &str,
        ride_id: &str,
    ) -> Result<Ride, AppError> {
        let driver = self.drivers.get_driver_by_user(caller_user_id).await?;
        let ride = self
            .store
            .update_ride(ride_id, |r| {
                if r.driver_id.as_deref() != Some(driver.id.as_str()) {
                    return Err(AppError::NotRideParticipant);
                }
                if r.status != RideStatus::Accepted {
                    return Err(AppError::invalid_status(r.status, "confirm arrival for"));
                }
                r.status = RideStatus::Arrived;
                r.arrived_at = Some(Utc::now());
                Ok(())
            })
            .await?;

        let event = NotificationEvent::new(
            "ride_arrived",
            "Driver arrived",
            "Your driver has arrived at the pickup point",
        )
        .with_reference(&ride.id, "Ride")
        .with_data(json!({ "rideId": ride.id }));
        self.notifier.notify(&ride.passenger_id, &event).await;

        Ok(ride)
    }

    pub async fn start_ride(&self, caller_user_id: &str, ride_id: &str) -> Result<Ride, AppError> {
        let driver = self.drivers.get_driver_by_user(caller_user_id).await?;
        let ride = self
            .store
            .update_ride(ride_id, |r| {
                if r.driver_id.as_deref() != Some(driver.id.as_str()) {
                    return Err(AppError::NotRideParticipant);
                }
                if r.status != RideStatus::Arrived {
                    return Err(AppError::invalid_status(r.status, "start"));
                }
                r.status = RideStatus::InProgress;
                r.pickup_time = Some(Utc::now());
                Ok(())
            })
            .await?;

        let event =
            NotificationEvent::new("ride_started", "Ride started", "Your ride has started")
                .with_reference(&ride.id, "Ride")
                .with_data(json!({ "rideId": ride.id }));
        self.notifier.notify(&ride.passenger_id, &event).await;

        Ok(ride)
    }

    /// Completion first, settlement second: the status write is never held
    /// hostage to the payment call, and a failed charge leaves the ride
    /// completed with `payment.status = failed`.
    pub async fn complete_ride(
        &self,
        caller_user_id: &str,
        ride_id: &str,
    ) -> Result<Ride, AppError> {
        let driver = self.drivers.get_driver_by_user(caller_user_id).await?;
        let ride = self
            .store
            .update_ride(ride_id, |r| {
                if r.driver_id.as_deref() != Some(driver.id.as_str()) {
                    return Err(AppError::NotRideParticipant);
                }
                if r.status != RideStatus::InProgress {
                    return Err(AppError::invalid_status(r.status, "complete"));
                }
                r.status = RideStatus::Completed;
                r.dropoff_time = Some(Utc::now());
                Ok(())
            })
            .await?;

        let ride = match ride.payment.method {
            PaymentMethod::Cash => {
                self.store
                    .update_ride(ride_id, |r| {
                        r.payment.status = PaymentState::CashPending;
                        Ok(())
                    })
                    .await?
            }
            method => {
                let charge = self
                    .payments
                    .charge(
                        ride.price.total,
                        CURRENCY,
                        &ride.passenger_id,
                        &format!("Ride {}", ride.id),
                        method,
                    )
                    .await;
                match charge {
                    Ok(outcome) => {
                        self.store
                            .update_ride(ride_id, |r| {
                                r.payment.status = PaymentState::Completed;
                                r.payment.transaction_id = Some(outcome.transaction_id);
                                r.payment.receipt =
                                    Some(IdGenerator::generate(IdType::Receipt));
                                Ok(())
                            })
                            .await?
                    }
                    Err(err) => {
                        tracing::warn!(ride_id, %err, "charge failed, ride stays completed");
                        self.store
                            .update_ride(ride_id, |r| {
                                r.payment.status = PaymentState::Failed;
                                Ok(())
                            })
                            .await?
                    }
                }
            }
        };

        // Driver settlement happens regardless of the payment outcome.
        let earnings = (ride.price.total * DRIVER_SHARE * 100.0).round() / 100.0;
        self.store
            .update_driver(&driver.id, |d| {
                d.completed_rides += 1;
                d.is_available = true;
                d.current_ride = None;
                d.balance += earnings;
                Ok(())
            })
            .await?;
        tracing::info!(ride_id, driver_id = %driver.id, earnings, "ride completed");

        let event = NotificationEvent::new(
            "ride_completed",
            "Ride completed",
            "Your ride is complete. Thank you for riding with us!",
        )
        .with_reference(&ride.id, "Ride")
        .with_data(json!({
            "rideId": ride.id,
            "total": ride.price.total,
            "paymentStatus": ride.payment.status,
        }));
        self.notifier.notify(&ride.passenger_id, &event).await;

        Ok(ride)
    }

    pub async fn cancel_ride(
        &self,
        caller_user_id: &str,
        ride_id: &str,
        reason: Option<String>,
    ) -> Result<Ride, AppError> {
        let ride = self
            .store
            .get_ride(ride_id)
            .await
            .ok_or_else(|| AppError::RideNotFound(ride_id.to_string()))?;

        let assigned_driver = match &ride.driver_id {
            Some(driver_id) => self.store.get_driver(driver_id).await,
            None => None,
        };

        let cancelled_by = if ride.passenger_id == caller_user_id {
            CancelledBy::Passenger
        } else if assigned_driver
            .as_ref()
            .is_some_and(|d| d.user_id == caller_user_id)
        {
            CancelledBy::Driver
        } else {
            return Err(AppError::NotRideParticipant);
        };

        // The transition and the driver release commit under one store lock.
        // An acceptance that lands between the authorization read above and
        // this call is unwound too: the store frees whichever driver is on
        // the ride at commit time.
        let (ride, freed_driver) = self
            .store
            .cancel_ride(
                ride_id,
                cancelled_by,
                reason.unwrap_or_else(|| DEFAULT_CANCELLATION_REASON.to_string()),
                Utc::now(),
            )
            .await?;

        // Whoever cancelled, an assigned driver always goes back to the pool.
        if let Some(driver) = freed_driver {
            let event = NotificationEvent::new(
                "ride_cancelled",
                "Ride cancelled",
                &format!(
                    "The ride was cancelled: {}",
                    ride.cancellation_reason.as_deref().unwrap_or_default()
                ),
            )
            .with_reference(&ride.id, "Ride")
            .with_data(json!({ "rideId": ride.id }));
            let other_party = match cancelled_by {
                CancelledBy::Passenger => driver.user_id.clone(),
                CancelledBy::Driver => ride.passenger_id.clone(),
            };
            self.notifier.notify(&other_party, &event).await;
        }
        tracing::info!(ride_id, ?cancelled_by, "ride cancelled");

        Ok(ride)
    }

    /// Each side rates the other exactly once, only after completion. The
    /// rated user's running average is updated with a simple incremental
    /// mean.
    pub async fn rate_ride(
        &self,
        caller_user_id: &str,
        ride_id: &str,
        rating: u8,
        comment: Option<String>,
    ) -> Result<Ride, AppError> {
        if !(1..=5).contains(&rating) {
            return Err(AppError::validation_error(
                "rating",
                "must be between 1 and 5",
            ));
        }

        let ride = self
            .store
            .get_ride(ride_id)
            .await
            .ok_or_else(|| AppError::RideNotFound(ride_id.to_string()))?;

        let assigned_driver = match &ride.driver_id {
            Some(driver_id) => self.store.get_driver(driver_id).await,
            None => None,
        };

        let rater_is_passenger = ride.passenger_id == caller_user_id;
        let rater_is_driver = assigned_driver
            .as_ref()
            .is_some_and(|d| d.user_id == caller_user_id);
        if !rater_is_passenger && !rater_is_driver {
            return Err(AppError::NotRideParticipant);
        }

        let entry = RideRating {
            value: rating,
            comment,
            created_at: Utc::now(),
        };
        let ride = self
            .store
            .update_ride(ride_id, |r| {
                if r.status != RideStatus::Completed {
                    return Err(AppError::invalid_status(r.status, "rate"));
                }
                let slot = if rater_is_passenger {
                    &mut r.rating.by_passenger
                } else {
                    &mut r.rating.by_driver
                };
                if slot.is_some() {
                    return Err(AppError::AlreadyRated);
                }
                *slot = Some(entry);
                Ok(())
            })
            .await?;

        let rated_user_id = if rater_is_passenger {
            assigned_driver.map(|d| d.user_id)
        } else {
            Some(ride.passenger_id.clone())
        };
        if let Some(rated_user_id) = rated_user_id {
            self.store
                .update_user(&rated_user_id, |u| {
                    u.apply_rating(rating);
                    Ok(())
                })
                .await?;
        }

        Ok(ride)
    }

    // ----- reads -----

    /// A ride is visible only to its passenger, its assigned driver, or an
    /// admin.
    pub async fn get_ride(
        &self,
        caller_user_id: &str,
        caller_role: UserRole,
        ride_id: &str,
    ) -> Result<Ride, AppError> {
        let ride = self
            .store
            .get_ride(ride_id)
            .await
            .ok_or_else(|| AppError::RideNotFound(ride_id.to_string()))?;

        if caller_role == UserRole::Admin || ride.passenger_id == caller_user_id {
            return Ok(ride);
        }
        if let Some(driver_id) = &ride.driver_id {
            if let Some(driver) = self.store.get_driver(driver_id).await {
                if driver.user_id == caller_user_id {
                    return Ok(ride);
                }
            }
        }
        Err(AppError::NotRideParticipant)
    }

    pub async fn get_user_rides(
        &self,
        user_id: &str,
        query: &RideListQuery,
    ) -> Result<RideListPage, AppError> {
        let rides = self.store.rides_by_passenger(user_id).await;
        Ok(Self::paginate(rides, query))
    }

    pub async fn get_driver_rides(
        &self,
        caller_user_id: &str,
        query: &RideListQuery,
    ) -> Result<RideListPage, AppError> {
        let driver = self.drivers.get_driver_by_user(caller_user_id).await?;
        let rides = self.store.rides_by_driver(&driver.id).await;
        Ok(Self::paginate(rides, query))
    }

    fn paginate(mut rides: Vec<Ride>, query: &RideListQuery) -> RideListPage {
        if let Some(status) = query.status {
            rides.retain(|r| r.status == status);
        }
        rides.sort_by(|a, b| b.created_at.cmp(&a.created_at)); // newest first

        let total_count = rides.len();
        let page = query.page.unwrap_or(1).max(1);
        let limit = query
            .limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT);
        // page is caller-controlled; keep the offset arithmetic in usize so
        // an absurd page number walks off the end instead of overflowing.
        let start = (page as usize - 1).saturating_mul(limit as usize);
        let rides = rides
            .into_iter()
            .skip(start)
            .take(limit as usize)
            .collect();

        RideListPage {
            rides,
            total_count,
            page,
            limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ride::{GeoPoint, Place, RideRequest};
    use crate::services::{
        notification_service::MockPushSender,
        payment_service::MockGateway,
        realtime_service::RecordingChannel,
        routing_service::{FailingRouting, MockRouting},
    };
    use crate::test_support::{make_driver, make_user};

    struct Harness {
        store: Arc<StoreService>,
        rides: RideService,
        realtime: Arc<RecordingChannel>,
        payments: Arc<MockGateway>,
    }

    /// Two approved, available standard drivers near the pickup point, one
    /// passenger, routing fixed at 5km/10min.
    async fn harness() -> Harness {
        let store = Arc::new(StoreService::new());
        let realtime = Arc::new(RecordingChannel::new());
        let payments = Arc::new(MockGateway::new());

        store.put_user(make_user("usr-p1", UserRole::Passenger)).await;
        store.put_user(make_user("usr-d1", UserRole::Driver)).await;
        store.put_user(make_user("usr-d2", UserRole::Driver)).await;

        let mut d1 = make_driver("drv-1", "usr-d1", true);
        d1.location = GeoPoint::new(2.3530, 48.8570);
        let mut d2 = make_driver("drv-2", "usr-d2", true);
        d2.location = GeoPoint::new(2.3510, 48.8560);
        store.put_driver(d1).await;
        store.put_driver(d2).await;

        let drivers = Arc::new(DriverService::new(store.clone()));
        let notifier = Arc::new(NotificationService::new(
            store.clone(),
            Arc::new(MockPushSender),
            realtime.clone(),
        ));
        let rides = RideService::new(
            store.clone(),
            drivers,
            notifier,
            Arc::new(MockRouting::fixed(5000.0, 600.0)),
            payments.clone(),
            realtime.clone(),
            5000.0,
        );

        Harness {
            store,
            rides,
            realtime,
            payments,
        }
    }

    fn request(payment_method: PaymentMethod) -> RideRequest {
        RideRequest {
            pickup: Place {
                address: "1 Rue de Rivoli".to_string(),
                location: GeoPoint::new(2.3522, 48.8566),
            },
            destination: Place {
                address: "Gare de Lyon".to_string(),
                location: GeoPoint::new(2.3730, 48.8443),
            },
            vehicle_class: Some(VehicleClass::Standard),
            passengers: Some(1),
            payment_method: Some(payment_method),
            scheduled_time: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn full_lifecycle_cash_scenario() {
        let h = harness().await;

        // Request: two candidates -> searching, both drivers notified
        let outcome = h
            .rides
            .request_ride("usr-p1", request(PaymentMethod::Cash))
            .await
            .unwrap();
        assert_eq!(outcome.drivers_found, 2);
        assert_eq!(outcome.ride.status, RideStatus::Searching);
        assert_eq!(outcome.ride.price.total, 12.50);
        assert_eq!(h.store.notifications_for("usr-d1").await.len(), 1);
        assert_eq!(h.store.notifications_for("usr-d2").await.len(), 1);
        assert_eq!(h.realtime.user_events("usr-d1", "ride_request").await, 1);

        let ride_id = outcome.ride.id.clone();

        // Driver 1 accepts; driver 2 loses the race
        let ride = h.rides.accept_ride("usr-d1", &ride_id).await.unwrap();
        assert_eq!(ride.status, RideStatus::Accepted);
        assert_eq!(ride.driver_id.as_deref(), Some("drv-1"));
        assert!(ride.accepted_at.is_some());
        let d1 = h.store.get_driver("drv-1").await.unwrap();
        assert!(!d1.is_available);
        assert_eq!(d1.current_ride.as_deref(), Some(ride_id.as_str()));
        assert_eq!(h.realtime.pool_events("ride_taken").await, 1);

        let err = h.rides.accept_ride("usr-d2", &ride_id).await.unwrap_err();
        assert!(matches!(err, AppError::RideNotAvailable));

        // Arrived -> started -> completed
        let ride = h.rides.arrived_at_pickup("usr-d1", &ride_id).await.unwrap();
        assert_eq!(ride.status, RideStatus::Arrived);
        assert!(ride.arrived_at.is_some());

        let ride = h.rides.start_ride("usr-d1", &ride_id).await.unwrap();
        assert_eq!(ride.status, RideStatus::InProgress);
        assert!(ride.pickup_time.is_some());

        let ride = h.rides.complete_ride("usr-d1", &ride_id).await.unwrap();
        assert_eq!(ride.status, RideStatus::Completed);
        assert_eq!(ride.payment.status, PaymentState::CashPending);
        assert_eq!(ride.price.total, 12.50); // price never recomputed

        let d1 = h.store.get_driver("drv-1").await.unwrap();
        assert!(d1.is_available);
        assert_eq!(d1.current_ride, None);
        assert_eq!(d1.completed_rides, 1);
        assert_eq!(d1.balance, 10.00); // 80% of 12.50

        // Passenger rates driver 5 stars
        let ride = h
            .rides
            .rate_ride("usr-p1", &ride_id, 5, Some("great".to_string()))
            .await
            .unwrap();
        assert_eq!(ride.rating.by_passenger.as_ref().unwrap().value, 5);
        let driver_user = h.store.get_user("usr-d1").await.unwrap();
        assert_eq!(driver_user.rating, 5.0);
        assert_eq!(driver_user.rating_count, 1);
    }

    #[tokio::test]
    async fn card_payment_success_records_transaction_and_receipt() {
        let h = harness().await;
        let outcome = h
            .rides
            .request_ride("usr-p1", request(PaymentMethod::Card))
            .await
            .unwrap();
        let ride_id = outcome.ride.id.clone();
        h.rides.accept_ride("usr-d1", &ride_id).await.unwrap();
        h.rides.arrived_at_pickup("usr-d1", &ride_id).await.unwrap();
        h.rides.start_ride("usr-d1", &ride_id).await.unwrap();

        let ride = h.rides.complete_ride("usr-d1", &ride_id).await.unwrap();
        assert_eq!(ride.payment.status, PaymentState::Completed);
        assert!(ride.payment.transaction_id.is_some());
        assert!(ride.payment.receipt.is_some());
    }

    #[tokio::test]
    async fn failed_charge_leaves_ride_completed_and_driver_credited() {
        let h = harness().await;
        let outcome = h
            .rides
            .request_ride("usr-p1", request(PaymentMethod::Card))
            .await
            .unwrap();
        let ride_id = outcome.ride.id.clone();
        h.rides.accept_ride("usr-d1", &ride_id).await.unwrap();
        h.rides.arrived_at_pickup("usr-d1", &ride_id).await.unwrap();
        h.rides.start_ride("usr-d1", &ride_id).await.unwrap();

        h.payments.set_failing(true);
        let ride = h.rides.complete_ride("usr-d1", &ride_id).await.unwrap();
        assert_eq!(ride.status, RideStatus::Completed);
        assert_eq!(ride.payment.status, PaymentState::Failed);
        assert_eq!(ride.payment.transaction_id, None);

        let d1 = h.store.get_driver("drv-1").await.unwrap();
        assert_eq!(d1.balance, 10.00);
        assert_eq!(d1.completed_rides, 1);
        assert!(d1.is_available);
    }

    #[tokio::test]
    async fn at_most_one_concurrent_acceptance() {
        let h = harness().await;
        for i in 3..=6 {
            let user_id = format!("usr-d{}", i);
            h.store.put_user(make_user(&user_id, UserRole::Driver)).await;
            let mut d = make_driver(&format!("drv-{}", i), &user_id, true);
            d.location = GeoPoint::new(2.3525, 48.8568);
            h.store.put_driver(d).await;
        }

        let outcome = h
            .rides
            .request_ride("usr-p1", request(PaymentMethod::Cash))
            .await
            .unwrap();
        let ride_id = outcome.ride.id.clone();

        let rides = Arc::new(h.rides);
        let mut handles = Vec::new();
        for i in 1..=6 {
            let rides = rides.clone();
            let ride_id = ride_id.clone();
            let user_id = format!("usr-d{}", i);
            handles.push(tokio::spawn(async move {
                rides.accept_ride(&user_id, &ride_id).await
            }));
        }

        let mut winners = 0;
        let mut losers = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(ride) => {
                    winners += 1;
                    assert_eq!(ride.status, RideStatus::Accepted);
                }
                Err(AppError::RideNotAvailable) => losers += 1,
                Err(other) => panic!("unexpected error: {}", other),
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(losers, 5);

        // Exactly one driver is bound to the ride and no driver is left in a
        // half-assigned state.
        let ride = h.store.get_ride(&ride_id).await.unwrap();
        let winner_id = ride.driver_id.clone().unwrap();
        for driver in h.store.all_drivers().await {
            if driver.id == winner_id {
                assert!(!driver.is_available);
                assert_eq!(driver.current_ride.as_deref(), Some(ride_id.as_str()));
            } else {
                assert!(driver.is_available);
                assert_eq!(driver.current_ride, None);
            }
        }
    }

    #[tokio::test]
    async fn state_machine_rejects_undefined_transitions() {
        let h = harness().await;
        let outcome = h
            .rides
            .request_ride("usr-p1", request(PaymentMethod::Cash))
            .await
            .unwrap();
        let ride_id = outcome.ride.id.clone();

        // searching: arrival/start/complete are not defined
        for result in [
            h.rides.arrived_at_pickup("usr-d1", &ride_id).await,
            h.rides.start_ride("usr-d1", &ride_id).await,
            h.rides.complete_ride("usr-d1", &ride_id).await,
        ] {
            assert!(result.is_err());
        }
        let ride = h.store.get_ride(&ride_id).await.unwrap();
        assert_eq!(ride.status, RideStatus::Searching); // unmodified

        // completed is terminal: no cancel, no re-complete
        h.rides.accept_ride("usr-d1", &ride_id).await.unwrap();
        h.rides.arrived_at_pickup("usr-d1", &ride_id).await.unwrap();
        // arrived: completing without starting is rejected
        assert!(matches!(
            h.rides.complete_ride("usr-d1", &ride_id).await,
            Err(AppError::InvalidRideStatus { .. })
        ));
        h.rides.start_ride("usr-d1", &ride_id).await.unwrap();
        h.rides.complete_ride("usr-d1", &ride_id).await.unwrap();
        assert!(matches!(
            h.rides.cancel_ride("usr-p1", &ride_id, None).await,
            Err(AppError::InvalidRideStatus { .. })
        ));
        assert!(matches!(
            h.rides.start_ride("usr-d1", &ride_id).await,
            Err(AppError::InvalidRideStatus { .. })
        ));
    }

    #[tokio::test]
    async fn no_driver_outcome_is_not_an_error() {
        let h = harness().await;
        for driver in h.store.all_drivers().await {
            h.store
                .update_driver(&driver.id, |d| {
                    d.is_available = false;
                    Ok(())
                })
                .await
                .unwrap();
        }

        let outcome = h
            .rides
            .request_ride("usr-p1", request(PaymentMethod::Cash))
            .await
            .unwrap();
        assert_eq!(outcome.ride.status, RideStatus::NoDriver);
        assert_eq!(outcome.drivers_found, 0);
        // passenger was told
        let notifications = h.store.notifications_for("usr-p1").await;
        assert!(notifications.iter().any(|n| n.kind == "ride_no_driver"));
    }

    #[tokio::test]
    async fn scheduled_ride_skips_driver_search() {
        let h = harness().await;
        let mut req = request(PaymentMethod::Card);
        req.scheduled_time = Some(Utc::now() + Duration::hours(3));

        let outcome = h.rides.request_ride("usr-p1", req).await.unwrap();
        assert_eq!(outcome.ride.status, RideStatus::Scheduled);
        assert_eq!(outcome.drivers_found, 0);
        // no driver was bothered
        assert!(h.store.notifications_for("usr-d1").await.is_empty());
        // passenger got the confirmation
        let notifications = h.store.notifications_for("usr-p1").await;
        assert!(notifications.iter().any(|n| n.kind == "ride_scheduled"));

        // scheduled rides can be cancelled by the passenger
        let ride = h
            .rides
            .cancel_ride("usr-p1", &outcome.ride.id, None)
            .await
            .unwrap();
        assert_eq!(ride.status, RideStatus::Cancelled);
        assert_eq!(
            ride.cancellation_reason.as_deref(),
            Some("No reason provided")
        );
    }

    #[tokio::test]
    async fn routing_failure_aborts_creation() {
        let h = harness().await;
        let store = h.store.clone();
        let drivers = Arc::new(DriverService::new(store.clone()));
        let notifier = Arc::new(NotificationService::new(
            store.clone(),
            Arc::new(MockPushSender),
            h.realtime.clone(),
        ));
        let rides = RideService::new(
            store,
            drivers,
            notifier,
            Arc::new(FailingRouting),
            h.payments.clone(),
            h.realtime.clone(),
            5000.0,
        );

        let err = rides
            .request_ride("usr-p1", request(PaymentMethod::Card))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::RoutingFailure(_)));
    }

    #[tokio::test]
    async fn cancellation_frees_driver_for_both_cancellers() {
        for canceller in ["usr-p1", "usr-d1"] {
            let h = harness().await;
            let outcome = h
                .rides
                .request_ride("usr-p1", request(PaymentMethod::Cash))
                .await
                .unwrap();
            let ride_id = outcome.ride.id.clone();
            h.rides.accept_ride("usr-d1", &ride_id).await.unwrap();

            let ride = h
                .rides
                .cancel_ride(canceller, &ride_id, Some("change of plans".to_string()))
                .await
                .unwrap();
            assert_eq!(ride.status, RideStatus::Cancelled);
            assert_eq!(ride.driver_id.as_deref(), Some("drv-1")); // kept for audit

            let driver = h.store.get_driver("drv-1").await.unwrap();
            assert!(driver.is_available, "canceller {}", canceller);
            assert_eq!(driver.current_ride, None);
        }
    }

    #[tokio::test]
    async fn cancel_by_stranger_is_forbidden() {
        let h = harness().await;
        let outcome = h
            .rides
            .request_ride("usr-p1", request(PaymentMethod::Cash))
            .await
            .unwrap();
        let err = h
            .rides
            .cancel_ride("usr-d2", &outcome.ride.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotRideParticipant));
    }

    #[tokio::test]
    async fn rating_is_once_per_side_and_symmetric() {
        let h = harness().await;
        let outcome = h
            .rides
            .request_ride("usr-p1", request(PaymentMethod::Cash))
            .await
            .unwrap();
        let ride_id = outcome.ride.id.clone();
        h.rides.accept_ride("usr-d1", &ride_id).await.unwrap();
        h.rides.arrived_at_pickup("usr-d1", &ride_id).await.unwrap();
        h.rides.start_ride("usr-d1", &ride_id).await.unwrap();
        h.rides.complete_ride("usr-d1", &ride_id).await.unwrap();

        h.rides.rate_ride("usr-p1", &ride_id, 5, None).await.unwrap();
        let err = h
            .rides
            .rate_ride("usr-p1", &ride_id, 1, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyRated));
        // stored rating unchanged
        let ride = h.store.get_ride(&ride_id).await.unwrap();
        assert_eq!(ride.rating.by_passenger.as_ref().unwrap().value, 5);

        // driver rates passenger
        h.rides.rate_ride("usr-d1", &ride_id, 4, None).await.unwrap();
        let passenger = h.store.get_user("usr-p1").await.unwrap();
        assert_eq!(passenger.rating, 4.0);
        assert_eq!(passenger.rating_count, 1);

        // rating before completion is rejected
        let other = h
            .rides
            .request_ride("usr-p1", request(PaymentMethod::Cash))
            .await
            .unwrap();
        assert!(matches!(
            h.rides.rate_ride("usr-p1", &other.ride.id, 5, None).await,
            Err(AppError::InvalidRideStatus { .. })
        ));
    }

    #[tokio::test]
    async fn reads_are_scoped_and_paginated() {
        let h = harness().await;
        for _ in 0..3 {
            h.rides
                .request_ride("usr-p1", request(PaymentMethod::Cash))
                .await
                .unwrap();
        }
        let outcome = h
            .rides
            .request_ride("usr-p1", request(PaymentMethod::Cash))
            .await
            .unwrap();
        h.rides.accept_ride("usr-d1", &outcome.ride.id).await.unwrap();

        // access control
        let ride = h
            .rides
            .get_ride("usr-p1", UserRole::Passenger, &outcome.ride.id)
            .await
            .unwrap();
        assert_eq!(ride.id, outcome.ride.id);
        h.rides
            .get_ride("usr-d1", UserRole::Driver, &outcome.ride.id)
            .await
            .unwrap();
        h.rides
            .get_ride("usr-admin", UserRole::Admin, &outcome.ride.id)
            .await
            .unwrap();
        assert!(matches!(
            h.rides
                .get_ride("usr-d2", UserRole::Driver, &outcome.ride.id)
                .await,
            Err(AppError::NotRideParticipant)
        ));

        // pagination, newest first
        let page = h
            .rides
            .get_user_rides(
                "usr-p1",
                &RideListQuery {
                    status: None,
                    page: Some(1),
                    limit: Some(2),
                },
            )
            .await
            .unwrap();
        assert_eq!(page.total_count, 4);
        assert_eq!(page.rides.len(), 2);
        assert!(page.rides[0].created_at >= page.rides[1].created_at);

        // status filter
        let searching = h
            .rides
            .get_user_rides(
                "usr-p1",
                &RideListQuery {
                    status: Some(RideStatus::Searching),
                    page: None,
                    limit: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(searching.total_count, 3);

        // driver-scoped list
        let driver_rides = h
            .rides
            .get_driver_rides("usr-d1", &RideListQuery::default())
            .await
            .unwrap();
        assert_eq!(driver_rides.total_count, 1);
        assert_eq!(driver_rides.rides[0].id, outcome.ride.id);
    }

    #[tokio::test]
    async fn pagination_survives_extreme_page_numbers() {
        let h = harness().await;
        h.rides
            .request_ride("usr-p1", request(PaymentMethod::Cash))
            .await
            .unwrap();

        let page = h
            .rides
            .get_user_rides(
                "usr-p1",
                &RideListQuery {
                    status: None,
                    page: Some(u32::MAX),
                    limit: Some(100),
                },
            )
            .await
            .unwrap();
        assert_eq!(page.total_count, 1);
        assert!(page.rides.is_empty());
        assert_eq!(page.page, u32::MAX);
    }

    #[tokio::test]
    async fn invalid_passenger_count_is_rejected() {
        let h = harness().await;
        let mut req = request(PaymentMethod::Card);
        req.passengers = Some(0);
        let err = h.rides.request_ride("usr-p1", req).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationFailed(_)));
    }
}
