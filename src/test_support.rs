// src/test_support.rs
//
// Shared fixture builders for unit tests.

use chrono::Utc;

use crate::models::{
    driver::{ApprovalStatus, Driver, Vehicle},
    ride::{
        GeoPoint, Payment, PaymentMethod, Place, Price, Rating, Ride, RideStatus, RouteInfo,
        VehicleClass,
    },
    user::{User, UserRole},
};

pub fn make_place(address: &str, longitude: f64, latitude: f64) -> Place {
    Place {
        address: address.to_string(),
        location: GeoPoint::new(longitude, latitude),
    }
}

pub fn make_ride(id: &str, passenger_id: &str, status: RideStatus) -> Ride {
    Ride {
        id: id.to_string(),
        passenger_id: passenger_id.to_string(),
        driver_id: None,
        status,
        pickup: make_place("1 Rue de Rivoli", 2.3522, 48.8566),
        destination: make_place("Gare de Lyon", 2.3730, 48.8443),
        vehicle_class: VehicleClass::Standard,
        passengers: 1,
        price: Price {
            base: 2.50,
            distance: 7.00,
            time: 3.00,
            total: 12.50,
        },
        distance_meters: 5000.0,
        duration_seconds: 600.0,
        route: RouteInfo::default(),
        payment: Payment::new(PaymentMethod::Cash),
        rating: Rating::default(),
        scheduled_time: None,
        notes: None,
        created_at: Utc::now(),
        accepted_at: None,
        arrived_at: None,
        pickup_time: None,
        dropoff_time: None,
        cancelled_at: None,
        cancelled_by: None,
        cancellation_reason: None,
    }
}

pub fn make_driver(id: &str, user_id: &str, available: bool) -> Driver {
    let now = Utc::now();
    Driver {
        id: id.to_string(),
        user_id: user_id.to_string(),
        license_number: "B123456".to_string(),
        is_verified: true,
        approval: ApprovalStatus::Approved,
        is_available: available,
        current_ride: None,
        location: GeoPoint::new(0.0, 0.0),
        vehicle: Vehicle {
            vehicle_class: VehicleClass::Standard,
            make: "Toyota".to_string(),
            model: "Prius".to_string(),
            year: 2021,
            color: "grey".to_string(),
            license_plate: "AB-123-CD".to_string(),
            insurance_number: "INS-42".to_string(),
        },
        balance: 0.0,
        completed_rides: 0,
        created_at: now,
        updated_at: now,
    }
}

pub fn make_user(id: &str, role: UserRole) -> User {
    User {
        id: id.to_string(),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        phone: "+33600000000".to_string(),
        role,
        rating: 0.0,
        rating_count: 0,
        device_token: None,
        created_at: Utc::now(),
    }
}
