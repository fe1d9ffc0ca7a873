// src/handlers/ride_handler.rs
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use std::sync::Arc;

use super::Identity;
use crate::{
    errors::KestrelError,
    models::{
        ride::{CancelRideRequest, RateRideRequest, RideListQuery, RideRequest, RideStatus},
        user::UserRole,
    },
    state::AppState,
    utils::id_generator::{IdGenerator, IdType},
};

/// Ride ids have a fixed shape; reject malformed ones before touching the
/// store so the caller gets a 400 instead of a misleading 404.
fn ensure_ride_id(ride_id: &str) -> Result<(), KestrelError> {
    if IdGenerator::validate_id(ride_id, Some(IdType::Ride)) {
        Ok(())
    } else {
        Err(KestrelError::bad_request(format!(
            "Malformed ride id: {}",
            ride_id
        )))
    }
}

pub async fn request_ride(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(request): Json<RideRequest>,
) -> Result<impl IntoResponse, KestrelError> {
    identity.require_role(UserRole::Passenger)?;

    let outcome = state
        .ride_service
        .request_ride(&identity.user_id, request)
        .await?;

    // "No driver" is a normal outcome, reported as such rather than an error.
    let (status, success, message) = match outcome.ride.status {
        RideStatus::NoDriver => (StatusCode::OK, false, "No driver available"),
        RideStatus::Scheduled => (StatusCode::CREATED, true, "Ride scheduled successfully"),
        _ => (StatusCode::CREATED, true, "Ride requested successfully"),
    };

    Ok((
        status,
        Json(json!({
            "success": success,
            "message": message,
            "ride": outcome.ride,
            "driversFound": outcome.drivers_found,
        })),
    ))
}

pub async fn accept_ride(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(ride_id): Path<String>,
) -> Result<impl IntoResponse, KestrelError> {
    identity.require_role(UserRole::Driver)?;
    ensure_ride_id(&ride_id)?;
    let ride = state
        .ride_service
        .accept_ride(&identity.user_id, &ride_id)
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Ride accepted successfully",
        "ride": ride,
    })))
}

pub async fn arrived_at_pickup(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(ride_id): Path<String>,
) -> Result<impl IntoResponse, KestrelError> {
    identity.require_role(UserRole::Driver)?;
    ensure_ride_id(&ride_id)?;
    let ride = state
        .ride_service
        .arrived_at_pickup(&identity.user_id, &ride_id)
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Arrival confirmed successfully",
        "ride": ride,
    })))
}

pub async fn start_ride(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(ride_id): Path<String>,
) -> Result<impl IntoResponse, KestrelError> {
    identity.require_role(UserRole::Driver)?;
    ensure_ride_id(&ride_id)?;
    let ride = state
        .ride_service
        .start_ride(&identity.user_id, &ride_id)
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Ride started successfully",
        "ride": ride,
    })))
}

pub async fn complete_ride(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(ride_id): Path<String>,
) -> Result<impl IntoResponse, KestrelError> {
    identity.require_role(UserRole::Driver)?;
    ensure_ride_id(&ride_id)?;
    let ride = state
        .ride_service
        .complete_ride(&identity.user_id, &ride_id)
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Ride completed successfully",
        "ride": ride,
    })))
}

pub async fn cancel_ride(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(ride_id): Path<String>,
    Json(request): Json<CancelRideRequest>,
) -> Result<impl IntoResponse, KestrelError> {
    ensure_ride_id(&ride_id)?;
    let ride = state
        .ride_service
        .cancel_ride(&identity.user_id, &ride_id, request.reason)
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Ride cancelled successfully",
        "ride": ride,
    })))
}

pub async fn rate_ride(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(ride_id): Path<String>,
    Json(request): Json<RateRideRequest>,
) -> Result<impl IntoResponse, KestrelError> {
    ensure_ride_id(&ride_id)?;
    let ride = state
        .ride_service
        .rate_ride(&identity.user_id, &ride_id, request.rating, request.comment)
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Rating recorded successfully",
        "ride": ride,
    })))
}

pub async fn get_ride(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Path(ride_id): Path<String>,
) -> Result<impl IntoResponse, KestrelError> {
    ensure_ride_id(&ride_id)?;
    let ride = state
        .ride_service
        .get_ride(&identity.user_id, identity.role, &ride_id)
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Ride found",
        "ride": ride,
    })))
}

pub async fn get_user_rides(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(query): Query<RideListQuery>,
) -> Result<impl IntoResponse, KestrelError> {
    let page = state
        .ride_service
        .get_user_rides(&identity.user_id, &query)
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Rides found",
        "rides": page.rides,
        "totalCount": page.total_count,
        "page": page.page,
        "limit": page.limit,
    })))
}

pub async fn get_driver_rides(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Query(query): Query<RideListQuery>,
) -> Result<impl IntoResponse, KestrelError> {
    identity.require_role(UserRole::Driver)?;
    let page = state
        .ride_service
        .get_driver_rides(&identity.user_id, &query)
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Rides found",
        "rides": page.rides,
        "totalCount": page.total_count,
        "page": page.page,
        "limit": page.limit,
    })))
}
