// src/handlers/driver_handler.rs
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use std::sync::Arc;

use super::Identity;
use crate::{
    errors::KestrelError,
    models::{
        driver::{DriverAvailabilityUpdate, DriverLocationUpdate, DriverRegistration,
            DriverResponse},
        user::UserRole,
    },
    state::AppState,
};

pub async fn register_driver(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(mut registration): Json<DriverRegistration>,
) -> Result<impl IntoResponse, KestrelError> {
    // A driver record always belongs to the calling account.
    registration.user_id = identity.user_id;
    let driver = state.driver_service.register_driver(registration).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Driver registered successfully",
            "driver": DriverResponse::from(driver),
        })),
    ))
}

pub async fn get_driver(
    State(state): State<Arc<AppState>>,
    _identity: Identity,
    Path(driver_id): Path<String>,
) -> Result<impl IntoResponse, KestrelError> {
    let driver = state.driver_service.get_driver(&driver_id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Driver found",
        "driver": DriverResponse::from(driver),
    })))
}

pub async fn update_location(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(update): Json<DriverLocationUpdate>,
) -> Result<impl IntoResponse, KestrelError> {
    identity.require_role(UserRole::Driver)?;
    let driver = state
        .driver_service
        .get_driver_by_user(&identity.user_id)
        .await?;
    state
        .driver_service
        .update_location(&driver.id, update.location)
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Location updated",
    })))
}

pub async fn set_availability(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    Json(update): Json<DriverAvailabilityUpdate>,
) -> Result<impl IntoResponse, KestrelError> {
    identity.require_role(UserRole::Driver)?;
    let driver = state
        .driver_service
        .get_driver_by_user(&identity.user_id)
        .await?;
    let driver = state
        .driver_service
        .set_availability(&driver.id, update.is_available)
        .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Availability updated",
        "driver": DriverResponse::from(driver),
    })))
}
