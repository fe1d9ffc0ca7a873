use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;

use kestrel_dispatch::{
    handlers::{driver_handler, ride_handler},
    state::{AppConfig, AppState},
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().init();

    let config = AppConfig::from_env();
    let listen_addr = config.listen_addr.clone();
    let app_state = Arc::new(AppState::new(config));

    let app = Router::new()
        .route("/rides", post(ride_handler::request_ride))
        .route("/rides/user", get(ride_handler::get_user_rides))
        .route("/rides/driver", get(ride_handler::get_driver_rides))
        .route("/rides/:id", get(ride_handler::get_ride))
        .route("/rides/:id/accept", post(ride_handler::accept_ride))
        .route("/rides/:id/arrived", post(ride_handler::arrived_at_pickup))
        .route("/rides/:id/start", post(ride_handler::start_ride))
        .route("/rides/:id/complete", post(ride_handler::complete_ride))
        .route("/rides/:id/cancel", post(ride_handler::cancel_ride))
        .route("/rides/:id/rate", post(ride_handler::rate_ride))
        .route("/drivers", post(driver_handler::register_driver))
        .route("/drivers/location", post(driver_handler::update_location))
        .route(
            "/drivers/availability",
            post(driver_handler::set_availability),
        )
        .route("/drivers/:id", get(driver_handler::get_driver))
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    tracing::info!(%listen_addr, "kestrel-dispatch listening");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
