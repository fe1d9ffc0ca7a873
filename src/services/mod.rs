// src/services/mod.rs
pub mod driver_service;
pub mod notification_service;
pub mod payment_service;
pub mod pricing_service;
pub mod realtime_service;
pub mod ride_service;
pub mod routing_service;
pub mod store_service;
