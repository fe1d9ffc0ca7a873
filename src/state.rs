// src/state.rs
use std::sync::Arc;

use crate::services::{
    driver_service::{DEFAULT_SEARCH_RADIUS_M, DriverService},
    notification_service::{FcmConfig, FcmPushSender, MockPushSender, NotificationService, PushSender},
    payment_service::{MockGateway, PaymentGateway, StripeGateway},
    realtime_service::{LogChannel, RealtimeChannel},
    ride_service::RideService,
    routing_service::{HttpRouting, MockRouting, Routing},
    store_service::StoreService,
};

#[derive(Clone)]
pub struct AppConfig {
    pub listen_addr: String,
    pub fcm_server_key: Option<String>,
    pub payment_secret_key: Option<String>,
    pub routing_api_key: Option<String>,
    pub search_radius_m: f64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            listen_addr: std::env::var("LISTEN_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            fcm_server_key: std::env::var("FCM_SERVER_KEY").ok().filter(|v| !v.is_empty()),
            payment_secret_key: std::env::var("PAYMENT_SECRET_KEY")
                .ok()
                .filter(|v| !v.is_empty()),
            routing_api_key: std::env::var("ROUTING_API_KEY")
                .ok()
                .filter(|v| !v.is_empty()),
            search_radius_m: std::env::var("SEARCH_RADIUS_M")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_SEARCH_RADIUS_M),
        }
    }
}

pub struct AppState {
    pub store: Arc<StoreService>,
    pub driver_service: Arc<DriverService>,
    pub ride_service: Arc<RideService>,
    pub notification_service: Arc<NotificationService>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let store = Arc::new(StoreService::new());
        let driver_service = Arc::new(DriverService::new(store.clone()));

        let push: Arc<dyn PushSender> = match &config.fcm_server_key {
            Some(key) => Arc::new(FcmPushSender::new(FcmConfig::new(key.clone()))),
            None => {
                tracing::warn!("FCM_SERVER_KEY not set, using mock push sender");
                Arc::new(MockPushSender)
            }
        };

        let payments: Arc<dyn PaymentGateway> = match &config.payment_secret_key {
            Some(key) => Arc::new(StripeGateway::new(key.clone())),
            None => {
                tracing::warn!("PAYMENT_SECRET_KEY not set, using mock payment gateway");
                Arc::new(MockGateway::new())
            }
        };

        let routing: Arc<dyn Routing> = match &config.routing_api_key {
            Some(key) => Arc::new(HttpRouting::new(key.clone())),
            None => {
                tracing::warn!("ROUTING_API_KEY not set, using mock routing");
                Arc::new(MockRouting::new())
            }
        };

        let realtime: Arc<dyn RealtimeChannel> = Arc::new(LogChannel);

        let notification_service = Arc::new(NotificationService::new(
            store.clone(),
            push,
            realtime.clone(),
        ));

        let ride_service = Arc::new(RideService::new(
            store.clone(),
            driver_service.clone(),
            notification_service.clone(),
            routing,
            payments,
            realtime,
            config.search_radius_m,
        ));

        Self {
            store,
            driver_service,
            ride_service,
            notification_service,
            config,
        }
    }
}
