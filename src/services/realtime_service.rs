// src/services/realtime_service.rs
//
// Realtime channel: best-effort, at-most-once, no delivery confirmation.
// Injected into the dispatcher and the lifecycle manager so tests can swap
// it; never a module-level singleton.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

#[async_trait]
pub trait RealtimeChannel: Send + Sync {
    async fn send_to_user(&self, user_id: &str, event: &str, payload: Value);
    async fn send_to_driver_pool(&self, event: &str, payload: Value);
}

/// Default stand-in for a socket gateway: emits to the log and drops the
/// payload. Useful in development and as the no-op channel.
pub struct LogChannel;

#[async_trait]
impl RealtimeChannel for LogChannel {
    async fn send_to_user(&self, user_id: &str, event: &str, _payload: Value) {
        tracing::debug!(user_id, event, "realtime emit (user)");
    }

    async fn send_to_driver_pool(&self, event: &str, _payload: Value) {
        tracing::debug!(event, "realtime emit (driver pool)");
    }
}

/// One captured emission, for assertions.
#[derive(Debug, Clone)]
pub enum Emitted {
    ToUser {
        user_id: String,
        event: String,
        payload: Value,
    },
    ToDriverPool {
        event: String,
        payload: Value,
    },
}

/// Records every emission; the test double for `RealtimeChannel`.
#[derive(Default)]
pub struct RecordingChannel {
    events: Mutex<Vec<Emitted>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<Emitted> {
        self.events.lock().await.clone()
    }

    pub async fn user_events(&self, user_id: &str, event: &str) -> usize {
        self.events
            .lock()
            .await
            .iter()
            .filter(|e| {
                matches!(e, Emitted::ToUser { user_id: u, event: ev, .. }
                    if u == user_id && ev == event)
            })
            .count()
    }

    pub async fn pool_events(&self, event: &str) -> usize {
        self.events
            .lock()
            .await
            .iter()
            .filter(|e| matches!(e, Emitted::ToDriverPool { event: ev, .. } if ev == event))
            .count()
    }
}

#[async_trait]
impl RealtimeChannel for RecordingChannel {
    async fn send_to_user(&self, user_id: &str, event: &str, payload: Value) {
        self.events.lock().await.push(Emitted::ToUser {
            user_id: user_id.to_string(),
            event: event.to_string(),
            payload,
        });
    }

    async fn send_to_driver_pool(&self, event: &str, payload: Value) {
        self.events.lock().await.push(Emitted::ToDriverPool {
            event: event.to_string(),
            payload,
        });
    }
}
