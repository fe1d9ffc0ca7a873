// src/services/notification_service.rs
use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::{
    models::notification::{AttemptOutcome, DeliveryResult, Notification, NotificationEvent},
    services::{realtime_service::RealtimeChannel, store_service::StoreService},
    utils::id_generator::{IdGenerator, IdType},
};

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("push send failed: {0}")]
    Push(String),

    #[error("recipient has no device token")]
    NoDeviceToken,
}

/// Auxiliary push channel (FCM or a stand-in).
#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(
        &self,
        device_token: &str,
        title: &str,
        body: &str,
        data: &serde_json::Value,
    ) -> Result<(), DeliveryError>;
}

#[derive(Debug, Clone)]
pub struct FcmConfig {
    pub server_key: String,
    pub url: String,
}

impl FcmConfig {
    pub fn new(server_key: String) -> Self {
        Self {
            server_key,
            url: "https://fcm.googleapis.com/fcm/send".to_string(),
        }
    }
}

pub struct FcmPushSender {
    config: FcmConfig,
    client: reqwest::Client,
}

impl FcmPushSender {
    pub fn new(config: FcmConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl PushSender for FcmPushSender {
    async fn send(
        &self,
        device_token: &str,
        title: &str,
        body: &str,
        data: &serde_json::Value,
    ) -> Result<(), DeliveryError> {
        if device_token.is_empty() {
            return Err(DeliveryError::NoDeviceToken);
        }

        let message = json!({
            "to": device_token,
            "notification": {
                "title": title,
                "body": body,
                "sound": "default"
            },
            "priority": "high",
            "data": data,
        });

        let response = self
            .client
            .post(&self.config.url)
            .header("Authorization", format!("key={}", self.config.server_key))
            .header("Content-Type", "application/json")
            .json(&message)
            .send()
            .await
            .map_err(|e| DeliveryError::Push(e.to_string()))?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(DeliveryError::Push(error_text));
        }

        Ok(())
    }
}

/// Logs instead of sending. Used when no FCM key is configured.
pub struct MockPushSender;

#[async_trait]
impl PushSender for MockPushSender {
    async fn send(
        &self,
        device_token: &str,
        title: &str,
        body: &str,
        _data: &serde_json::Value,
    ) -> Result<(), DeliveryError> {
        tracing::info!("[MOCK] push to {}: {} - {}", device_token, title, body);
        Ok(())
    }
}

/// Always fails; lets tests exercise fan-out isolation.
pub struct FailingPushSender;

#[async_trait]
impl PushSender for FailingPushSender {
    async fn send(
        &self,
        _device_token: &str,
        _title: &str,
        _body: &str,
        _data: &serde_json::Value,
    ) -> Result<(), DeliveryError> {
        Err(DeliveryError::Push("simulated channel outage".to_string()))
    }
}

/// Notification Dispatcher. The Notification record is persisted first;
/// push and realtime delivery are attempted afterward and their failures are
/// recorded on the `DeliveryResult`, never propagated to the caller.
pub struct NotificationService {
    store: Arc<StoreService>,
    push: Arc<dyn PushSender>,
    realtime: Arc<dyn RealtimeChannel>,
}

impl NotificationService {
    pub fn new(
        store: Arc<StoreService>,
        push: Arc<dyn PushSender>,
        realtime: Arc<dyn RealtimeChannel>,
    ) -> Self {
        Self {
            store,
            push,
            realtime,
        }
    }

    pub async fn notify(&self, recipient: &str, event: &NotificationEvent) -> DeliveryResult {
        let notification = Notification {
            id: IdGenerator::generate(IdType::Notification),
            recipient: recipient.to_string(),
            title: event.title.clone(),
            message: event.message.clone(),
            kind: event.kind.clone(),
            reference: event.reference.clone(),
            reference_kind: event.reference_kind.clone(),
            data: event.data.clone(),
            is_read: false,
            created_at: Utc::now(),
        };
        let notification_id = notification.id.clone();
        self.store.put_notification(notification).await;

        let push = match self.store.get_user(recipient).await {
            Some(user) => match user.device_token.as_deref() {
                Some(token) => match self
                    .push
                    .send(token, &event.title, &event.message, &event.data)
                    .await
                {
                    Ok(()) => AttemptOutcome::Delivered,
                    Err(err) => {
                        tracing::warn!(recipient, %err, "push delivery failed");
                        AttemptOutcome::Failed(err.to_string())
                    }
                },
                None => AttemptOutcome::Skipped("no device token".to_string()),
            },
            None => AttemptOutcome::Skipped("recipient has no user record".to_string()),
        };

        // Best-effort, at-most-once: dispatch counts as delivered.
        self.realtime
            .send_to_user(recipient, &event.kind, event.data.clone())
            .await;
        let realtime = AttemptOutcome::Delivered;

        DeliveryResult {
            recipient: recipient.to_string(),
            notification_id: Some(notification_id),
            persisted: true,
            push,
            realtime,
        }
    }

    /// Fan out to many recipients, independently and in parallel. One
    /// recipient's failure cannot block or fail the others.
    pub async fn notify_many(
        &self,
        recipients: &[String],
        event: &NotificationEvent,
    ) -> Vec<DeliveryResult> {
        join_all(
            recipients
                .iter()
                .map(|recipient| self.notify(recipient, event)),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::{User, UserRole};
    use crate::services::realtime_service::RecordingChannel;

    fn user_with_token(id: &str, token: Option<&str>) -> User {
        User {
            id: id.to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            phone: "+330000000".to_string(),
            role: UserRole::Passenger,
            rating: 0.0,
            rating_count: 0,
            device_token: token.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn notify_persists_before_delivery_even_when_push_fails() {
        let store = Arc::new(StoreService::new());
        store.put_user(user_with_token("usr-1", Some("tok"))).await;
        let service = NotificationService::new(
            store.clone(),
            Arc::new(FailingPushSender),
            Arc::new(RecordingChannel::new()),
        );

        let event = NotificationEvent::new("ride_request", "New ride request", "A ride awaits");
        let result = service.notify("usr-1", &event).await;

        assert!(result.persisted);
        assert!(result.notification_id.is_some());
        assert!(result.push.is_failure());
        let stored = store.notifications_for("usr-1").await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].kind, "ride_request");
    }

    #[tokio::test]
    async fn notify_skips_push_without_device_token() {
        let store = Arc::new(StoreService::new());
        store.put_user(user_with_token("usr-1", None)).await;
        let service = NotificationService::new(
            store,
            Arc::new(MockPushSender),
            Arc::new(RecordingChannel::new()),
        );

        let result = service
            .notify("usr-1", &NotificationEvent::new("x", "t", "m"))
            .await;
        assert!(matches!(result.push, AttemptOutcome::Skipped(_)));
        assert!(result.persisted);
    }

    /// Fails only one device token, leaving the rest deliverable.
    struct OutageForToken(String);

    #[async_trait]
    impl PushSender for OutageForToken {
        async fn send(
            &self,
            device_token: &str,
            _title: &str,
            _body: &str,
            _data: &serde_json::Value,
        ) -> Result<(), DeliveryError> {
            if device_token == self.0 {
                Err(DeliveryError::Push("simulated channel outage".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn fan_out_is_isolated_per_recipient() {
        let store = Arc::new(StoreService::new());
        // One recipient's push channel is down; the others must still get
        // theirs, and every record is persisted regardless.
        for id in ["usr-a", "usr-b", "usr-c"] {
            let token = format!("tok-{}", id);
            store.put_user(user_with_token(id, Some(token.as_str()))).await;
        }
        let realtime = Arc::new(RecordingChannel::new());
        let service = NotificationService::new(
            store.clone(),
            Arc::new(OutageForToken("tok-usr-b".to_string())),
            realtime.clone(),
        );

        let recipients: Vec<String> =
            ["usr-a", "usr-b", "usr-c"].iter().map(|s| s.to_string()).collect();
        let results = service
            .notify_many(&recipients, &NotificationEvent::new("ride_request", "t", "m"))
            .await;

        assert_eq!(results.len(), 3);
        for result in &results {
            assert!(result.persisted);
            if result.recipient == "usr-b" {
                assert!(result.push.is_failure());
            } else {
                assert!(matches!(result.push, AttemptOutcome::Delivered));
            }
        }
        for id in ["usr-a", "usr-b", "usr-c"] {
            assert_eq!(store.notifications_for(id).await.len(), 1);
            assert_eq!(realtime.user_events(id, "ride_request").await, 1);
        }
    }
}
