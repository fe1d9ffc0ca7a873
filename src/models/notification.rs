// src/models/notification.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted record of one event sent to one recipient. Created before any
/// delivery attempt; auxiliary-channel failures never remove it.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Notification {
    pub id: String,
    pub recipient: String,
    pub title: String,
    pub message: String,
    pub kind: String, // "ride_request", "ride_accepted", ...
    pub reference: Option<String>,
    pub reference_kind: Option<String>, // "Ride", ...
    pub data: serde_json::Value,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// The event side of a notification: everything except the recipient.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub title: String,
    pub message: String,
    pub kind: String,
    pub reference: Option<String>,
    pub reference_kind: Option<String>,
    pub data: serde_json::Value,
}

impl NotificationEvent {
    pub fn new(kind: &str, title: &str, message: &str) -> Self {
        Self {
            title: title.to_string(),
            message: message.to_string(),
            kind: kind.to_string(),
            reference: None,
            reference_kind: None,
            data: serde_json::Value::Null,
        }
    }

    pub fn with_reference(mut self, reference: &str, reference_kind: &str) -> Self {
        self.reference = Some(reference.to_string());
        self.reference_kind = Some(reference_kind.to_string());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

/// Outcome of one auxiliary delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Delivered,
    Failed(String),
    Skipped(String), // e.g. recipient has no device token
}

impl AttemptOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, AttemptOutcome::Failed(_))
    }
}

/// What actually happened for one recipient: whether the record was
/// persisted, and how each auxiliary channel fared. "persisted but delivery
/// failed" and "not persisted" are distinguishable states.
#[derive(Debug, Clone)]
pub struct DeliveryResult {
    pub recipient: String,
    pub notification_id: Option<String>,
    pub persisted: bool,
    pub push: AttemptOutcome,
    pub realtime: AttemptOutcome,
}
