// src/models/user.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Passenger,
    Driver,
    Admin,
}

impl UserRole {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "passenger" => Some(UserRole::Passenger),
            "driver" => Some(UserRole::Driver),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub role: UserRole,

    // Simple incremental mean, 1-decimal precision. No decay, no weighting.
    pub rating: f64,
    pub rating_count: u32,

    pub device_token: Option<String>, // push target, absent until the app registers one

    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Fold one new rating into the running average:
    /// `(avg * count + value) / (count + 1)`, rounded to one decimal.
    pub fn apply_rating(&mut self, value: u8) {
        let count = self.rating_count as f64;
        let new_avg = (self.rating * count + value as f64) / (count + 1.0);
        self.rating = (new_avg * 10.0).round() / 10.0;
        self.rating_count += 1;
    }
}
