// src/utils/id_generator.rs
use chrono::{DateTime, Utc};
use rand::Rng;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdType {
    Driver,
    Ride,
    Notification,
    Receipt,
}

impl IdType {
    pub fn prefix(&self) -> &'static str {
        match self {
            IdType::Driver => "drv",
            IdType::Ride => "rid",
            IdType::Notification => "not",
            IdType::Receipt => "rcp",
        }
    }
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

const SUFFIX_LEN: usize = 6;
const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

pub struct IdGenerator;

impl IdGenerator {
    /// Generate a unique ID with format: `{prefix}-{YYMMDD}-{suffix}`.
    /// Human-scannable: the prefix tells you the entity, the date part when
    /// it was created.
    pub fn generate(id_type: IdType) -> String {
        Self::generate_with_timestamp(id_type, Utc::now())
    }

    /// Generate with a specific timestamp (useful for testing).
    pub fn generate_with_timestamp(id_type: IdType, timestamp: DateTime<Utc>) -> String {
        let date_part = timestamp.format("%y%m%d").to_string();
        format!("{}-{}-{}", id_type.prefix(), date_part, Self::random_suffix())
    }

    fn random_suffix() -> String {
        let mut rng = rand::rng();
        (0..SUFFIX_LEN)
            .map(|_| {
                let idx = rng.random_range(0..SUFFIX_ALPHABET.len());
                SUFFIX_ALPHABET[idx] as char
            })
            .collect()
    }

    /// Check that an ID has the expected shape, and the expected prefix when
    /// `expected` is given.
    pub fn validate_id(id: &str, expected: Option<IdType>) -> bool {
        let mut parts = id.splitn(3, '-');
        let (Some(prefix), Some(date), Some(suffix)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return false;
        };

        if let Some(id_type) = expected {
            if prefix != id_type.prefix() {
                return false;
            }
        } else if prefix.len() != 3 || !prefix.bytes().all(|b| b.is_ascii_lowercase()) {
            return false;
        }

        date.len() == 6
            && date.bytes().all(|b| b.is_ascii_digit())
            && suffix.len() == SUFFIX_LEN
            && suffix.bytes().all(|b| SUFFIX_ALPHABET.contains(&b))
    }
}
