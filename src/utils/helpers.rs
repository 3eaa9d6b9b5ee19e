//! Helper functions and utilities
//!
//! This module contains common helper functions used throughout the application.

use std::sync::OnceLock;

use chrono::NaiveTime;
use regex::Regex;
use uuid::Uuid;

/// Generate a new UUID v4
pub fn generate_uuid() -> String {
    Uuid::new_v4().to_string()
}

/// Validate email format
pub fn is_valid_email(email: &str) -> bool {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static regex"))
        .is_match(email)
}

/// Validate phone number format (basic validation)
pub fn is_valid_phone(phone: &str) -> bool {
    static PHONE: OnceLock<Regex> = OnceLock::new();
    PHONE
        .get_or_init(|| Regex::new(r"^\+?[0-9][0-9 \-]{8,}[0-9]$").expect("static regex"))
        .is_match(phone.trim())
}

/// Normalize whitespace in text
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Generate a random alphanumeric string
pub fn generate_random_string(length: usize) -> String {
    use rand::Rng;
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();

    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Parse a wall-clock time written as `HH:MM` or `HH:MM:SS`
pub fn parse_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

/// Serde adapter storing times as `HH:MM`, the format the calendar UI writes
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_time(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid time: {}", raw)))
    }

    pub mod option {
        use chrono::NaiveTime;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            time: &Option<NaiveTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match time {
                Some(t) => serializer.serialize_some(&t.format("%H:%M").to_string()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveTime>, D::Error> {
            let raw = Option::<String>::deserialize(deserializer)?;
            match raw {
                None => Ok(None),
                Some(s) if s.trim().is_empty() => Ok(None),
                Some(s) => crate::utils::helpers::parse_time(&s)
                    .map(Some)
                    .ok_or_else(|| serde::de::Error::custom(format!("invalid time: {}", s))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_accepts_both_forms() {
        assert_eq!(parse_time("18:30"), NaiveTime::from_hms_opt(18, 30, 0));
        assert_eq!(parse_time("07:05:10"), NaiveTime::from_hms_opt(7, 5, 10));
        assert_eq!(parse_time("25:00"), None);
    }

    #[test]
    fn test_phone_and_email() {
        assert!(is_valid_phone("9999999999"));
        assert!(is_valid_phone("+91 99999 99999"));
        assert!(!is_valid_phone("12ab"));
        assert!(is_valid_email("jane@club.edu"));
        assert!(!is_valid_email("jane@club"));
    }

    #[test]
    fn test_random_string_length() {
        assert_eq!(generate_random_string(6).len(), 6);
    }
}
