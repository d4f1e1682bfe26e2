//! Documents stored in the blog collections, their request payloads and the
//! views returned to clients.

pub mod article;
pub mod category;
pub mod tag;
pub mod user;

use chrono::{DateTime, Utc};

use crate::core::error::BlogError;

/// Current time truncated to the millisecond precision documents are stored with
pub fn now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// Trim an optional string, treating blank input as absent
pub fn clean_optional(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Check the character length of a required, already trimmed field
pub fn check_length(field: &str, value: &str, min: usize, max: usize) -> Result<(), BlogError> {
    let len = value.chars().count();
    if len < min {
        if min == 1 {
            return Err(BlogError::Validation(format!("{} is required", field)));
        }
        return Err(BlogError::Validation(format!("{} must be at least {} characters", field, min)));
    }
    if len > max {
        return Err(BlogError::Validation(format!("{} must be at most {} characters", field, max)));
    }
    Ok(())
}

/// Check the length of an optional field when present
pub fn check_optional_length(field: &str, value: Option<&str>, max: usize) -> Result<(), BlogError> {
    match value {
        Some(v) => check_length(field, v, 0, max),
        None => Ok(()),
    }
}

/// Fixed-precision RFC 3339 timestamps so stored values sort lexicographically
pub mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }

    pub mod option {
        use chrono::{DateTime, SecondsFormat, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error> {
            match value {
                Some(dt) => serializer.serialize_some(&dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => DateTime::parse_from_rfc3339(&raw)
                    .map(|dt| Some(dt.with_timezone(&Utc)))
                    .map_err(serde::de::Error::custom),
                None => Ok(None),
            }
        }
    }
}
