//! Lenient ISO-8601 timestamp parsing.
//!
//! The backend emits RFC 3339 timestamps with an offset on some paths and
//! naive `isoformat()` strings (no offset) on others. Naive values are
//! interpreted as UTC.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Parses an RFC 3339 or naive ISO-8601 timestamp.
#[must_use]
pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Serde adapter for required timestamp fields.
///
/// # Errors
///
/// Fails when the value is not a string or is not a recognised timestamp.
pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp `{raw}`")))
}

/// Serde adapter for optional timestamp fields. `null` maps to `None`.
///
/// # Errors
///
/// Fails when a present value is not a recognised timestamp.
pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => parse(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp `{raw}`"))),
    }
}
