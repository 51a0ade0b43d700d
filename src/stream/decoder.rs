//! Frame decoder: raw text into a validated [`EventEnvelope`].
//!
//! A frame is a JSON object `{"type": ..., "data": {...}, "timestamp": ...}`.
//! Anything that does not decode to a complete envelope is a
//! [`DecodeError`]; partial payloads are never produced.

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::domain::{EventEnvelope, EventKind, EventPayload, timestamp};

/// Why a frame was rejected.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The frame is not a JSON object.
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The frame has no `type` field.
    #[error("frame has no type")]
    MissingKind,

    /// The `type` field names no known event kind.
    #[error("unknown event type: {0}")]
    UnknownKind(String),

    /// The `timestamp` field is missing or not ISO-8601.
    #[error("invalid event timestamp: {0:?}")]
    InvalidTimestamp(Option<String>),

    /// The payload does not have the shape its kind requires.
    #[error("invalid {kind} payload: {source}")]
    InvalidPayload {
        /// Declared kind of the frame.
        kind: EventKind,
        /// Underlying shape error.
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    data: serde_json::Value,
    timestamp: Option<String>,
}

/// Decodes one text frame.
///
/// # Errors
///
/// Returns a [`DecodeError`] if the frame is not JSON, its type is missing
/// or unknown, its timestamp is invalid, or its payload lacks a field
/// required for its kind.
pub fn decode(frame: &str) -> Result<EventEnvelope, DecodeError> {
    let raw: RawFrame = serde_json::from_str(frame).map_err(DecodeError::Malformed)?;

    let kind_tag = raw.kind.ok_or(DecodeError::MissingKind)?;
    let kind: EventKind = kind_tag.parse().map_err(DecodeError::UnknownKind)?;

    let timestamp = raw
        .timestamp
        .as_deref()
        .and_then(timestamp::parse)
        .ok_or_else(|| DecodeError::InvalidTimestamp(raw.timestamp.clone()))?;

    let payload = match kind {
        EventKind::Vitals => EventPayload::Vitals(payload(kind, raw.data)?),
        EventKind::Alert => EventPayload::Alert(payload(kind, raw.data)?),
        EventKind::AgentLog => EventPayload::AgentLog(payload(kind, raw.data)?),
        EventKind::System => EventPayload::System(raw.data),
    };

    Ok(EventEnvelope { timestamp, payload })
}

fn payload<P: DeserializeOwned>(kind: EventKind, data: serde_json::Value) -> Result<P, DecodeError> {
    serde_json::from_value(data).map_err(|source| DecodeError::InvalidPayload { kind, source })
}
