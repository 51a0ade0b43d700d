//! Request and response bodies of the command endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Alert, MessageId, PatientId, timestamp};

/// Body of `GET /api/alerts/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsResponse {
    /// `"success"` on success.
    pub status: String,
    /// Alerts matching the query.
    pub alerts: Vec<Alert>,
    /// Number of alerts returned.
    #[serde(default)]
    pub count: usize,
}

/// Generic `{status, message}` acknowledgement body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// `"success"` on success.
    pub status: String,
    /// Human-readable outcome.
    #[serde(default)]
    pub message: String,
}

/// Body of `POST /api/chat/text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Patient the question is about; omitted for the general conversation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<PatientId>,
    /// Question text.
    pub message: String,
    /// Language code of the question.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Agent reply to a chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Backend-assigned id of the reply.
    pub message_id: MessageId,
    /// Reply text.
    pub content: String,
    /// Synthesised speech, if the backend produced any.
    #[serde(default)]
    pub audio_url: Option<String>,
    /// Time the reply was written.
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub timestamp: DateTime<Utc>,
}

/// Error body returned by the backend: `{"detail": ...}` or
/// `{"message": ...}`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<String>,
}

impl ErrorBody {
    /// Best human-readable message in the body.
    pub(crate) fn into_message(self) -> Option<String> {
        match (self.detail, self.message) {
            (Some(serde_json::Value::String(detail)), _) => Some(detail),
            (Some(detail), _) if !detail.is_null() => Some(detail.to_string()),
            (_, Some(message)) => Some(message),
            _ => None,
        }
    }
}
