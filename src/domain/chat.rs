//! Chat transcript messages and their partition key.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timestamp;
use super::{MessageId, PatientId};

/// Sentinel partition for conversations not tied to a patient.
pub const GENERAL_CHAT: &str = "general";

/// Partition key of the chat store: one conversation per patient plus a
/// shared general conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChatKey {
    /// The general conversation.
    General,
    /// The conversation about one patient.
    Patient(PatientId),
}

impl ChatKey {
    /// Key for an optional patient: `None` selects the general partition.
    #[must_use]
    pub fn for_patient(patient_id: Option<&PatientId>) -> Self {
        patient_id.map_or(Self::General, |p| Self::Patient(p.clone()))
    }

    /// Parses a wire chat key. `"general"` and the empty string select the
    /// general partition; anything else is a patient id.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw == GENERAL_CHAT {
            Self::General
        } else {
            Self::Patient(PatientId::from(raw))
        }
    }

    /// Returns the patient id for patient partitions.
    #[must_use]
    pub fn patient_id(&self) -> Option<&PatientId> {
        match self {
            Self::General => None,
            Self::Patient(p) => Some(p),
        }
    }
}

impl fmt::Display for ChatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::General => f.write_str(GENERAL_CHAT),
            Self::Patient(p) => write!(f, "{p}"),
        }
    }
}

/// Author role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    /// Clinician using the client.
    User,
    /// AI agent.
    Agent,
    /// System notice.
    System,
}

/// Whether a message has been accepted by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// Received from, or acknowledged by, the backend.
    #[default]
    Confirmed,
    /// Composed locally; the send command is in flight.
    Pending,
    /// Composed locally; the send command failed.
    Failed,
}

/// One message in a chat partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message identifier.
    pub message_id: MessageId,
    /// Patient the conversation is about, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<PatientId>,
    /// Author id (`"agent"` for agent replies).
    pub user_id: String,
    /// Author role.
    pub role: ChatRole,
    /// Message text.
    pub content: String,
    /// Synthesised speech for the message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    /// Language code.
    #[serde(default = "default_language")]
    pub language: String,
    /// Producer metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Time the message was written.
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub timestamp: DateTime<Utc>,
    /// Local delivery state.
    #[serde(skip)]
    pub delivery: Delivery,
}

impl ChatMessage {
    /// Partition this message belongs to.
    #[must_use]
    pub fn chat_key(&self) -> ChatKey {
        ChatKey::for_patient(self.patient_id.as_ref())
    }
}

pub(crate) fn default_language() -> String {
    "en".to_string()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn missing_patient_selects_general() {
        assert_eq!(ChatKey::for_patient(None), ChatKey::General);
        assert_eq!(ChatKey::for_patient(None).to_string(), "general");
    }

    #[test]
    fn parse_recognises_sentinel() {
        assert_eq!(ChatKey::parse("general"), ChatKey::General);
        assert_eq!(ChatKey::parse(""), ChatKey::General);
        assert_eq!(
            ChatKey::parse("P1"),
            ChatKey::Patient(PatientId::from("P1"))
        );
    }

    #[test]
    fn deserialized_messages_are_confirmed() {
        let json = r#"{
            "message_id": "m-1",
            "user_id": "agent",
            "role": "agent",
            "content": "Vitals stable.",
            "timestamp": "2024-03-01T10:00:00Z"
        }"#;
        let Ok(msg) = serde_json::from_str::<ChatMessage>(json) else {
            panic!("valid message");
        };
        assert_eq!(msg.delivery, Delivery::Confirmed);
        assert_eq!(msg.language, "en");
        assert_eq!(msg.chat_key(), ChatKey::General);
    }
}
