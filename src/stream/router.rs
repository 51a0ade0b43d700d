//! Routing table from decoded events to store operations.
//!
//! | kind        | store        | operation                                  |
//! |-------------|--------------|--------------------------------------------|
//! | `vitals`    | vitals       | append or merge a sample                   |
//! | `alert`     | alerts       | upsert with forward-only status            |
//! | `agent_log` | chat         | append, only when a routing key is present |
//! | `system`    | (none)       | subscribers only                           |

use uuid::Uuid;

use crate::domain::chat::default_language;
use crate::domain::{
    AgentLogPayload, ChatKey, ChatMessage, ChatRole, Delivery, EventEnvelope, EventPayload,
    MessageId,
};
use crate::store::{AlertUpdate, StoreOp};

/// Author id given to agent log lines that do not name their agent.
pub const DEFAULT_AGENT: &str = "agent";

/// Maps an envelope to the store operations it implies.
///
/// An empty result means the event is for subscribers only.
#[must_use]
pub fn route(envelope: &EventEnvelope) -> Vec<StoreOp> {
    match &envelope.payload {
        EventPayload::Vitals(vitals) => vec![StoreOp::Vitals(vitals.to_record(envelope.timestamp))],
        EventPayload::Alert(alert) => vec![StoreOp::Alert(AlertUpdate {
            payload: alert.clone(),
            timestamp: envelope.timestamp,
        })],
        EventPayload::AgentLog(log) => chat_key(log)
            .map(|key| {
                let message = agent_message(log, &key, envelope);
                StoreOp::Chat { key, message }
            })
            .into_iter()
            .collect(),
        EventPayload::System(_) => Vec::new(),
    }
}

/// Chat partition of an agent log line: the explicit `chat_key` if given,
/// else the patient it concerns, else none.
fn chat_key(log: &AgentLogPayload) -> Option<ChatKey> {
    match (&log.chat_key, &log.patient_id) {
        (Some(raw), _) => Some(ChatKey::parse(raw)),
        (None, Some(patient_id)) => Some(ChatKey::Patient(patient_id.clone())),
        (None, None) => None,
    }
}

fn agent_message(log: &AgentLogPayload, key: &ChatKey, envelope: &EventEnvelope) -> ChatMessage {
    let agent = log.agent.as_deref().unwrap_or(DEFAULT_AGENT);
    let message_id = log.log_id.clone().map_or_else(
        || {
            let name = format!("{}|{agent}|{}", envelope.timestamp.to_rfc3339(), log.message);
            MessageId::new(format!(
                "log-{}",
                Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
            ))
        },
        MessageId::from,
    );

    let metadata = match (&log.level, &log.details) {
        (None, None) => None,
        (level, details) => Some(serde_json::json!({
            "level": level,
            "details": details,
        })),
    };

    ChatMessage {
        message_id,
        patient_id: key.patient_id().cloned(),
        user_id: agent.to_string(),
        role: ChatRole::Agent,
        content: log.message.clone(),
        audio_url: None,
        language: default_language(),
        metadata,
        timestamp: envelope.timestamp,
        delivery: Delivery::Confirmed,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{AlertId, AlertPayload, PatientId, Severity, VitalsPayload};
    use chrono::{TimeZone, Utc};

    fn envelope(payload: EventPayload) -> EventEnvelope {
        EventEnvelope {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).single().unwrap_or_default(),
            payload,
        }
    }

    fn log(patient: Option<&str>, chat_key: Option<&str>) -> AgentLogPayload {
        AgentLogPayload {
            message: "Reviewed latest vitals".to_string(),
            agent: Some("vitals_agent".to_string()),
            patient_id: patient.map(PatientId::from),
            chat_key: chat_key.map(str::to_string),
            log_id: None,
            level: None,
            details: None,
        }
    }

    #[test]
    fn vitals_route_to_vitals_store() {
        let ops = route(&envelope(EventPayload::Vitals(VitalsPayload {
            patient_id: PatientId::from("P1"),
            heart_rate: 70.0,
            bp_systolic: 118.0,
            bp_diastolic: 76.0,
            o2_saturation: 99.0,
            temperature: 36.8,
            respiratory_rate: Some(14.0),
            timestamp: None,
        })));
        let [op] = ops.as_slice() else {
            panic!("expected one op");
        };
        assert_eq!(op.store_name(), "vitals");
    }

    #[test]
    fn alert_routes_to_alert_store() {
        let ops = route(&envelope(EventPayload::Alert(AlertPayload {
            alert_id: AlertId::from("A1"),
            patient_id: PatientId::from("P1"),
            severity: Severity::High,
            message: "HR above 130".to_string(),
            alert_type: None,
            details: None,
            status: None,
            created_by: None,
        })));
        let [StoreOp::Alert(update)] = ops.as_slice() else {
            panic!("expected one alert op");
        };
        assert_eq!(update.payload.alert_id, AlertId::from("A1"));
    }

    #[test]
    fn keyless_agent_log_and_system_touch_no_store() {
        assert!(route(&envelope(EventPayload::AgentLog(log(None, None)))).is_empty());
        assert!(route(&envelope(EventPayload::System(serde_json::Value::Null))).is_empty());
    }

    #[test]
    fn agent_log_partition_follows_routing_key() {
        let ops = route(&envelope(EventPayload::AgentLog(log(Some("P1"), None))));
        let [StoreOp::Chat { key, message }] = ops.as_slice() else {
            panic!("expected one chat op");
        };
        assert_eq!(*key, ChatKey::Patient(PatientId::from("P1")));
        assert_eq!(message.role, ChatRole::Agent);
        assert_eq!(message.user_id, "vitals_agent");

        let ops = route(&envelope(EventPayload::AgentLog(log(Some("P1"), Some("general")))));
        let [StoreOp::Chat { key, message }] = ops.as_slice() else {
            panic!("expected one chat op");
        };
        assert_eq!(*key, ChatKey::General);
        assert!(message.patient_id.is_none());
    }

    #[test]
    fn redelivered_log_gets_same_message_id() {
        let event = envelope(EventPayload::AgentLog(log(Some("P1"), None)));
        let id = |ops: Vec<StoreOp>| match ops.into_iter().next() {
            Some(StoreOp::Chat { message, .. }) => message.message_id,
            other => panic!("expected chat op, got {other:?}"),
        };
        assert_eq!(id(route(&event)), id(route(&event)));

        let mut with_id = log(Some("P1"), None);
        with_id.log_id = Some("log-77".to_string());
        assert_eq!(
            id(route(&envelope(EventPayload::AgentLog(with_id)))),
            MessageId::from("log-77")
        );
    }
}
