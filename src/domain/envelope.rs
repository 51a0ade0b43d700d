//! Decoded stream events.
//!
//! Every inbound frame that passes validation becomes an [`EventEnvelope`]:
//! an immutable value carrying the origin timestamp and a payload typed by
//! its [`EventKind`]. Envelopes are applied to stores and handed to
//! subscribers; they are never stored themselves.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::alert::{AlertStatus, Severity};
use super::timestamp;
use super::{AlertId, PatientId, VitalsRecord};

/// Tag of a stream event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Vital-sign sample.
    Vitals,
    /// Alert raised or updated.
    Alert,
    /// Agent activity log line.
    AgentLog,
    /// Informational system notice.
    System,
}

impl EventKind {
    /// All kinds, in wire order.
    pub const ALL: [Self; 4] = [Self::Vitals, Self::Alert, Self::AgentLog, Self::System];

    /// Returns the wire tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vitals => "vitals",
            Self::Alert => "alert",
            Self::AgentLog => "agent_log",
            Self::System => "system",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Payload of a `vitals` event. All readings except respiratory rate are
/// required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalsPayload {
    /// Routing key.
    pub patient_id: PatientId,
    /// Beats per minute.
    pub heart_rate: f64,
    /// Systolic blood pressure (mmHg).
    pub bp_systolic: f64,
    /// Diastolic blood pressure (mmHg).
    pub bp_diastolic: f64,
    /// Oxygen saturation (%).
    pub o2_saturation: f64,
    /// Body temperature (°C).
    pub temperature: f64,
    /// Breaths per minute.
    #[serde(default)]
    pub respiratory_rate: Option<f64>,
    /// Sample time, when the producer stamps the reading itself.
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl VitalsPayload {
    /// Builds the store record, falling back to the envelope time when the
    /// payload carries no sample time of its own.
    #[must_use]
    pub fn to_record(&self, envelope_time: DateTime<Utc>) -> VitalsRecord {
        VitalsRecord {
            vital_id: None,
            patient_id: self.patient_id.clone(),
            heart_rate: self.heart_rate,
            bp_systolic: self.bp_systolic,
            bp_diastolic: self.bp_diastolic,
            o2_saturation: self.o2_saturation,
            temperature: self.temperature,
            respiratory_rate: self.respiratory_rate,
            timestamp: self.timestamp.unwrap_or(envelope_time),
        }
    }
}

/// Payload of an `alert` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPayload {
    /// Routing key.
    pub alert_id: AlertId,
    /// Patient the alert concerns.
    pub patient_id: PatientId,
    /// Severity.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// Alert category.
    #[serde(default)]
    pub alert_type: Option<String>,
    /// Structured context.
    #[serde(default)]
    pub details: Option<serde_json::Value>,
    /// Status carried by the event; absent means the alert is being raised.
    #[serde(default)]
    pub status: Option<AlertStatus>,
    /// Producer of the alert.
    #[serde(default)]
    pub created_by: Option<String>,
}

impl AlertPayload {
    /// Status the event asserts.
    #[must_use]
    pub fn asserted_status(&self) -> AlertStatus {
        self.status.unwrap_or_default()
    }
}

/// Payload of an `agent_log` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentLogPayload {
    /// Log text.
    #[serde(alias = "content")]
    pub message: String,
    /// Emitting agent.
    #[serde(default, alias = "agent_type", alias = "agent_name")]
    pub agent: Option<String>,
    /// Patient the activity concerns.
    #[serde(default)]
    pub patient_id: Option<PatientId>,
    /// Explicit chat partition (`"general"` or a patient id).
    #[serde(default)]
    pub chat_key: Option<String>,
    /// Producer-assigned id of the log line.
    #[serde(default, alias = "id")]
    pub log_id: Option<String>,
    /// Log level.
    #[serde(default)]
    pub level: Option<String>,
    /// Structured context.
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

/// Typed payload, one variant per [`EventKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    /// Vital-sign sample.
    Vitals(VitalsPayload),
    /// Alert raised or updated.
    Alert(AlertPayload),
    /// Agent activity.
    AgentLog(AgentLogPayload),
    /// Free-form system notice.
    System(serde_json::Value),
}

/// A validated stream event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope {
    /// Origin-assigned event time.
    pub timestamp: DateTime<Utc>,
    /// Typed payload.
    pub payload: EventPayload,
}

impl EventEnvelope {
    /// Returns the tag of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self.payload {
            EventPayload::Vitals(_) => EventKind::Vitals,
            EventPayload::Alert(_) => EventKind::Alert,
            EventPayload::AgentLog(_) => EventKind::AgentLog,
            EventPayload::System(_) => EventKind::System,
        }
    }

    /// Returns the patient the event concerns, if it names one.
    #[must_use]
    pub fn patient_id(&self) -> Option<&PatientId> {
        match &self.payload {
            EventPayload::Vitals(v) => Some(&v.patient_id),
            EventPayload::Alert(a) => Some(&a.patient_id),
            EventPayload::AgentLog(l) => l.patient_id.as_ref(),
            EventPayload::System(_) => None,
        }
    }
}
