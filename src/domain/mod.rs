//! Domain layer: identifiers, entity types, and stream event envelopes.
//!
//! Entities mirror what the backend serves (patients, vitals, alerts,
//! chat messages). Envelopes are the decoded form of stream frames.

pub mod alert;
pub mod chat;
pub mod envelope;
pub mod ids;
pub mod patient;
pub mod timestamp;
pub mod vitals;

pub use alert::{Alert, AlertFilter, AlertStatus, Severity};
pub use chat::{ChatKey, ChatMessage, ChatRole, Delivery};
pub use envelope::{
    AgentLogPayload, AlertPayload, EventEnvelope, EventKind, EventPayload, VitalsPayload,
};
pub use ids::{AlertId, MessageId, PatientId};
pub use patient::{Patient, PatientStatus};
pub use vitals::{RiskLevel, RiskScore, VitalsRecord};
