//! Service layer: outbound commands whose responses are reconciled into
//! the domain stores.
//!
//! Each service wraps a [`crate::api::MonitorApi`] and the store(s) it
//! writes. Responses go through the same serialized store methods as
//! stream events, so fetched and streamed state converge.

pub mod alert_service;
pub mod chat_service;
pub mod patient_service;

pub use alert_service::AlertService;
pub use chat_service::ChatService;
pub use patient_service::PatientService;
