//! Request/response command surface of the monitoring backend.
//!
//! [`MonitorApi`] is the seam the services are written against;
//! [`HttpApi`] implements it over REST. All endpoints live under `/api`.

pub mod dto;
pub mod http;

use std::future::Future;

pub use dto::{AlertsResponse, ChatRequest, ChatResponse, StatusResponse};
pub use http::HttpApi;

use crate::domain::{AlertId, Patient, PatientId, RiskScore, VitalsRecord};
use crate::error::ClientError;

/// Outbound commands of the monitoring backend.
///
/// Every method is one request/response pair. Failures are reported as
/// [`ClientError`]; no method retries on its own.
pub trait MonitorApi: Send + Sync + 'static {
    /// `GET /api/patients/`
    fn list_patients(&self) -> impl Future<Output = Result<Vec<Patient>, ClientError>> + Send;

    /// `GET /api/patients/{id}`
    fn get_patient(
        &self,
        patient_id: &PatientId,
    ) -> impl Future<Output = Result<Patient, ClientError>> + Send;

    /// `GET /api/patients/{id}/vitals?limit=N`
    fn patient_vitals(
        &self,
        patient_id: &PatientId,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<VitalsRecord>, ClientError>> + Send;

    /// `GET /api/patients/{id}/risk-score`
    fn risk_score(
        &self,
        patient_id: &PatientId,
    ) -> impl Future<Output = Result<RiskScore, ClientError>> + Send;

    /// `GET /api/alerts/[?patient_id=]`
    fn list_alerts(
        &self,
        patient_id: Option<&PatientId>,
    ) -> impl Future<Output = Result<AlertsResponse, ClientError>> + Send;

    /// `POST /api/alerts/{id}/acknowledge`
    fn acknowledge_alert(
        &self,
        alert_id: &AlertId,
    ) -> impl Future<Output = Result<StatusResponse, ClientError>> + Send;

    /// `POST /api/alerts/{id}/resolve`
    fn resolve_alert(
        &self,
        alert_id: &AlertId,
    ) -> impl Future<Output = Result<StatusResponse, ClientError>> + Send;

    /// `POST /api/chat/text`
    fn send_chat(
        &self,
        request: &ChatRequest,
    ) -> impl Future<Output = Result<ChatResponse, ClientError>> + Send;
}
