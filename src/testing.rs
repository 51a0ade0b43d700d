//! In-crate test doubles: a scripted stream transport and a fake backend.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc, oneshot};

use crate::api::{AlertsResponse, ChatRequest, ChatResponse, MonitorApi, StatusResponse};
use crate::domain::{
    Alert, AlertId, AlertStatus, MessageId, Patient, PatientId, PatientStatus, RiskScore,
    Severity, VitalsRecord,
};
use crate::error::{ClientError, TransportError};
use crate::stream::{Session, Transport};

/// Fixed instant used by fixtures.
pub(crate) fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 10, minute, 0)
        .single()
        .unwrap_or_default()
}

/// Pushes frames into a [`ScriptedSession`]. Dropping it ends the session
/// as if the peer closed it.
#[derive(Debug)]
pub(crate) struct Feed {
    tx: mpsc::UnboundedSender<String>,
}

impl Feed {
    pub(crate) fn push(&self, frame: impl Into<String>) {
        let _ = self.tx.send(frame.into());
    }
}

#[derive(Debug)]
pub(crate) struct ScriptedSession {
    frames: mpsc::UnboundedReceiver<String>,
    closed: Option<Arc<AtomicUsize>>,
}

/// Creates a session and the feed that drives it.
pub(crate) fn session() -> (Feed, ScriptedSession) {
    let (tx, frames) = mpsc::unbounded_channel();
    (
        Feed { tx },
        ScriptedSession {
            frames,
            closed: None,
        },
    )
}

impl Session for ScriptedSession {
    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        self.frames.recv().await.map(Ok)
    }

    async fn close(self) {
        if let Some(closed) = self.closed {
            closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Outcome of one scripted open.
#[derive(Debug)]
pub(crate) enum Step {
    Refuse,
    Accept(ScriptedSession),
    Gated(oneshot::Receiver<()>, ScriptedSession),
}

#[derive(Debug, Default)]
struct Script {
    steps: Mutex<VecDeque<Step>>,
    attempts: AtomicUsize,
    closed: Arc<AtomicUsize>,
}

/// Transport that plays back a fixed list of open outcomes. Once the list
/// is exhausted, opens never complete.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedTransport {
    script: Arc<Script>,
}

impl ScriptedTransport {
    pub(crate) fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            script: Arc::new(Script {
                steps: Mutex::new(steps.into_iter().collect()),
                ..Script::default()
            }),
        }
    }

    /// Number of opens started.
    pub(crate) fn attempts(&self) -> usize {
        self.script.attempts.load(Ordering::SeqCst)
    }

    /// Number of sessions closed.
    pub(crate) fn closed(&self) -> usize {
        self.script.closed.load(Ordering::SeqCst)
    }
}

impl Transport for ScriptedTransport {
    type Session = ScriptedSession;

    fn open(&self) -> impl Future<Output = Result<ScriptedSession, TransportError>> + Send {
        self.script.attempts.fetch_add(1, Ordering::SeqCst);
        let step = self.script.steps.lock().pop_front();
        let closed = Arc::clone(&self.script.closed);
        async move {
            let mut session = match step {
                None => std::future::pending().await,
                Some(Step::Refuse) => {
                    return Err(TransportError::Refused("scripted refusal".to_string()));
                }
                Some(Step::Accept(session)) => session,
                Some(Step::Gated(gate, session)) => {
                    let _ = gate.await;
                    session
                }
            };
            session.closed = Some(closed);
            Ok(session)
        }
    }
}

#[derive(Debug, Default)]
struct Backend {
    patients: Vec<Patient>,
    vitals: HashMap<PatientId, Vec<VitalsRecord>>,
    risk_scores: HashMap<PatientId, RiskScore>,
    alerts: Vec<Alert>,
    failure: Option<(u16, String)>,
    calls: Vec<String>,
}

/// In-memory backend. Every call is recorded; a configured failure is
/// returned by every call until cleared.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeApi {
    backend: Arc<Mutex<Backend>>,
    hold: Arc<Mutex<Option<Arc<Notify>>>>,
}

impl FakeApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_patients(self, patients: Vec<Patient>) -> Self {
        self.backend.lock().patients = patients;
        self
    }

    pub(crate) fn with_alerts(self, alerts: Vec<Alert>) -> Self {
        self.backend.lock().alerts = alerts;
        self
    }

    pub(crate) fn with_vitals(self, patient_id: &PatientId, records: Vec<VitalsRecord>) -> Self {
        self.backend.lock().vitals.insert(patient_id.clone(), records);
        self
    }

    pub(crate) fn with_risk_score(self, score: RiskScore) -> Self {
        self.backend
            .lock()
            .risk_scores
            .insert(score.patient_id.clone(), score);
        self
    }

    /// Makes every following call fail with `status`.
    pub(crate) fn fail_with(&self, status: u16, message: &str) {
        self.backend.lock().failure = Some((status, message.to_string()));
    }

    /// Makes every following call wait for a permit on the returned
    /// [`Notify`].
    pub(crate) fn hold(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.hold.lock() = Some(Arc::clone(&notify));
        notify
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.backend.lock().calls.clone()
    }

    async fn call(&self, name: String) -> Result<(), ClientError> {
        let hold = self.hold.lock().clone();
        if let Some(notify) = hold {
            notify.notified().await;
        }
        let mut backend = self.backend.lock();
        backend.calls.push(name);
        match &backend.failure {
            Some((status, message)) => Err(ClientError::Api {
                status: *status,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    fn not_found(what: &str) -> ClientError {
        ClientError::Api {
            status: 404,
            message: format!("{what} not found"),
        }
    }

    fn transition(&self, alert_id: &AlertId, status: AlertStatus) -> Result<StatusResponse, ClientError> {
        let mut backend = self.backend.lock();
        let Some(alert) = backend.alerts.iter_mut().find(|a| a.alert_id == *alert_id) else {
            return Err(Self::not_found(&format!("Alert {alert_id}")));
        };
        alert.status = status;
        Ok(StatusResponse {
            status: "success".to_string(),
            message: format!("Alert {alert_id} {status}"),
        })
    }
}

impl MonitorApi for FakeApi {
    async fn list_patients(&self) -> Result<Vec<Patient>, ClientError> {
        self.call("list_patients".to_string()).await?;
        Ok(self.backend.lock().patients.clone())
    }

    async fn get_patient(&self, patient_id: &PatientId) -> Result<Patient, ClientError> {
        self.call(format!("get_patient {patient_id}")).await?;
        self.backend
            .lock()
            .patients
            .iter()
            .find(|p| p.patient_id == *patient_id)
            .cloned()
            .ok_or_else(|| Self::not_found(&format!("Patient {patient_id}")))
    }

    async fn patient_vitals(
        &self,
        patient_id: &PatientId,
        limit: usize,
    ) -> Result<Vec<VitalsRecord>, ClientError> {
        self.call(format!("patient_vitals {patient_id} {limit}")).await?;
        let backend = self.backend.lock();
        let records = backend.vitals.get(patient_id).cloned().unwrap_or_default();
        let skip = records.len().saturating_sub(limit);
        Ok(records.into_iter().skip(skip).collect())
    }

    async fn risk_score(&self, patient_id: &PatientId) -> Result<RiskScore, ClientError> {
        self.call(format!("risk_score {patient_id}")).await?;
        self.backend
            .lock()
            .risk_scores
            .get(patient_id)
            .cloned()
            .ok_or_else(|| Self::not_found(&format!("Patient {patient_id}")))
    }

    async fn list_alerts(&self, patient_id: Option<&PatientId>) -> Result<AlertsResponse, ClientError> {
        self.call(format!("list_alerts {patient_id:?}")).await?;
        let alerts: Vec<Alert> = self
            .backend
            .lock()
            .alerts
            .iter()
            .filter(|a| patient_id.is_none_or(|p| a.patient_id == *p))
            .cloned()
            .collect();
        Ok(AlertsResponse {
            status: "success".to_string(),
            count: alerts.len(),
            alerts,
        })
    }

    async fn acknowledge_alert(&self, alert_id: &AlertId) -> Result<StatusResponse, ClientError> {
        self.call(format!("acknowledge_alert {alert_id}")).await?;
        self.transition(alert_id, AlertStatus::Acknowledged)
    }

    async fn resolve_alert(&self, alert_id: &AlertId) -> Result<StatusResponse, ClientError> {
        self.call(format!("resolve_alert {alert_id}")).await?;
        self.transition(alert_id, AlertStatus::Resolved)
    }

    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError> {
        self.call(format!("send_chat {:?}", request.patient_id)).await?;
        Ok(ChatResponse {
            message_id: MessageId::new(format!("reply-{}", request.message.len())),
            content: format!("Re: {}", request.message),
            audio_url: None,
            timestamp: at(30),
        })
    }
}

/// Patient fixture.
pub(crate) fn patient(id: &str) -> Patient {
    Patient {
        patient_id: PatientId::from(id),
        name: format!("Patient {id}"),
        age: Some(64),
        gender: None,
        blood_type: None,
        admission_date: None,
        assigned_doctor: None,
        room_number: Some("12A".to_string()),
        diagnosis: None,
        allergies: None,
        medications: None,
        status: PatientStatus::Active,
        updated_at: None,
    }
}

/// Alert fixture.
pub(crate) fn alert(id: &str, patient: &str, status: AlertStatus) -> Alert {
    Alert {
        alert_id: AlertId::from(id),
        patient_id: PatientId::from(patient),
        alert_type: "vitals_anomaly".to_string(),
        severity: Severity::High,
        message: "Heart rate above 130".to_string(),
        details: None,
        status,
        created_by: None,
        timestamp: at(0),
        acknowledged_at: None,
        resolved_at: None,
        pending_status: None,
    }
}

/// Vitals fixture.
pub(crate) fn vitals(patient: &str, minute: u32, heart_rate: f64) -> VitalsRecord {
    VitalsRecord {
        vital_id: None,
        patient_id: PatientId::from(patient),
        heart_rate,
        bp_systolic: 120.0,
        bp_diastolic: 80.0,
        o2_saturation: 98.0,
        temperature: 36.9,
        respiratory_rate: None,
        timestamp: at(minute),
    }
}
