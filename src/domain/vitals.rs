//! Vital-sign samples and derived risk scores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PatientId;
use super::timestamp;

/// One vital-sign sample for a patient.
///
/// Keyed by `(patient_id, timestamp)`. Several samples may share a
/// timestamp when their readings differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalsRecord {
    /// Backend row id; absent for samples that arrived over the stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vital_id: Option<String>,
    /// Patient the sample belongs to.
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
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub respiratory_rate: Option<f64>,
    /// Origin-assigned sample time.
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub timestamp: DateTime<Utc>,
}

impl VitalsRecord {
    /// Returns `true` if both samples carry identical readings, ignoring
    /// the backend row id.
    #[must_use]
    pub fn same_reading(&self, other: &Self) -> bool {
        self.patient_id == other.patient_id
            && self.timestamp == other.timestamp
            && self.heart_rate == other.heart_rate
            && self.bp_systolic == other.bp_systolic
            && self.bp_diastolic == other.bp_diastolic
            && self.o2_saturation == other.o2_saturation
            && self.temperature == other.temperature
            && self.respiratory_rate == other.respiratory_rate
    }
}

/// Coarse risk bucket computed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// No concerns.
    Low,
    /// Worth watching.
    Medium,
    /// Needs attention.
    High,
    /// Needs immediate attention.
    Critical,
    /// Not enough data to score.
    #[default]
    #[serde(other)]
    Unknown,
}

/// Risk assessment for one patient, fetched on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    /// Patient the score belongs to.
    pub patient_id: PatientId,
    /// Numeric score, higher is worse.
    pub risk_score: f64,
    /// Bucketed level.
    #[serde(default)]
    pub risk_level: RiskLevel,
    /// Human-readable reasons.
    #[serde(default)]
    pub concerns: Vec<String>,
    /// Sample the score was computed from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_vitals: Option<VitalsRecord>,
}
