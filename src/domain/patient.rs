//! Patient roster entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PatientId;
use super::timestamp;

/// Admission status of a patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatientStatus {
    /// Admitted.
    #[default]
    Active,
    /// Discharged.
    Discharged,
    /// Admitted and in critical condition.
    Critical,
}

/// Roster snapshot of one patient. Replaced wholesale on every update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    /// Patient identifier.
    pub patient_id: PatientId,
    /// Full name.
    pub name: String,
    /// Age in years.
    #[serde(default)]
    pub age: Option<u32>,
    /// Gender as recorded.
    #[serde(default)]
    pub gender: Option<String>,
    /// Blood type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blood_type: Option<String>,
    /// Admission time.
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub admission_date: Option<DateTime<Utc>>,
    /// Responsible physician.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_doctor: Option<String>,
    /// Room.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_number: Option<String>,
    /// Working diagnosis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
    /// Known allergies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allergies: Option<String>,
    /// Current medications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medications: Option<String>,
    /// Admission status.
    #[serde(default)]
    pub status: PatientStatus,
    /// Last backend modification time.
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub updated_at: Option<DateTime<Utc>>,
}
