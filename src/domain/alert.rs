//! Alerts raised against patients and their forward-only lifecycle.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timestamp;
use super::{AlertId, PatientId};

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational.
    Low,
    /// Needs review.
    Medium,
    /// Needs prompt action.
    High,
    /// Needs immediate action.
    Critical,
}

/// Alert lifecycle status.
///
/// Variants are declared in lifecycle order so that `Ord` expresses the
/// only permitted direction: a status may move to a greater value, never
/// to a smaller one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    /// Raised and awaiting a clinician.
    #[default]
    Active,
    /// Seen by a clinician.
    Acknowledged,
    /// Closed.
    Resolved,
}

impl AlertStatus {
    /// Returns `true` if moving from `self` to `next` is a forward step.
    #[must_use]
    pub fn can_advance_to(self, next: Self) -> bool {
        next > self
    }

    /// Returns the status as its wire string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Acknowledged => "acknowledged",
            Self::Resolved => "resolved",
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An alert as held by the alert store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Backend-assigned identifier.
    pub alert_id: AlertId,
    /// Patient the alert concerns.
    pub patient_id: PatientId,
    /// Alert category (e.g. `"vitals_anomaly"`).
    #[serde(default)]
    pub alert_type: String,
    /// Severity.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// Structured context supplied by the producer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// Confirmed lifecycle status.
    #[serde(default)]
    pub status: AlertStatus,
    /// Producer of the alert (agent or user).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    /// Time the alert was raised.
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub timestamp: DateTime<Utc>,
    /// Time the alert was acknowledged.
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub acknowledged_at: Option<DateTime<Utc>>,
    /// Time the alert was resolved.
    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub resolved_at: Option<DateTime<Utc>>,
    /// Transition requested locally and not yet confirmed by the backend.
    #[serde(skip)]
    pub pending_status: Option<AlertStatus>,
}

impl Alert {
    /// Returns the status a presentation layer should display: the pending
    /// transition if one is in flight, the confirmed status otherwise.
    #[must_use]
    pub fn effective_status(&self) -> AlertStatus {
        self.pending_status.unwrap_or(self.status).max(self.status)
    }

    /// Moves the alert forward to `next`, stamping the transition time.
    ///
    /// Returns `false` and leaves the alert untouched when `next` is not a
    /// forward step.
    pub fn advance(&mut self, next: AlertStatus, at: DateTime<Utc>) -> bool {
        if !self.status.can_advance_to(next) {
            return false;
        }
        match next {
            AlertStatus::Acknowledged => {
                self.acknowledged_at.get_or_insert(at);
            }
            AlertStatus::Resolved => {
                self.resolved_at.get_or_insert(at);
            }
            AlertStatus::Active => {}
        }
        self.status = next;
        if self.pending_status.is_some_and(|p| p <= next) {
            self.pending_status = None;
        }
        true
    }
}

/// Criteria for listing alerts. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    /// Only alerts for this patient.
    pub patient_id: Option<PatientId>,
    /// Only alerts of this severity.
    pub severity: Option<Severity>,
    /// Only alerts with this confirmed status.
    pub status: Option<AlertStatus>,
    /// Only alerts raised at or after this time.
    pub from: Option<DateTime<Utc>>,
    /// Only alerts raised at or before this time.
    pub to: Option<DateTime<Utc>>,
}

impl AlertFilter {
    /// Filter matching every alert of one patient.
    #[must_use]
    pub fn for_patient(patient_id: PatientId) -> Self {
        Self {
            patient_id: Some(patient_id),
            ..Self::default()
        }
    }

    /// Returns `true` if `alert` satisfies every set criterion.
    #[must_use]
    pub fn matches(&self, alert: &Alert) -> bool {
        self.patient_id.as_ref().is_none_or(|p| *p == alert.patient_id)
            && self.severity.is_none_or(|s| s == alert.severity)
            && self.status.is_none_or(|s| s == alert.status)
            && self.from.is_none_or(|from| alert.timestamp >= from)
            && self.to.is_none_or(|to| alert.timestamp <= to)
    }
}
