//! Alert store with forward-only status semantics.
//!
//! Alerts are inserted by stream events or fetches and are never deleted
//! client-side. Status only moves forward (active → acknowledged →
//! resolved); any input asserting an earlier status than the one held is
//! a no-op. An event for an unseen alert is an implicit insert, so the
//! store converges whatever order stream events and fetches arrive in.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::ApplyOutcome;
use crate::domain::{Alert, AlertFilter, AlertId, AlertPayload, AlertStatus};

/// Alert update decoded from the stream, stamped with its event time.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertUpdate {
    /// Event payload.
    pub payload: AlertPayload,
    /// Origin event time.
    pub timestamp: DateTime<Utc>,
}

/// Store of alerts keyed by `alert_id`.
#[derive(Debug, Default)]
pub struct AlertStore {
    alerts: RwLock<HashMap<AlertId, Alert>>,
}

impl AlertStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a stream update.
    ///
    /// - unseen id: inserted with the asserted status (active by default)
    /// - earlier status than held: rejected, nothing changes
    /// - same status: descriptive fields refreshed
    /// - later status: advanced, transition time stamped
    pub async fn apply(&self, update: AlertUpdate) -> ApplyOutcome {
        let AlertUpdate { payload, timestamp } = update;
        let mut map = self.alerts.write().await;

        let Some(alert) = map.get_mut(&payload.alert_id) else {
            let alert = alert_from_event(payload, timestamp);
            map.insert(alert.alert_id.clone(), alert);
            return ApplyOutcome::Inserted;
        };

        let asserted = payload.asserted_status();
        if asserted < alert.status {
            tracing::debug!(
                alert_id = %alert.alert_id,
                held = %alert.status,
                asserted = %asserted,
                "rejecting backward alert transition"
            );
            return ApplyOutcome::Rejected;
        }

        let before = alert.clone();
        alert.severity = payload.severity;
        alert.message = payload.message;
        alert.patient_id = payload.patient_id;
        if let Some(alert_type) = payload.alert_type {
            alert.alert_type = alert_type;
        }
        if payload.details.is_some() {
            alert.details = payload.details;
        }
        if payload.created_by.is_some() {
            alert.created_by = payload.created_by;
        }
        alert.advance(asserted, timestamp);

        if *alert == before {
            ApplyOutcome::Unchanged
        } else {
            ApplyOutcome::Updated
        }
    }

    /// Merges alerts returned by a fetch.
    ///
    /// Descriptive fields come from the fetched copy; status is the later
    /// of the held and fetched values. Alerts held locally but absent from
    /// the page are kept. Returns the number of alerts that changed.
    pub async fn merge_fetched(&self, fetched: Vec<Alert>) -> usize {
        let mut map = self.alerts.write().await;
        let mut changed = 0;
        for incoming in fetched {
            match map.get_mut(&incoming.alert_id) {
                None => {
                    map.insert(incoming.alert_id.clone(), incoming);
                    changed += 1;
                }
                Some(held) => {
                    let merged = merge_alert(held, incoming);
                    if merged != *held {
                        *held = merged;
                        changed += 1;
                    }
                }
            }
        }
        changed
    }

    /// Records a locally requested transition that the backend has not yet
    /// confirmed. Returns `false` if the alert is unknown or the transition
    /// is not a forward step.
    pub async fn mark_pending(&self, alert_id: &AlertId, target: AlertStatus) -> bool {
        let mut map = self.alerts.write().await;
        match map.get_mut(alert_id) {
            Some(alert) if alert.status.can_advance_to(target) => {
                alert.pending_status = Some(target);
                true
            }
            _ => false,
        }
    }

    /// Applies a transition the backend has confirmed.
    pub async fn confirm(&self, alert_id: &AlertId, target: AlertStatus, at: DateTime<Utc>) -> ApplyOutcome {
        let mut map = self.alerts.write().await;
        let Some(alert) = map.get_mut(alert_id) else {
            return ApplyOutcome::Rejected;
        };
        if alert.advance(target, at) {
            ApplyOutcome::Updated
        } else {
            if alert.pending_status.is_some_and(|p| p <= alert.status) {
                alert.pending_status = None;
            }
            ApplyOutcome::Unchanged
        }
    }

    /// Drops a pending transition after its command failed.
    pub async fn clear_pending(&self, alert_id: &AlertId) {
        if let Some(alert) = self.alerts.write().await.get_mut(alert_id) {
            alert.pending_status = None;
        }
    }

    /// Returns one alert.
    pub async fn get(&self, alert_id: &AlertId) -> Option<Alert> {
        self.alerts.read().await.get(alert_id).cloned()
    }

    /// Returns the alerts matching `filter`, newest first.
    pub async fn list(&self, filter: &AlertFilter) -> Vec<Alert> {
        let map = self.alerts.read().await;
        let mut alerts: Vec<Alert> = map.values().filter(|a| filter.matches(a)).cloned().collect();
        alerts.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| a.alert_id.cmp(&b.alert_id))
        });
        alerts
    }

    /// Number of alerts whose confirmed status is still active.
    pub async fn active_count(&self) -> usize {
        self.alerts
            .read()
            .await
            .values()
            .filter(|a| a.status == AlertStatus::Active)
            .count()
    }

    /// Total number of alerts held.
    pub async fn len(&self) -> usize {
        self.alerts.read().await.len()
    }

    /// Returns `true` if no alert is held.
    pub async fn is_empty(&self) -> bool {
        self.alerts.read().await.is_empty()
    }
}

fn alert_from_event(payload: AlertPayload, timestamp: DateTime<Utc>) -> Alert {
    let status = payload.asserted_status();
    let mut alert = Alert {
        alert_id: payload.alert_id,
        patient_id: payload.patient_id,
        alert_type: payload.alert_type.unwrap_or_default(),
        severity: payload.severity,
        message: payload.message,
        details: payload.details,
        status: AlertStatus::Active,
        created_by: payload.created_by,
        timestamp,
        acknowledged_at: None,
        resolved_at: None,
        pending_status: None,
    };
    alert.advance(status, timestamp);
    alert
}

fn merge_alert(held: &Alert, incoming: Alert) -> Alert {
    let status = held.status.max(incoming.status);
    let pending_status = held.pending_status.filter(|p| *p > status);
    Alert {
        status,
        acknowledged_at: held.acknowledged_at.or(incoming.acknowledged_at),
        resolved_at: held.resolved_at.or(incoming.resolved_at),
        pending_status,
        ..incoming
    }
}
