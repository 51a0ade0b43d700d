//! Alert commands reconciled into the alert store.

use std::sync::Arc;

use chrono::Utc;

use crate::api::MonitorApi;
use crate::domain::{Alert, AlertFilter, AlertId, AlertStatus, PatientId};
use crate::error::ClientError;
use crate::store::{AlertStore, ApplyOutcome};

/// Fetches alerts and drives acknowledge/resolve.
///
/// Transitions are optimistic: the requested status is recorded as
/// `pending_status` before the request is sent, confirmed when the
/// backend accepts it, and dropped when the request fails.
#[derive(Debug)]
pub struct AlertService<A> {
    api: Arc<A>,
    store: Arc<AlertStore>,
}

impl<A> Clone for AlertService<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            store: Arc::clone(&self.store),
        }
    }
}

impl<A: MonitorApi> AlertService<A> {
    /// Creates a service writing into `store`.
    #[must_use]
    pub fn new(api: Arc<A>, store: Arc<AlertStore>) -> Self {
        Self { api, store }
    }

    /// Fetches alerts, optionally for one patient, and merges them into the
    /// store. Returns the store's view of the fetched scope.
    ///
    /// # Errors
    ///
    /// Returns the [`ClientError`] of the failed request; the store is left
    /// untouched.
    pub async fn fetch_alerts(&self, patient_id: Option<&PatientId>) -> Result<Vec<Alert>, ClientError> {
        let response = self.api.list_alerts(patient_id).await?;
        let fetched = response.alerts.len();
        let changed = self.store.merge_fetched(response.alerts).await;
        tracing::debug!(fetched, changed, patient_id = ?patient_id, "merged fetched alerts");

        let filter = patient_id.map_or_else(AlertFilter::default, |p| AlertFilter::for_patient(p.clone()));
        Ok(self.store.list(&filter).await)
    }

    /// Acknowledges an alert.
    ///
    /// # Errors
    ///
    /// Returns the [`ClientError`] of the failed request after clearing the
    /// pending transition.
    pub async fn acknowledge(&self, alert_id: &AlertId) -> Result<ApplyOutcome, ClientError> {
        self.transition(alert_id, AlertStatus::Acknowledged).await
    }

    /// Resolves an alert.
    ///
    /// # Errors
    ///
    /// Returns the [`ClientError`] of the failed request after clearing the
    /// pending transition.
    pub async fn resolve(&self, alert_id: &AlertId) -> Result<ApplyOutcome, ClientError> {
        self.transition(alert_id, AlertStatus::Resolved).await
    }

    async fn transition(&self, alert_id: &AlertId, target: AlertStatus) -> Result<ApplyOutcome, ClientError> {
        let pending = self.store.mark_pending(alert_id, target).await;
        tracing::info!(alert_id = %alert_id, target = %target, pending, "requesting alert transition");

        let result = if target == AlertStatus::Resolved {
            self.api.resolve_alert(alert_id).await
        } else {
            self.api.acknowledge_alert(alert_id).await
        };

        match result {
            Ok(response) => {
                let outcome = self.store.confirm(alert_id, target, Utc::now()).await;
                tracing::info!(alert_id = %alert_id, target = %target, ?outcome, message = %response.message, "alert transition confirmed");
                Ok(outcome)
            }
            Err(e) => {
                self.store.clear_pending(alert_id).await;
                tracing::warn!(alert_id = %alert_id, target = %target, error = %e, "alert transition failed");
                Err(e)
            }
        }
    }

    /// Alerts matching `filter`, newest first.
    pub async fn alerts(&self, filter: &AlertFilter) -> Vec<Alert> {
        self.store.list(filter).await
    }

    /// Number of alerts still active.
    pub async fn active_count(&self) -> usize {
        self.store.active_count().await
    }
}
