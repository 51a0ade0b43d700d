//! Patient, vitals and risk-score fetches reconciled into the stores.

use std::sync::Arc;

use crate::api::MonitorApi;
use crate::domain::{Patient, PatientId, RiskScore, VitalsRecord};
use crate::error::ClientError;
use crate::store::{PatientStore, VitalsStore};

/// Fetches roster entries, vitals history and risk scores.
#[derive(Debug)]
pub struct PatientService<A> {
    api: Arc<A>,
    patients: Arc<PatientStore>,
    vitals: Arc<VitalsStore>,
    vitals_limit: usize,
}

impl<A> Clone for PatientService<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            patients: Arc::clone(&self.patients),
            vitals: Arc::clone(&self.vitals),
            vitals_limit: self.vitals_limit,
        }
    }
}

impl<A: MonitorApi> PatientService<A> {
    /// Creates a service writing into the given stores. `vitals_limit` is
    /// the history length requested by [`PatientService::fetch_vitals`].
    #[must_use]
    pub fn new(
        api: Arc<A>,
        patients: Arc<PatientStore>,
        vitals: Arc<VitalsStore>,
        vitals_limit: usize,
    ) -> Self {
        Self {
            api,
            patients,
            vitals,
            vitals_limit,
        }
    }

    /// Fetches the roster and replaces the patient store with it.
    ///
    /// # Errors
    ///
    /// Returns the [`ClientError`] of the failed request; the roster is left
    /// untouched.
    pub async fn fetch_patients(&self) -> Result<Vec<Patient>, ClientError> {
        let patients = self.api.list_patients().await?;
        tracing::debug!(count = patients.len(), "roster fetched");
        self.patients.replace_all(patients).await;
        Ok(self.patients.list().await)
    }

    /// Fetches one patient and overwrites its roster entry.
    ///
    /// # Errors
    ///
    /// Returns the [`ClientError`] of the failed request.
    pub async fn fetch_patient(&self, patient_id: &PatientId) -> Result<Patient, ClientError> {
        let patient = self.api.get_patient(patient_id).await?;
        self.patients.apply(patient.clone()).await;
        Ok(patient)
    }

    /// Fetches recent vitals of a patient and merges them with the samples
    /// already received over the stream. Returns the merged series.
    ///
    /// # Errors
    ///
    /// Returns the [`ClientError`] of the failed request.
    pub async fn fetch_vitals(&self, patient_id: &PatientId) -> Result<Vec<VitalsRecord>, ClientError> {
        let records = self.api.patient_vitals(patient_id, self.vitals_limit).await?;
        let added = self.vitals.merge_fetched(patient_id, records).await;
        tracing::debug!(patient_id = %patient_id, added, "vitals history merged");
        Ok(self.vitals.series(patient_id).await)
    }

    /// Fetches and caches the risk score of a patient.
    ///
    /// # Errors
    ///
    /// Returns the [`ClientError`] of the failed request.
    pub async fn fetch_risk_score(&self, patient_id: &PatientId) -> Result<RiskScore, ClientError> {
        let score = self.api.risk_score(patient_id).await?;
        self.patients.set_risk_score(score.clone()).await;
        Ok(score)
    }

    /// Cached roster entry.
    pub async fn patient(&self, patient_id: &PatientId) -> Option<Patient> {
        self.patients.get(patient_id).await
    }

    /// Cached risk score.
    pub async fn risk_score(&self, patient_id: &PatientId) -> Option<RiskScore> {
        self.patients.risk_score(patient_id).await
    }
}
