//! Patient roster and cached risk scores.

use std::collections::HashMap;

use tokio::sync::RwLock;

use super::ApplyOutcome;
use crate::domain::{Patient, PatientId, RiskScore};

#[derive(Debug, Default)]
struct Roster {
    patients: HashMap<PatientId, Patient>,
    risk_scores: HashMap<PatientId, RiskScore>,
}

/// Store of roster entries keyed by patient. Entries are snapshots and are
/// overwritten wholesale.
#[derive(Debug, Default)]
pub struct PatientStore {
    roster: RwLock<Roster>,
}

impl PatientStore {
    /// Creates an empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites one entry.
    pub async fn apply(&self, patient: Patient) -> ApplyOutcome {
        let mut roster = self.roster.write().await;
        match roster.patients.insert(patient.patient_id.clone(), patient.clone()) {
            None => ApplyOutcome::Inserted,
            Some(previous) if previous == patient => ApplyOutcome::Unchanged,
            Some(_) => ApplyOutcome::Updated,
        }
    }

    /// Replaces the whole roster with a fetched list. Cached risk scores of
    /// patients no longer listed are dropped.
    pub async fn replace_all(&self, patients: Vec<Patient>) {
        let mut roster = self.roster.write().await;
        roster.patients = patients
            .into_iter()
            .map(|p| (p.patient_id.clone(), p))
            .collect();
        let Roster {
            patients,
            risk_scores,
        } = &mut *roster;
        risk_scores.retain(|id, _| patients.contains_key(id));
    }

    /// Caches the latest risk score of a patient.
    pub async fn set_risk_score(&self, score: RiskScore) {
        self.roster
            .write()
            .await
            .risk_scores
            .insert(score.patient_id.clone(), score);
    }

    /// Returns one entry.
    pub async fn get(&self, patient_id: &PatientId) -> Option<Patient> {
        self.roster.read().await.patients.get(patient_id).cloned()
    }

    /// Returns the cached risk score of a patient.
    pub async fn risk_score(&self, patient_id: &PatientId) -> Option<RiskScore> {
        self.roster.read().await.risk_scores.get(patient_id).cloned()
    }

    /// Returns every entry ordered by patient id.
    pub async fn list(&self) -> Vec<Patient> {
        let roster = self.roster.read().await;
        let mut patients: Vec<Patient> = roster.patients.values().cloned().collect();
        patients.sort_by(|a, b| a.patient_id.cmp(&b.patient_id));
        patients
    }
}
