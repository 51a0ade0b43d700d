//! Per-patient vital-sign history.
//!
//! Each patient's series is kept sorted by sample time. Stream samples
//! normally arrive in order and are appended; fetched history is merged
//! into place. A sample matching a reading already held at the same time
//! replaces it and moves to the end of that time's run (last write wins);
//! a differing sample at the same time is kept as a distinct reading.

use std::collections::HashMap;

use tokio::sync::RwLock;

use super::ApplyOutcome;
use crate::domain::{PatientId, VitalsRecord};

/// Store of vitals series keyed by patient.
///
/// All mutations take the single write lock, so a stream sample and a
/// fetched page for the same patient never interleave.
#[derive(Debug)]
pub struct VitalsStore {
    series: RwLock<HashMap<PatientId, Vec<VitalsRecord>>>,
    history_limit: usize,
}

impl VitalsStore {
    /// Creates an empty store retaining at most `history_limit` samples per
    /// patient. A limit of zero is treated as one.
    #[must_use]
    pub fn new(history_limit: usize) -> Self {
        Self {
            series: RwLock::new(HashMap::new()),
            history_limit: history_limit.max(1),
        }
    }

    /// Applies one sample.
    pub async fn apply(&self, record: VitalsRecord) -> ApplyOutcome {
        let mut map = self.series.write().await;
        let series = map.entry(record.patient_id.clone()).or_default();
        let outcome = insert_sample(series, record);
        trim(series, self.history_limit);
        outcome
    }

    /// Merges a fetched page of history for one patient.
    ///
    /// Records for other patients in the page are ignored. Returns the
    /// number of samples that changed the series.
    pub async fn merge_fetched(&self, patient_id: &PatientId, records: Vec<VitalsRecord>) -> usize {
        let mut map = self.series.write().await;
        let series = map.entry(patient_id.clone()).or_default();
        let mut changed = 0;
        for record in records {
            if record.patient_id != *patient_id {
                tracing::debug!(
                    expected = %patient_id,
                    got = %record.patient_id,
                    "skipping vitals row for another patient"
                );
                continue;
            }
            if insert_sample(series, record).is_change() {
                changed += 1;
            }
        }
        trim(series, self.history_limit);
        changed
    }

    /// Returns the series for a patient, oldest first.
    pub async fn series(&self, patient_id: &PatientId) -> Vec<VitalsRecord> {
        self.series
            .read()
            .await
            .get(patient_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the most recent sample for a patient.
    pub async fn latest(&self, patient_id: &PatientId) -> Option<VitalsRecord> {
        self.series
            .read()
            .await
            .get(patient_id)
            .and_then(|s| s.last().cloned())
    }

    /// Returns the patients with at least one sample.
    pub async fn patients(&self) -> Vec<PatientId> {
        let map = self.series.read().await;
        let mut ids: Vec<PatientId> = map
            .iter()
            .filter(|(_, s)| !s.is_empty())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}

/// Inserts `record` after every sample with a timestamp less than or equal
/// to its own. A matching reading at that time is replaced and moved to the
/// end of the run; it is a no-op only when it already is the newest.
fn insert_sample(series: &mut Vec<VitalsRecord>, record: VitalsRecord) -> ApplyOutcome {
    let upper = series.partition_point(|s| s.timestamp <= record.timestamp);
    let lower = series.partition_point(|s| s.timestamp < record.timestamp);

    let matched = series
        .get(lower..upper)
        .and_then(|same_time| same_time.iter().position(|s| s.same_reading(&record)))
        .map(|offset| lower + offset);

    if let Some(index) = matched {
        let tail = upper - 1;
        if index == tail && series.get(index) == Some(&record) {
            return ApplyOutcome::Unchanged;
        }
        series.remove(index);
        series.insert(tail, record);
        return ApplyOutcome::Updated;
    }

    series.insert(upper, record);
    ApplyOutcome::Inserted
}

fn trim(series: &mut Vec<VitalsRecord>, limit: usize) {
    if series.len() > limit {
        let excess = series.len() - limit;
        series.drain(..excess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0)
            .single()
            .unwrap_or_default()
    }

    fn sample(patient: &str, secs: i64, heart_rate: f64) -> VitalsRecord {
        VitalsRecord {
            vital_id: None,
            patient_id: PatientId::from(patient),
            heart_rate,
            bp_systolic: 120.0,
            bp_diastolic: 80.0,
            o2_saturation: 98.0,
            temperature: 37.0,
            respiratory_rate: Some(16.0),
            timestamp: at(secs),
        }
    }

    #[tokio::test]
    async fn latest_equals_last_of_ordered_sequence() {
        let store = VitalsStore::new(1_000);
        let p1 = PatientId::from("P1");
        for n in 0..50 {
            store.apply(sample("P1", n, 60.0 + n as f64)).await;
        }
        let latest = store.latest(&p1).await;
        assert_eq!(latest, Some(sample("P1", 49, 109.0)));
        assert_eq!(store.series(&p1).await.len(), 50);
    }

    #[tokio::test]
    async fn identical_sample_is_deduplicated() {
        let store = VitalsStore::new(100);
        assert_eq!(store.apply(sample("P1", 0, 80.0)).await, ApplyOutcome::Inserted);
        assert_eq!(store.apply(sample("P1", 0, 80.0)).await, ApplyOutcome::Unchanged);
        assert_eq!(store.series(&PatientId::from("P1")).await.len(), 1);
    }

    #[tokio::test]
    async fn differing_sample_at_same_time_is_retained() {
        let store = VitalsStore::new(100);
        store.apply(sample("P1", 0, 80.0)).await;
        assert_eq!(store.apply(sample("P1", 0, 95.0)).await, ApplyOutcome::Inserted);
        let series = store.series(&PatientId::from("P1")).await;
        assert_eq!(series.len(), 2);
        assert_eq!(series.last().map(|s| s.heart_rate), Some(95.0));
    }

    #[tokio::test]
    async fn replayed_reading_becomes_latest_again() {
        let store = VitalsStore::new(100);
        let p1 = PatientId::from("P1");
        assert_eq!(store.apply(sample("P1", 0, 80.0)).await, ApplyOutcome::Inserted);
        assert_eq!(store.apply(sample("P1", 0, 95.0)).await, ApplyOutcome::Inserted);
        assert_eq!(store.apply(sample("P1", 0, 80.0)).await, ApplyOutcome::Updated);

        assert_eq!(store.latest(&p1).await.map(|s| s.heart_rate), Some(80.0));
        let rates: Vec<f64> = store.series(&p1).await.iter().map(|s| s.heart_rate).collect();
        assert_eq!(rates, vec![95.0, 80.0]);
    }

    #[tokio::test]
    async fn late_sample_is_placed_in_time_order() {
        let store = VitalsStore::new(100);
        store.apply(sample("P1", 10, 70.0)).await;
        store.apply(sample("P1", 30, 90.0)).await;
        store.apply(sample("P1", 20, 80.0)).await;
        let rates: Vec<f64> = store
            .series(&PatientId::from("P1"))
            .await
            .iter()
            .map(|s| s.heart_rate)
            .collect();
        assert_eq!(rates, vec![70.0, 80.0, 90.0]);
    }

    #[tokio::test]
    async fn fetched_row_id_overwrites_streamed_duplicate() {
        let store = VitalsStore::new(100);
        let p1 = PatientId::from("P1");
        store.apply(sample("P1", 5, 75.0)).await;

        let mut row = sample("P1", 5, 75.0);
        row.vital_id = Some("v-5".to_string());
        let changed = store.merge_fetched(&p1, vec![row, sample("P1", 1, 72.0)]).await;

        assert_eq!(changed, 2);
        let series = store.series(&p1).await;
        assert_eq!(series.len(), 2);
        assert_eq!(series.last().and_then(|s| s.vital_id.clone()), Some("v-5".to_string()));
    }

    #[tokio::test]
    async fn merge_ignores_rows_for_other_patients() {
        let store = VitalsStore::new(100);
        let changed = store
            .merge_fetched(&PatientId::from("P1"), vec![sample("P2", 0, 70.0)])
            .await;
        assert_eq!(changed, 0);
        assert!(store.series(&PatientId::from("P2")).await.is_empty());
    }

    #[tokio::test]
    async fn history_limit_evicts_oldest() {
        let store = VitalsStore::new(3);
        for n in 0..5 {
            store.apply(sample("P1", n, 70.0 + n as f64)).await;
        }
        let series = store.series(&PatientId::from("P1")).await;
        assert_eq!(series.len(), 3);
        assert_eq!(series.first().map(|s| s.timestamp), Some(at(2)));
    }

    #[tokio::test]
    async fn patients_are_partitioned() {
        let store = VitalsStore::new(100);
        store.apply(sample("P2", 0, 70.0)).await;
        store.apply(sample("P1", 0, 70.0)).await;
        assert_eq!(
            store.patients().await,
            vec![PatientId::from("P1"), PatientId::from("P2")]
        );
        assert!(store.latest(&PatientId::from("P3")).await.is_none());
    }
}
