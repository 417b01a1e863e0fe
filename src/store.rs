//! Per-patient time-series storage.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::types::{Measurement, PatientId};

/// Storage interface the alert engine reads from.
///
/// Implementations must be safe to share between the generator tasks that
/// append and whatever drives the alert engine.
pub trait RecordStore: Send + Sync {
    /// Append one reading for a patient.
    fn append(&self, patient_id: PatientId, value: f64, label: &str, timestamp: i64);

    /// All readings for `patient_id` with `from <= timestamp <= to`.
    ///
    /// Callers must not rely on any particular ordering.
    fn records_in_range(&self, patient_id: PatientId, from: i64, to: i64) -> Vec<Measurement>;

    /// Every patient with at least one stored reading.
    fn patient_ids(&self) -> Vec<PatientId>;
}

/// In-memory store, kept in arrival order per patient.
///
/// Grows without bound for the life of the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    series: RwLock<BTreeMap<PatientId, Vec<Measurement>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of readings across all patients.
    pub fn len(&self) -> usize {
        self.series.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordStore for MemoryStore {
    fn append(&self, patient_id: PatientId, value: f64, label: &str, timestamp: i64) {
        self.series
            .write()
            .entry(patient_id)
            .or_default()
            .push(Measurement::new(patient_id, timestamp, label, value));
    }

    fn records_in_range(&self, patient_id: PatientId, from: i64, to: i64) -> Vec<Measurement> {
        self.series
            .read()
            .get(&patient_id)
            .map(|records| {
                records
                    .iter()
                    .filter(|m| m.timestamp >= from && m.timestamp <= to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn patient_ids(&self) -> Vec<PatientId> {
        self.series.read().keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_is_inclusive() {
        let store = MemoryStore::new();
        store.append(1, 120.0, "Systolic", 10);
        store.append(1, 121.0, "Systolic", 20);
        store.append(1, 122.0, "Systolic", 30);

        let records = store.records_in_range(1, 10, 20);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].value, 120.0);
        assert_eq!(records[1].value, 121.0);
    }

    #[test]
    fn patients_are_isolated() {
        let store = MemoryStore::new();
        store.append(1, 95.0, "Saturation", 1);
        store.append(2, 91.0, "Saturation", 1);

        assert_eq!(store.records_in_range(1, 0, i64::MAX).len(), 1);
        assert_eq!(store.records_in_range(2, 0, i64::MAX)[0].value, 91.0);
        assert!(store.records_in_range(3, 0, i64::MAX).is_empty());
        assert_eq!(store.patient_ids(), vec![1, 2]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn empty_store() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert!(store.patient_ids().is_empty());
    }
}
