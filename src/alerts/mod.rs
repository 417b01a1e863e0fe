//! Alert detection over stored patient history.
//!
//! The engine keeps no per-patient state between evaluations apart from the
//! alerts it has already raised: every call re-reads the patient's whole
//! history from the store and runs the rule battery in [`rules`].

pub mod rules;

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::store::RecordStore;
use crate::types::{now_millis, PatientId};

pub use rules::{AlertCondition, VitalsSummary};

/// A raised alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub patient_id: String,
    pub condition: String,
    pub timestamp: i64,
}

impl Alert {
    pub fn new(patient_id: impl Into<String>, condition: impl Into<String>, timestamp: i64) -> Self {
        Self {
            patient_id: patient_id.into(),
            condition: condition.into(),
            timestamp,
        }
    }
}

/// Evaluates patients against the rule battery and records each
/// (patient, condition) pair at most once.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use vitals_sim::{AlertEngine, MemoryStore, RecordStore};
///
/// let store = Arc::new(MemoryStore::new());
/// store.append(1, 185.0, "Systolic", 1);
///
/// let mut engine = AlertEngine::new(store);
/// let raised = engine.evaluate(1);
/// assert_eq!(raised[0].condition, "Critical BP 185/?");
///
/// // Same history, same condition: nothing new
/// assert!(engine.evaluate(1).is_empty());
/// assert_eq!(engine.alerts().len(), 1);
/// ```
#[derive(Debug)]
pub struct AlertEngine<S: ?Sized> {
    store: Arc<S>,
    alerts: Vec<Alert>,
    seen: HashSet<(String, String)>,
}

impl<S: RecordStore + ?Sized> AlertEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            alerts: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Every alert recorded so far, in the order raised.
    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    /// Evaluate one patient's history up to now.
    ///
    /// Returns the alerts newly recorded by this call.
    pub fn evaluate(&mut self, patient_id: PatientId) -> Vec<Alert> {
        self.evaluate_at(patient_id, now_millis())
    }

    /// Evaluate one patient's history in `[0, now]`, stamping alerts with
    /// `now`.
    pub fn evaluate_at(&mut self, patient_id: PatientId, now: i64) -> Vec<Alert> {
        let records = self.store.records_in_range(patient_id, 0, now);
        let summary = VitalsSummary::from_records(&records);
        debug!(patient_id, records = records.len(), ?summary, "evaluating patient");

        rules::check(&summary)
            .into_iter()
            .map(|condition| Alert::new(patient_id.to_string(), condition.to_string(), now))
            .filter_map(|alert| self.record(alert))
            .collect()
    }

    /// Evaluate every patient the store knows about.
    pub fn evaluate_all(&mut self) -> Vec<Alert> {
        let now = now_millis();
        self.store
            .patient_ids()
            .into_iter()
            .flat_map(|patient_id| self.evaluate_at(patient_id, now))
            .collect()
    }

    /// Keep `alert` unless the same patient already has the same condition.
    fn record(&mut self, alert: Alert) -> Option<Alert> {
        let key = (alert.patient_id.clone(), alert.condition.clone());
        if !self.seen.insert(key) {
            return None;
        }

        println!("ALERT: patient {} - {}", alert.patient_id, alert.condition);
        warn!(
            patient_id = %alert.patient_id,
            condition = %alert.condition,
            "alert raised"
        );
        self.alerts.push(alert.clone());
        Some(alert)
    }
}
