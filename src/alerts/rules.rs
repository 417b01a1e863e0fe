//! The fixed clinical rule battery.

use std::fmt;

use crate::types::{Measurement, SignalKind};

/// Readings in the latest window per signal.
const WINDOW: usize = 3;

const SYSTOLIC_HIGH: f64 = 180.0;
const SYSTOLIC_LOW: f64 = 90.0;
const DIASTOLIC_HIGH: f64 = 120.0;
const DIASTOLIC_LOW: f64 = 60.0;
const TREND_STEP: f64 = 10.0;
const SPO2_LOW: f64 = 92.0;
const SPO2_DROP: f64 = 5.0;

/// The parts of a patient's history the rules look at.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VitalsSummary {
    pub systolic: Option<f64>,
    pub diastolic: Option<f64>,
    pub spo2: Option<f64>,
    /// Newest up-to-3 readings, oldest first.
    pub systolic_window: Vec<f64>,
    pub diastolic_window: Vec<f64>,
    pub spo2_window: Vec<f64>,
}

impl VitalsSummary {
    /// Summarize records given in any order.
    ///
    /// Records are ordered by timestamp (ties keep their given order) and each
    /// label is classified once.
    pub fn from_records(records: &[Measurement]) -> Self {
        let mut classified: Vec<_> = records
            .iter()
            .map(|m| (m.timestamp, m.kind(), m.value))
            .collect();
        classified.sort_by_key(|&(timestamp, _, _)| timestamp);

        let mut systolic = Vec::new();
        let mut diastolic = Vec::new();
        let mut spo2 = Vec::new();
        for (_, kind, value) in classified {
            match kind {
                SignalKind::Systolic => systolic.push(value),
                SignalKind::Diastolic => diastolic.push(value),
                SignalKind::Spo2 => spo2.push(value),
                SignalKind::Other => {}
            }
        }

        Self {
            systolic: systolic.last().copied(),
            diastolic: diastolic.last().copied(),
            spo2: spo2.last().copied(),
            systolic_window: latest_window(&systolic),
            diastolic_window: latest_window(&diastolic),
            spo2_window: latest_window(&spo2),
        }
    }
}

fn latest_window(values: &[f64]) -> Vec<f64> {
    values[values.len().saturating_sub(WINDOW)..].to_vec()
}

/// A condition raised by one of the rules.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertCondition {
    CriticalBp {
        systolic: Option<f64>,
        diastolic: Option<f64>,
    },
    BpTrend,
    LowSpo2(f64),
    RapidSpo2Drop,
    HypotensiveHypoxemia,
}

impl fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertCondition::CriticalBp {
                systolic,
                diastolic,
            } => write!(f, "Critical BP {}/{}", Reading(*systolic), Reading(*diastolic)),
            AlertCondition::BpTrend => f.write_str("BP Trend Alert"),
            AlertCondition::LowSpo2(value) => write!(f, "Low SpO2 ({value}%)"),
            AlertCondition::RapidSpo2Drop => f.write_str("Rapid SpO2 Drop"),
            AlertCondition::HypotensiveHypoxemia => f.write_str("Hypotensive-Hypoxemia"),
        }
    }
}

/// Renders a missing reading as `?`.
struct Reading(Option<f64>);

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => write!(f, "{value}"),
            None => f.write_str("?"),
        }
    }
}

/// Run every rule. Rules are independent; several may fire at once.
pub fn check(summary: &VitalsSummary) -> Vec<AlertCondition> {
    let mut fired = Vec::new();

    if critical_bp(summary.systolic, summary.diastolic) {
        fired.push(AlertCondition::CriticalBp {
            systolic: summary.systolic,
            diastolic: summary.diastolic,
        });
    }

    if trend(&summary.systolic_window) || trend(&summary.diastolic_window) {
        fired.push(AlertCondition::BpTrend);
    }

    if let Some(spo2) = summary.spo2.filter(|&v| v < SPO2_LOW) {
        fired.push(AlertCondition::LowSpo2(spo2));
    }

    if rapid_drop(&summary.spo2_window) {
        fired.push(AlertCondition::RapidSpo2Drop);
    }

    if let (Some(systolic), Some(spo2)) = (summary.systolic, summary.spo2) {
        if systolic < SYSTOLIC_LOW && spo2 < SPO2_LOW {
            fired.push(AlertCondition::HypotensiveHypoxemia);
        }
    }

    fired
}

fn critical_bp(systolic: Option<f64>, diastolic: Option<f64>) -> bool {
    systolic.is_some_and(|s| s > SYSTOLIC_HIGH || s < SYSTOLIC_LOW)
        || diastolic.is_some_and(|d| d > DIASTOLIC_HIGH || d < DIASTOLIC_LOW)
}

/// Three values with both steps larger than 10 in the same direction.
fn trend(window: &[f64]) -> bool {
    let &[a, b, c] = window else {
        return false;
    };
    let rising = b - a > TREND_STEP && c - b > TREND_STEP;
    let falling = a - b > TREND_STEP && b - c > TREND_STEP;
    rising || falling
}

/// The newest reading is at least 5 below the one before it.
fn rapid_drop(window: &[f64]) -> bool {
    match window {
        [.., previous, last] => previous - last >= SPO2_DROP,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(timestamp: i64, label: &str, value: f64) -> Measurement {
        Measurement::new(1, timestamp, label, value)
    }

    #[test]
    fn summary_sorts_by_timestamp() {
        let records = vec![
            m(3, "Saturation", 90.0),
            m(1, "Saturation", 97.0),
            m(2, "Saturation", 95.0),
            m(4, "Saturation", 94.0),
            m(0, "SystolicPressure", 120.0),
        ];
        let summary = VitalsSummary::from_records(&records);

        assert_eq!(summary.spo2, Some(94.0));
        assert_eq!(summary.spo2_window, vec![95.0, 90.0, 94.0]);
        assert_eq!(summary.systolic, Some(120.0));
        assert_eq!(summary.systolic_window, vec![120.0]);
        assert_eq!(summary.diastolic, None);
        assert!(summary.diastolic_window.is_empty());
    }

    #[test]
    fn other_labels_are_ignored() {
        let records = vec![m(1, "ECG", 0.4), m(2, "Alert", 1.0)];
        assert_eq!(VitalsSummary::from_records(&records), VitalsSummary::default());
        assert!(check(&VitalsSummary::default()).is_empty());
    }

    #[test]
    fn critical_bp_bounds() {
        assert!(critical_bp(Some(181.0), None));
        assert!(critical_bp(Some(89.0), None));
        assert!(!critical_bp(Some(180.0), None));
        assert!(!critical_bp(Some(90.0), None));
        assert!(critical_bp(None, Some(121.0)));
        assert!(critical_bp(None, Some(59.0)));
        assert!(!critical_bp(None, Some(120.0)));
        assert!(!critical_bp(None, Some(60.0)));
        assert!(!critical_bp(None, None));
    }

    #[test]
    fn trend_needs_three_large_steps_one_way() {
        assert!(trend(&[120.0, 131.0, 142.0]));
        assert!(trend(&[142.0, 131.0, 120.0]));
        assert!(!trend(&[120.0, 125.0, 128.0]));
        assert!(!trend(&[120.0, 130.0, 140.0]));
        assert!(!trend(&[120.0, 131.0, 120.0]));
        assert!(!trend(&[120.0, 131.0]));
        assert!(!trend(&[]));
    }

    #[test]
    fn rapid_drop_compares_newest_two() {
        assert!(rapid_drop(&[97.0, 90.0]));
        assert!(rapid_drop(&[99.0, 97.0, 92.0]));
        assert!(!rapid_drop(&[97.0, 94.0]));
        assert!(!rapid_drop(&[97.0, 90.0, 91.0]));
        assert!(!rapid_drop(&[90.0]));
        assert!(!rapid_drop(&[]));
    }

    #[test]
    fn condition_text() {
        let critical = AlertCondition::CriticalBp {
            systolic: Some(185.0),
            diastolic: None,
        };
        assert_eq!(critical.to_string(), "Critical BP 185/?");
        assert_eq!(AlertCondition::LowSpo2(90.0).to_string(), "Low SpO2 (90%)");
        assert_eq!(AlertCondition::BpTrend.to_string(), "BP Trend Alert");
        assert_eq!(AlertCondition::RapidSpo2Drop.to_string(), "Rapid SpO2 Drop");
        assert_eq!(
            AlertCondition::HypotensiveHypoxemia.to_string(),
            "Hypotensive-Hypoxemia"
        );
    }

    #[test]
    fn several_rules_fire_together() {
        let records = vec![m(1, "Systolic", 85.0), m(1, "Saturation", 91.0)];
        let fired = check(&VitalsSummary::from_records(&records));

        assert_eq!(
            fired,
            vec![
                AlertCondition::CriticalBp {
                    systolic: Some(85.0),
                    diastolic: None
                },
                AlertCondition::LowSpo2(91.0),
                AlertCondition::HypotensiveHypoxemia,
            ]
        );
    }
}
