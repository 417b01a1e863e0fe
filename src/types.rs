//! Core data types shared by generators, outputs, the store and the alert engine.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// 1-based patient identifier.
pub type PatientId = u32;

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// A stored reading: one numeric value for one patient at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub patient_id: PatientId,
    pub timestamp: i64,
    pub label: String,
    pub value: f64,
}

impl Measurement {
    pub fn new(patient_id: PatientId, timestamp: i64, label: impl Into<String>, value: f64) -> Self {
        Self {
            patient_id,
            timestamp,
            label: label.into(),
            value,
        }
    }

    /// Classify this reading's label.
    pub fn kind(&self) -> SignalKind {
        SignalKind::classify(&self.label)
    }
}

/// A single emitted data point, as handed from a generator to the outputs.
///
/// `data` is the textual value exactly as it is written to files and sockets
/// (`"97%"`, `"triggered"`, `"-0.1532"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPoint {
    pub patient_id: PatientId,
    pub timestamp: i64,
    pub label: String,
    pub data: String,
}

impl DataPoint {
    pub fn new(
        patient_id: PatientId,
        timestamp: i64,
        label: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        Self {
            patient_id,
            timestamp,
            label: label.into(),
            data: data.into(),
        }
    }

    /// Render as a socket wire line, without the trailing newline.
    pub fn to_wire_line(&self) -> String {
        format!(
            "{},{},{},{}",
            self.patient_id, self.timestamp, self.label, self.data
        )
    }

    /// Parse a socket wire line (`<patient_id>,<timestamp>,<label>,<data>`).
    ///
    /// The data field is everything after the third comma, so values that
    /// themselves contain commas survive.
    pub fn parse_wire_line(line: &str) -> Result<Self, ParseError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut fields = line.splitn(4, ',');

        let (Some(id), Some(ts), Some(label), Some(data)) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(ParseError::FieldCount(line.to_string()));
        };

        let patient_id = id
            .trim()
            .parse()
            .map_err(|_| ParseError::PatientId(id.to_string()))?;
        let timestamp = ts
            .trim()
            .parse()
            .map_err(|_| ParseError::Timestamp(ts.to_string()))?;

        Ok(Self::new(patient_id, timestamp, label, data))
    }

    /// Numeric value of `data`, if it has one.
    ///
    /// A trailing `%` is ignored; alert states map to `1.0` (triggered) and
    /// `0.0` (resolved).
    pub fn numeric_value(&self) -> Option<f64> {
        let data = self.data.trim();
        match data {
            "triggered" => Some(1.0),
            "resolved" => Some(0.0),
            _ => data.trim_end_matches('%').trim().parse().ok(),
        }
    }

    /// Convert into a stored measurement, if the data is numeric.
    pub fn to_measurement(&self) -> Option<Measurement> {
        self.numeric_value()
            .map(|value| Measurement::new(self.patient_id, self.timestamp, &*self.label, value))
    }
}

impl fmt::Display for DataPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Patient ID: {}, Timestamp: {}, Label: {}, Data: {}",
            self.patient_id, self.timestamp, self.label, self.data
        )
    }
}

/// Semantic kind of a reading, derived from its free-form label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Systolic,
    Diastolic,
    Spo2,
    Other,
}

impl SignalKind {
    /// Lenient, case-insensitive substring classification.
    ///
    /// `"SystolicPressure"` and `"systolic"` are both systolic; anything
    /// mentioning `spo` or `saturation` counts as SpO2.
    pub fn classify(label: &str) -> Self {
        let label = label.to_lowercase();
        if label.contains("systolic") {
            SignalKind::Systolic
        } else if label.contains("diastolic") {
            SignalKind::Diastolic
        } else if label.contains("spo") || label.contains("saturation") {
            SignalKind::Spo2
        } else {
            SignalKind::Other
        }
    }
}
