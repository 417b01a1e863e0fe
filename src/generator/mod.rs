//! Synthetic vital-sign generators.
//!
//! A generator instance belongs to exactly one patient and is advanced only by
//! that patient's scheduler task, so its state needs no locking. Randomness is
//! injected at construction; seeding the RNG makes a generator reproducible.

mod alert;
mod blood_pressure;
mod ecg;
mod saturation;

use std::fmt;
use std::time::Duration;

use rand::rngs::StdRng;
use serde::Deserialize;

use crate::output::Outputs;
use crate::types::{now_millis, PatientId};

pub use alert::{AlertStateGenerator, RESOLUTION_PROBABILITY, TRIGGER_RATE};
pub use blood_pressure::BloodPressureGenerator;
pub use ecg::EcgGenerator;
pub use saturation::SaturationGenerator;

/// A stateful stochastic process producing data points for one patient.
pub trait VitalGenerator: Send + fmt::Debug {
    /// Advance by exactly one tick and forward the resulting data point(s)
    /// to `sink`.
    ///
    /// Output failures are handled by `sink`; a tick never fails.
    fn generate(&mut self, patient_id: PatientId, sink: &Outputs);
}

/// The fixed set of generator kinds the scheduler knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorKind {
    Ecg,
    Saturation,
    BloodPressure,
    Alert,
}

impl GeneratorKind {
    pub const ALL: [GeneratorKind; 4] = [
        GeneratorKind::Ecg,
        GeneratorKind::Saturation,
        GeneratorKind::BloodPressure,
        GeneratorKind::Alert,
    ];

    pub fn name(self) -> &'static str {
        match self {
            GeneratorKind::Ecg => "ecg",
            GeneratorKind::Saturation => "saturation",
            GeneratorKind::BloodPressure => "blood_pressure",
            GeneratorKind::Alert => "alert",
        }
    }

    /// How often this kind ticks unless overridden.
    pub fn default_period(self) -> Duration {
        match self {
            GeneratorKind::Ecg => Duration::from_secs(1),
            GeneratorKind::Saturation => Duration::from_secs(1),
            GeneratorKind::BloodPressure => Duration::from_secs(60),
            GeneratorKind::Alert => Duration::from_secs(20),
        }
    }

    /// Construct a generator of this kind for one patient.
    ///
    /// `period` is the tick interval the generator will be driven at.
    pub fn build(self, rng: StdRng, period: Duration) -> Box<dyn VitalGenerator> {
        match self {
            GeneratorKind::Ecg => Box::new(EcgGenerator::new(rng, period)),
            GeneratorKind::Saturation => Box::new(SaturationGenerator::new(rng)),
            GeneratorKind::BloodPressure => Box::new(BloodPressureGenerator::new(rng)),
            GeneratorKind::Alert => Box::new(AlertStateGenerator::new(rng)),
        }
    }
}

impl fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Wall clock that never runs backwards for a single generator.
#[derive(Debug, Default)]
pub(crate) struct TickClock {
    last: i64,
}

impl TickClock {
    pub(crate) fn now(&mut self) -> i64 {
        self.last = now_millis().max(self.last);
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Output;
    use rand::SeedableRng;

    #[test]
    fn kinds_display_by_name() {
        assert_eq!(GeneratorKind::BloodPressure.to_string(), "blood_pressure");
        assert_eq!(GeneratorKind::Ecg.to_string(), "ecg");
    }

    #[test]
    fn tick_clock_is_monotonic() {
        let mut clock = TickClock { last: i64::MAX - 1 };
        assert_eq!(clock.now(), i64::MAX - 1);

        let mut clock = TickClock::default();
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }

    #[test]
    fn every_kind_builds_and_ticks() {
        let (output, mut rx) = Output::channel(64);
        let outputs = Outputs::new(vec![output]);

        for kind in [GeneratorKind::Ecg, GeneratorKind::Saturation, GeneratorKind::BloodPressure] {
            let mut generator = kind.build(StdRng::seed_from_u64(7), kind.default_period());
            generator.generate(4, &outputs);
            let point = rx.try_recv().unwrap();
            assert_eq!(point.patient_id, 4);
        }
    }
}
