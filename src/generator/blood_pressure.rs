//! Blood pressure generator.

use rand::rngs::StdRng;
use rand::Rng;

use super::{TickClock, VitalGenerator};
use crate::output::Outputs;
use crate::types::PatientId;

/// Systolic and diastolic pressure around a per-patient baseline.
#[derive(Debug)]
pub struct BloodPressureGenerator {
    rng: StdRng,
    baseline_systolic: i32,
    baseline_diastolic: i32,
    clock: TickClock,
}

impl BloodPressureGenerator {
    pub fn new(mut rng: StdRng) -> Self {
        let baseline_systolic = rng.gen_range(110..=130);
        let baseline_diastolic = rng.gen_range(70..=85);
        Self {
            rng,
            baseline_systolic,
            baseline_diastolic,
            clock: TickClock::default(),
        }
    }

    fn step(&mut self) -> (i32, i32) {
        let systolic = (self.baseline_systolic + self.rng.gen_range(-5..=5)).clamp(90, 180);
        let diastolic = (self.baseline_diastolic + self.rng.gen_range(-5..=5)).clamp(60, 120);
        (systolic, diastolic)
    }
}

impl VitalGenerator for BloodPressureGenerator {
    fn generate(&mut self, patient_id: PatientId, sink: &Outputs) {
        let (systolic, diastolic) = self.step();
        let now = self.clock.now();
        sink.output(patient_id, now, "SystolicPressure", &systolic.to_string());
        sink.output(patient_id, now, "DiastolicPressure", &diastolic.to_string());
    }
}
