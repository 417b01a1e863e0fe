//! Synthetic ECG trace built from P, QRS and T waves.

use std::f64::consts::PI;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::Rng;

use super::{TickClock, VitalGenerator};
use crate::output::Outputs;
use crate::types::PatientId;

/// ECG samples built from P-wave, QRS and T-wave sinusoids at the patient's
/// heart rate, plus a little noise.
#[derive(Debug)]
pub struct EcgGenerator {
    rng: StdRng,
    heart_rate: f64,
    /// Simulated seconds since the first tick.
    elapsed: f64,
    step: f64,
    clock: TickClock,
}

impl EcgGenerator {
    /// `step` is the simulated time between samples.
    pub fn new(mut rng: StdRng, step: Duration) -> Self {
        let heart_rate = rng.gen_range(60.0..80.0);
        Self {
            rng,
            heart_rate,
            elapsed: 0.0,
            step: step.as_secs_f64(),
            clock: TickClock::default(),
        }
    }

    pub fn heart_rate(&self) -> f64 {
        self.heart_rate
    }

    fn sample(&mut self) -> f64 {
        let frequency = self.heart_rate / 60.0;
        let t = self.elapsed;
        let p_wave = 0.1 * (2.0 * PI * frequency * t).sin();
        let qrs = 0.5 * (2.0 * PI * 3.0 * frequency * t).sin();
        let t_wave = 0.2 * (2.0 * PI * 2.0 * frequency * t + PI / 4.0).sin();
        let noise = self.rng.gen_range(0.0..0.05);

        self.elapsed += self.step;
        p_wave + qrs + t_wave + noise
    }
}

impl VitalGenerator for EcgGenerator {
    fn generate(&mut self, patient_id: PatientId, sink: &Outputs) {
        let value = self.sample();
        sink.output(patient_id, self.clock.now(), "ECG", &format!("{value:.4}"));
    }
}
