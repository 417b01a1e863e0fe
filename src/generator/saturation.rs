//! Oxygen saturation as a bounded random walk.

use rand::rngs::StdRng;
use rand::Rng;

use super::{TickClock, VitalGenerator};
use crate::output::Outputs;
use crate::types::PatientId;

const MIN_SATURATION: i32 = 90;
const MAX_SATURATION: i32 = 100;

/// Blood-oxygen saturation as a bounded random walk.
///
/// Each tick moves the previous value by -1, 0 or +1 and clamps it to
/// `[90, 100]`. The starting value is drawn from `[95, 100]`.
#[derive(Debug)]
pub struct SaturationGenerator {
    rng: StdRng,
    last: i32,
    clock: TickClock,
}

impl SaturationGenerator {
    pub fn new(mut rng: StdRng) -> Self {
        let last = rng.gen_range(95..=MAX_SATURATION);
        Self {
            rng,
            last,
            clock: TickClock::default(),
        }
    }

    /// The most recently produced value.
    pub fn current(&self) -> i32 {
        self.last
    }

    fn step(&mut self) -> i32 {
        let variation = self.rng.gen_range(-1..=1);
        self.last = (self.last + variation).clamp(MIN_SATURATION, MAX_SATURATION);
        self.last
    }
}

impl VitalGenerator for SaturationGenerator {
    fn generate(&mut self, patient_id: PatientId, sink: &Outputs) {
        let value = self.step();
        sink.output(patient_id, self.clock.now(), "Saturation", &format!("{value}%"));
    }
}
