//! Two-state alert button: triggered at a Poisson rate, resolved by chance.

use rand::rngs::StdRng;
use rand::Rng;

use super::{TickClock, VitalGenerator};
use crate::output::Outputs;
use crate::types::PatientId;

/// Mean number of new alert conditions per tick (Poisson rate).
pub const TRIGGER_RATE: f64 = 0.1;

/// Chance per tick that a pressed alert is resolved.
pub const RESOLUTION_PROBABILITY: f64 = 0.9;

/// Patient call-button state as a two-state Markov chain.
///
/// From resolved, the button is pressed with probability `1 - e^-λ` (at least
/// one Poisson arrival in the tick). From pressed, it is resolved with
/// probability 0.9. Only transitions produce output.
#[derive(Debug)]
pub struct AlertStateGenerator {
    rng: StdRng,
    pressed: bool,
    clock: TickClock,
}

impl AlertStateGenerator {
    pub fn new(rng: StdRng) -> Self {
        Self {
            rng,
            pressed: false,
            clock: TickClock::default(),
        }
    }

    /// Probability of leaving the resolved state in one tick.
    pub fn trigger_probability() -> f64 {
        -(-TRIGGER_RATE).exp_m1()
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    /// Advance the chain; returns the emitted state on a transition.
    fn step(&mut self) -> Option<&'static str> {
        if self.pressed {
            if self.rng.gen_bool(RESOLUTION_PROBABILITY) {
                self.pressed = false;
                return Some("resolved");
            }
        } else if self.rng.gen_bool(Self::trigger_probability()) {
            self.pressed = true;
            return Some("triggered");
        }
        None
    }
}

impl VitalGenerator for AlertStateGenerator {
    fn generate(&mut self, patient_id: PatientId, sink: &Outputs) {
        if let Some(state) = self.step() {
            sink.output(patient_id, self.clock.now(), "Alert", state);
        }
    }
}
