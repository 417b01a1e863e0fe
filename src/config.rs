//! Layered settings: built-in defaults, an optional TOML file, then
//! `VITALS_*` environment variables. Command-line flags are applied on top by
//! the binary.
//!
//! ```toml
//! patients = 20
//! seed = 7
//! outputs = ["file:./output", "tcp:8080", "store"]
//! generators = ["saturation", "blood_pressure", "alert"]
//! evaluate_every_secs = 5
//!
//! [periods_ms]
//! saturation = 500
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::generator::GeneratorKind;
use crate::output::OutputSpec;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Number of simulated patients.
    pub patients: u32,
    /// Base seed for reproducible runs; random when absent.
    pub seed: Option<u64>,
    pub outputs: Vec<OutputSpec>,
    /// Generator kinds to run.
    pub generators: Vec<GeneratorKind>,
    /// Per-kind tick interval overrides, in milliseconds.
    pub periods_ms: BTreeMap<GeneratorKind, u64>,
    /// How often the alert engine sweeps the store.
    pub evaluate_every_secs: u64,
    /// Simulator socket the monitor connects to.
    pub connect: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            patients: 50,
            seed: None,
            outputs: vec![OutputSpec::Console],
            generators: GeneratorKind::ALL.to_vec(),
            periods_ms: BTreeMap::new(),
            evaluate_every_secs: 5,
            connect: "127.0.0.1:8080".to_string(),
        }
    }
}

impl Settings {
    /// Load settings, reading `path` if given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        builder
            .add_source(
                Environment::with_prefix("VITALS")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("outputs")
                    .with_list_parse_key("generators"),
            )
            .build()?
            .try_deserialize()
    }

    /// Tick interval for a generator kind.
    pub fn period(&self, kind: GeneratorKind) -> Duration {
        self.periods_ms
            .get(&kind)
            .map(|&ms| Duration::from_millis(ms))
            .unwrap_or_else(|| kind.default_period())
    }

    pub fn evaluate_every(&self) -> Duration {
        Duration::from_secs(self.evaluate_every_secs.max(1))
    }

    /// Whether any output feeds the in-memory store.
    pub fn has_store_output(&self) -> bool {
        self.outputs.contains(&OutputSpec::Store)
    }
}
