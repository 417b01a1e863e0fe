//! # vitals-sim
//!
//! Simulates patient vital signs, distributes them to pluggable outputs, and
//! raises de-duplicated clinical alerts from the accumulated history.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐    ┌────────────┐    ┌─────────┐    ┌─────────────┐
//! │ Scheduler │───▶│ generators │───▶│ Outputs │───▶│ MemoryStore │
//! │ (1 task   │    │ (1 per     │    │ file    │    └──────┬──────┘
//! │  per pair)│    │  patient)  │    │ socket  │           │
//! └───────────┘    └────────────┘    │ console │           ▼
//!                                    └─────────┘    ┌─────────────┐
//!                                                   │ AlertEngine │──▶ ALERT lines
//!                                                   └─────────────┘
//! ```
//!
//! - **[`generator`]**: seeded stochastic processes, one instance per
//!   (kind, patient) pair
//! - **[`scheduler`]**: drives every pair on its own timer and drains them on
//!   shutdown
//! - **[`output`]**: file, single-client socket, console, store and channel
//!   outputs behind the [`Output`] enum
//! - **[`store`]**: the [`RecordStore`] interface and an in-memory series store
//! - **[`alerts`]**: the fixed rule battery and the de-duplicating
//!   [`AlertEngine`]
//! - **[`monitor`]**: reads a simulator's socket stream into a store and
//!   evaluates alerts periodically
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use vitals_sim::{AlertEngine, GeneratorKind, MemoryStore, Output, Scheduler};
//!
//! # tokio_test::block_on(async {
//! let store = Arc::new(MemoryStore::new());
//! let scheduler = Scheduler::builder()
//!     .patients(2)
//!     .kinds([GeneratorKind::Saturation])
//!     .period(GeneratorKind::Saturation, Duration::from_millis(10))
//!     .seed(1)
//!     .output(Output::store(store.clone()))
//!     .build();
//!
//! let handle = scheduler.start();
//! tokio::time::sleep(Duration::from_millis(50)).await;
//! handle.shutdown().await;
//!
//! let mut engine = AlertEngine::new(store.clone());
//! engine.evaluate_all();
//! assert!(!store.is_empty());
//! # });
//! ```

pub mod alerts;
pub mod config;
pub mod error;
pub mod generator;
pub mod monitor;
pub mod output;
pub mod scheduler;
pub mod store;
pub mod types;

pub use alerts::{Alert, AlertCondition, AlertEngine};
pub use config::Settings;
pub use error::{ParseError, SinkError};
pub use generator::{GeneratorKind, VitalGenerator};
pub use output::{Output, OutputSpec, Outputs};
pub use scheduler::{Scheduler, SchedulerBuilder, SchedulerHandle};
pub use store::{MemoryStore, RecordStore};
pub use types::{DataPoint, Measurement, PatientId, SignalKind};
