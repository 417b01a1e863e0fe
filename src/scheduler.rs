//! Periodic, concurrent driving of generators.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::generator::{GeneratorKind, VitalGenerator};
use crate::output::{Output, Outputs};
use crate::types::PatientId;

/// Runs one task per (generator kind, patient) pair.
///
/// Each pair ticks on its own timer, so a slow tick never delays another
/// pair, and a pair's ticks never overlap.
///
/// # Example
///
/// ```rust,no_run
/// use vitals_sim::{GeneratorKind, Output, Scheduler};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let scheduler = Scheduler::builder()
///         .patients(10)
///         .output(Output::file("output"))
///         .period(GeneratorKind::Saturation, Duration::from_millis(500))
///         .seed(42)
///         .build();
///
///     let handle = scheduler.start();
///     tokio::time::sleep(Duration::from_secs(5)).await;
///     handle.shutdown().await;
/// }
/// ```
#[derive(Debug)]
pub struct Scheduler {
    patients: u32,
    kinds: Vec<GeneratorKind>,
    periods: BTreeMap<GeneratorKind, Duration>,
    seed: Option<u64>,
    outputs: Arc<Outputs>,
}

impl Scheduler {
    /// Create a builder for configuring the scheduler.
    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new()
    }

    pub fn patients(&self) -> u32 {
        self.patients
    }

    pub fn kinds(&self) -> &[GeneratorKind] {
        &self.kinds
    }

    /// Tick interval for a generator kind.
    pub fn period(&self, kind: GeneratorKind) -> Duration {
        self.periods
            .get(&kind)
            .copied()
            .unwrap_or_else(|| kind.default_period())
    }

    pub fn outputs(&self) -> &Arc<Outputs> {
        &self.outputs
    }

    /// RNG for one pair; seeded runs give every pair its own reproducible
    /// stream.
    fn rng_for(&self, kind: GeneratorKind, patient_id: PatientId) -> StdRng {
        match self.seed {
            Some(seed) => {
                let pair = (u64::from(patient_id) << 8) | kind as u64;
                StdRng::seed_from_u64(seed ^ pair.wrapping_mul(0x9E37_79B9_7F4A_7C15))
            }
            None => StdRng::from_entropy(),
        }
    }

    /// Spawn every pair task and return a handle for shutting them down.
    pub fn start(&self) -> SchedulerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut tasks = JoinSet::new();

        for patient_id in 1..=self.patients {
            for &kind in &self.kinds {
                let period = self.period(kind);
                let generator = kind.build(self.rng_for(kind, patient_id), period);
                tasks.spawn(run_pair(
                    kind,
                    patient_id,
                    generator,
                    self.outputs.clone(),
                    period,
                    stop_rx.clone(),
                ));
            }
        }

        info!(
            patients = self.patients,
            pairs = tasks.len(),
            outputs = self.outputs.len(),
            "scheduler started"
        );

        SchedulerHandle {
            stop_tx,
            tasks,
            outputs: self.outputs.clone(),
        }
    }
}

async fn run_pair(
    kind: GeneratorKind,
    patient_id: PatientId,
    mut generator: Box<dyn VitalGenerator>,
    outputs: Arc<Outputs>,
    period: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut timer = tokio::time::interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            // Stop wins over a tick that is due at the same time
            biased;

            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
            _ = timer.tick() => {
                // Outputs may do blocking file I/O, so the tick runs on the
                // blocking pool and hands the generator back afterwards.
                let sink = outputs.clone();
                let tick = tokio::task::spawn_blocking(move || {
                    let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
                        generator.generate(patient_id, &sink);
                    }));
                    (generator, result)
                })
                .await;

                match tick {
                    Ok((returned, result)) => {
                        generator = returned;
                        if result.is_err() {
                            error!(patient_id, %kind, "generator tick panicked, skipping");
                        }
                    }
                    Err(e) => {
                        error!(patient_id, %kind, error = %e, "generator tick lost, stopping");
                        break;
                    }
                }
            }
        }
    }

    debug!(patient_id, %kind, "generator stopped");
}

/// Builder for configuring a Scheduler.
#[derive(Debug)]
pub struct SchedulerBuilder {
    patients: u32,
    kinds: Option<Vec<GeneratorKind>>,
    periods: BTreeMap<GeneratorKind, Duration>,
    seed: Option<u64>,
    outputs: Vec<Output>,
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerBuilder {
    pub fn new() -> Self {
        Self {
            patients: 1,
            kinds: None,
            periods: BTreeMap::new(),
            seed: None,
            outputs: Vec::new(),
        }
    }

    /// Number of simulated patients, ids `1..=count`.
    pub fn patients(mut self, count: u32) -> Self {
        self.patients = count;
        self
    }

    /// Restrict to these generator kinds. Defaults to all kinds.
    pub fn kinds(mut self, kinds: impl IntoIterator<Item = GeneratorKind>) -> Self {
        let mut kinds: Vec<_> = kinds.into_iter().collect();
        kinds.sort();
        kinds.dedup();
        self.kinds = Some(kinds);
        self
    }

    /// Override the tick interval for one generator kind.
    pub fn period(mut self, kind: GeneratorKind, period: Duration) -> Self {
        self.periods.insert(kind, period);
        self
    }

    /// Seed every generator deterministically.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Add an output destination.
    ///
    /// Multiple outputs can be added; every data point goes to all of them.
    pub fn output(mut self, output: Output) -> Self {
        self.outputs.push(output);
        self
    }

    pub fn build(self) -> Scheduler {
        Scheduler {
            patients: self.patients,
            kinds: self.kinds.unwrap_or_else(|| GeneratorKind::ALL.to_vec()),
            periods: self.periods,
            seed: self.seed,
            outputs: Arc::new(Outputs::new(self.outputs)),
        }
    }
}

/// Handle for stopping a running scheduler.
///
/// Dropping the handle stops the pair tasks without waiting for them.
#[derive(Debug)]
pub struct SchedulerHandle {
    stop_tx: watch::Sender<bool>,
    tasks: JoinSet<()>,
    outputs: Arc<Outputs>,
}

impl SchedulerHandle {
    /// Number of pair tasks still running.
    pub fn running(&self) -> usize {
        self.tasks.len()
    }

    /// Stop issuing ticks, wait for in-flight ticks to finish, then close
    /// the outputs.
    pub async fn shutdown(mut self) {
        let _ = self.stop_tx.send(true);

        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "generator task failed");
            }
        }

        self.outputs.close();
        info!("scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataPoint;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    fn drain(rx: &mut mpsc::Receiver<DataPoint>) -> Vec<DataPoint> {
        let mut points = Vec::new();
        while let Ok(point) = rx.try_recv() {
            points.push(point);
        }
        points
    }

    #[test]
    fn builder_defaults() {
        let scheduler = Scheduler::builder().build();
        assert_eq!(scheduler.patients(), 1);
        assert_eq!(scheduler.kinds(), &GeneratorKind::ALL);
        assert_eq!(scheduler.period(GeneratorKind::Ecg), Duration::from_secs(1));
        assert_eq!(scheduler.period(GeneratorKind::BloodPressure), Duration::from_secs(60));
        assert_eq!(scheduler.period(GeneratorKind::Alert), Duration::from_secs(20));
        assert!(scheduler.outputs().is_empty());
    }

    #[test]
    fn builder_overrides() {
        let scheduler = Scheduler::builder()
            .patients(5)
            .kinds([GeneratorKind::Saturation, GeneratorKind::Ecg, GeneratorKind::Saturation])
            .period(GeneratorKind::Saturation, Duration::from_millis(250))
            .output(Output::Console)
            .output(Output::file("out"))
            .build();

        assert_eq!(scheduler.patients(), 5);
        assert_eq!(scheduler.kinds(), &[GeneratorKind::Ecg, GeneratorKind::Saturation]);
        assert_eq!(scheduler.period(GeneratorKind::Saturation), Duration::from_millis(250));
        assert_eq!(scheduler.outputs().len(), 2);
    }

    #[test]
    fn seeded_pairs_get_distinct_streams() {
        use rand::Rng;

        let scheduler = Scheduler::builder().seed(1).build();
        let a: u64 = scheduler.rng_for(GeneratorKind::Ecg, 1).gen();
        let b: u64 = scheduler.rng_for(GeneratorKind::Ecg, 2).gen();
        let c: u64 = scheduler.rng_for(GeneratorKind::Saturation, 1).gen();
        let again: u64 = scheduler.rng_for(GeneratorKind::Ecg, 1).gen();

        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, again);
    }

    #[tokio::test(start_paused = true)]
    async fn every_pair_ticks_until_shutdown() {
        let (output, mut rx) = Output::channel(1024);
        let scheduler = Scheduler::builder()
            .patients(3)
            .kinds([GeneratorKind::Saturation])
            .period(GeneratorKind::Saturation, Duration::from_millis(100))
            .seed(9)
            .output(output)
            .build();

        let handle = scheduler.start();
        assert_eq!(handle.running(), 3);

        tokio::time::sleep(Duration::from_millis(350)).await;
        handle.shutdown().await;

        let points = drain(&mut rx);
        let patients: BTreeSet<_> = points.iter().map(|p| p.patient_id).collect();
        assert_eq!(patients, BTreeSet::from([1, 2, 3]));
        for patient in 1..=3 {
            let ticks = points.iter().filter(|p| p.patient_id == patient).count();
            assert!((3..=5).contains(&ticks), "patient {patient} ticked {ticks} times");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_is_emitted_after_shutdown() {
        let (output, mut rx) = Output::channel(1024);
        let scheduler = Scheduler::builder()
            .patients(2)
            .kinds([GeneratorKind::Ecg])
            .period(GeneratorKind::Ecg, Duration::from_millis(10))
            .output(output)
            .build();

        let handle = scheduler.start();
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.shutdown().await;
        drain(&mut rx);

        // With the scheduler gone no sender is left
        drop(scheduler);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    /// Counts ticks that run after stop was requested.
    #[derive(Debug)]
    struct StopWatcher {
        stop: watch::Receiver<bool>,
        late_ticks: Arc<AtomicUsize>,
    }

    impl VitalGenerator for StopWatcher {
        fn generate(&mut self, _patient_id: PatientId, _sink: &Outputs) {
            if *self.stop.borrow() {
                self.late_ticks.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn due_tick_does_not_run_after_stop() {
        let late_ticks = Arc::new(AtomicUsize::new(0));

        for _ in 0..50 {
            let (stop_tx, stop_rx) = watch::channel(false);
            let generator = StopWatcher {
                stop: stop_rx.clone(),
                late_ticks: late_ticks.clone(),
            };
            let task = tokio::spawn(run_pair(
                GeneratorKind::Saturation,
                1,
                Box::new(generator),
                Arc::new(Outputs::default()),
                Duration::from_millis(10),
                stop_rx,
            ));

            // Land exactly on a tick boundary, then ask to stop
            tokio::time::sleep(Duration::from_millis(10)).await;
            stop_tx.send(true).unwrap();
            task.await.unwrap();
        }

        assert_eq!(late_ticks.load(Ordering::SeqCst), 0);
    }

    #[derive(Debug)]
    struct Flaky {
        ticks: u32,
    }

    impl VitalGenerator for Flaky {
        fn generate(&mut self, patient_id: PatientId, sink: &Outputs) {
            self.ticks += 1;
            if self.ticks == 2 {
                panic!("sensor fault");
            }
            sink.output(patient_id, i64::from(self.ticks), "Flaky", "1");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_tick_is_skipped() {
        let (output, mut rx) = Output::channel(64);
        let outputs = Arc::new(Outputs::new(vec![output]));
        let (stop_tx, stop_rx) = watch::channel(false);

        let task = tokio::spawn(run_pair(
            GeneratorKind::Ecg,
            1,
            Box::new(Flaky { ticks: 0 }),
            outputs,
            Duration::from_millis(10),
            stop_rx,
        ));

        tokio::time::sleep(Duration::from_millis(35)).await;
        stop_tx.send(true).unwrap();
        task.await.unwrap();

        let timestamps: Vec<_> = drain(&mut rx).into_iter().map(|p| p.timestamp).collect();
        assert_eq!(timestamps, vec![1, 3, 4]);
    }
}
