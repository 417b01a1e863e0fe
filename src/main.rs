//! vitals-sim command-line entry point.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vitals_sim::monitor::{spawn_evaluator, spawn_ingest};
use vitals_sim::{Alert, AlertEngine, MemoryStore, OutputSpec, Scheduler, Settings};

#[derive(Parser, Debug)]
#[command(name = "vitals-sim")]
#[command(about = "Patient vital-sign simulator and alert monitor")]
struct Cli {
    /// Settings file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Generate vitals and send them to the configured outputs (default)
    Simulate(SimulateArgs),

    /// Read a running simulator's socket stream and raise alerts
    Monitor(MonitorArgs),
}

#[derive(clap::Args, Debug, Default)]
struct SimulateArgs {
    /// Number of patients to simulate
    #[arg(short, long)]
    patients: Option<u32>,

    /// Output destination: console, store, file:<dir> or tcp:<port> (repeatable)
    #[arg(short, long = "output")]
    outputs: Vec<OutputSpec>,

    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Seconds between alert sweeps when a store output is configured
    #[arg(long)]
    evaluate_every: Option<u64>,
}

#[derive(clap::Args, Debug)]
struct MonitorArgs {
    /// Simulator socket to connect to (host:port)
    #[arg(long)]
    connect: Option<String>,

    /// Seconds between alert sweeps
    #[arg(long)]
    evaluate_every: Option<u64>,

    /// Write the collected alerts to this JSON file on exit
    #[arg(short, long)]
    export: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "vitals_sim=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut settings =
        Settings::load(cli.config.as_deref()).context("failed to load settings")?;

    match cli.mode.unwrap_or(Mode::Simulate(SimulateArgs::default())) {
        Mode::Simulate(args) => {
            if let Some(patients) = args.patients {
                settings.patients = patients;
            }
            if !args.outputs.is_empty() {
                settings.outputs = args.outputs;
            }
            if args.seed.is_some() {
                settings.seed = args.seed;
            }
            if let Some(secs) = args.evaluate_every {
                settings.evaluate_every_secs = secs;
            }
            run_simulator(settings).await
        }
        Mode::Monitor(args) => {
            if let Some(addr) = args.connect {
                settings.connect = addr;
            }
            if let Some(secs) = args.evaluate_every {
                settings.evaluate_every_secs = secs;
            }
            run_monitor(settings, args.export.as_deref()).await
        }
    }
}

/// Run the generators until Ctrl-C, then drain and close the outputs.
async fn run_simulator(settings: Settings) -> Result<()> {
    let store = Arc::new(MemoryStore::new());

    let mut builder = Scheduler::builder()
        .patients(settings.patients)
        .kinds(settings.generators.iter().copied());
    for &kind in &settings.generators {
        builder = builder.period(kind, settings.period(kind));
    }
    if let Some(seed) = settings.seed {
        builder = builder.seed(seed);
    }
    for spec in &settings.outputs {
        let output = spec
            .build(&store)
            .await
            .with_context(|| format!("failed to set up output {spec}"))?;
        builder = builder.output(output);
    }

    let scheduler = builder.build();
    let handle = scheduler.start();

    // Alerts can only be evaluated when something is feeding the store
    let (stop_tx, stop_rx) = watch::channel(false);
    let evaluator = settings.has_store_output().then(|| {
        spawn_evaluator(AlertEngine::new(store.clone()), settings.evaluate_every(), stop_rx)
    });

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("shutting down");

    handle.shutdown().await;
    let _ = stop_tx.send(true);
    if let Some(evaluator) = evaluator {
        let engine = evaluator.await?;
        info!(alerts = engine.alerts().len(), stored = store.len(), "alert engine stopped");
    }

    Ok(())
}

/// Ingest a simulator's socket stream until it closes or Ctrl-C.
async fn run_monitor(settings: Settings, export: Option<&Path>) -> Result<()> {
    info!(addr = %settings.connect, "connecting to simulator");
    let stream = TcpStream::connect(&settings.connect)
        .await
        .with_context(|| format!("failed to connect to {}", settings.connect))?;
    info!("connected");

    let store = Arc::new(MemoryStore::new());
    let mut ingest = spawn_ingest(stream, store.clone());

    let (stop_tx, stop_rx) = watch::channel(false);
    let evaluator = spawn_evaluator(AlertEngine::new(store.clone()), settings.evaluate_every(), stop_rx);

    let interrupted = tokio::select! {
        _ = tokio::signal::ctrl_c() => true,
        stats = &mut ingest => {
            let stats = stats?;
            info!(stored = stats.stored, skipped = stats.skipped, "simulator stream ended");
            false
        }
    };
    if interrupted {
        info!("interrupted");
        ingest.abort();
    }

    let _ = stop_tx.send(true);
    let mut engine = evaluator.await?;
    // Pick up anything that arrived after the last sweep
    engine.evaluate_all();
    info!(alerts = engine.alerts().len(), "monitor stopped");

    if let Some(path) = export {
        export_alerts(engine.alerts(), path)?;
    }
    Ok(())
}

fn export_alerts(alerts: &[Alert], path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(alerts)?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), count = alerts.len(), "exported alerts");
    Ok(())
}
