//! Store-side process mode: ingest a simulator's socket stream and evaluate
//! alerts on a timer.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::alerts::AlertEngine;
use crate::store::RecordStore;
use crate::types::DataPoint;

/// Counters for one ingest run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    /// Lines appended to the store.
    pub stored: u64,
    /// Lines that did not parse or carried no numeric value.
    pub skipped: u64,
}

/// Read newline-delimited wire lines from `reader` into `store` until EOF or
/// a read error.
///
/// A line that cannot be stored is counted as skipped and reading carries on.
pub async fn ingest<R, S>(reader: R, store: &S) -> IngestStats
where
    R: AsyncRead + Unpin,
    S: RecordStore + ?Sized,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut stats = IngestStats::default();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                info!(stored = stats.stored, skipped = stats.skipped, "stream closed");
                break;
            }
            Ok(_) => {
                let Ok(line) = std::str::from_utf8(&buf) else {
                    warn!(len = buf.len(), "non-UTF-8 line skipped");
                    stats.skipped += 1;
                    continue;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match DataPoint::parse_wire_line(line) {
                    Ok(point) => match point.to_measurement() {
                        Some(m) => {
                            store.append(m.patient_id, m.value, &m.label, m.timestamp);
                            stats.stored += 1;
                        }
                        None => {
                            debug!(label = %point.label, data = %point.data, "non-numeric data skipped");
                            stats.skipped += 1;
                        }
                    },
                    Err(e) => {
                        warn!(error = %e, "unparseable line skipped");
                        stats.skipped += 1;
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "read error, stopping ingest");
                break;
            }
        }
    }

    stats
}

/// Spawn [`ingest`] as a background task.
pub fn spawn_ingest<R, S>(reader: R, store: Arc<S>) -> JoinHandle<IngestStats>
where
    R: AsyncRead + Unpin + Send + 'static,
    S: RecordStore + ?Sized + 'static,
{
    tokio::spawn(async move { ingest(reader, store.as_ref()).await })
}

/// Run `engine.evaluate_all()` every `interval` until `stop` is set.
///
/// Returns the engine so the caller can inspect or export its alerts.
pub fn spawn_evaluator<S>(
    mut engine: AlertEngine<S>,
    interval: Duration,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<AlertEngine<S>>
where
    S: RecordStore + ?Sized + 'static,
{
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = timer.tick() => {
                    let raised = engine.evaluate_all();
                    if !raised.is_empty() {
                        debug!(count = raised.len(), "new alerts");
                    }
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }
        engine
    })
}
