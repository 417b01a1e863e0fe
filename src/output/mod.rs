//! Output backends for emitted data points.
//!
//! Every generator tick hands its data points to an [`Outputs`] set, which
//! forwards each one to every configured [`Output`]. Outputs are shared by all
//! generator tasks, so every variant is safe to call concurrently and none of
//! them wait on a network peer.

mod file;
mod socket;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::SinkError;
use crate::store::{MemoryStore, RecordStore};
use crate::types::{DataPoint, PatientId};

pub use file::FileSink;
pub use socket::SocketSink;

/// Output destination for data points.
#[derive(Debug)]
pub enum Output {
    /// Print each point to stdout in the file line format.
    Console,

    /// Append each point to `<base>/<label>.txt`.
    File(FileSink),

    /// Stream each point to the first client of a listening TCP socket.
    Socket(SocketSink),

    /// Append numeric points to an in-memory store.
    Store(Arc<MemoryStore>),

    /// Send points through a channel.
    ///
    /// Use `Output::channel()` to create this variant and get the receiver.
    Channel(mpsc::Sender<DataPoint>),
}

impl Output {
    /// Create a file output rooted at `base_dir`.
    ///
    /// The directory is created on first write, not here.
    pub fn file(base_dir: impl Into<PathBuf>) -> Self {
        Output::File(FileSink::new(base_dir))
    }

    /// Create a socket output listening on `0.0.0.0:<port>`.
    pub async fn socket(port: u16) -> Result<Self, SinkError> {
        Ok(Output::Socket(SocketSink::listen(port).await?))
    }

    /// Create a store output.
    pub fn store(store: Arc<MemoryStore>) -> Self {
        Output::Store(store)
    }

    /// Create a channel output and return both the output and receiver.
    ///
    /// # Example
    ///
    /// ```rust
    /// use vitals_sim::Output;
    ///
    /// let (output, mut rx) = Output::channel(16);
    /// output.output(1, 0, "Saturation", "97%").unwrap();
    /// assert_eq!(rx.try_recv().unwrap().data, "97%");
    /// ```
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<DataPoint>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Output::Channel(tx), rx)
    }

    /// Accept one data point.
    pub fn output(
        &self,
        patient_id: PatientId,
        timestamp: i64,
        label: &str,
        data: &str,
    ) -> Result<(), SinkError> {
        self.emit(&DataPoint::new(patient_id, timestamp, label, data))
    }

    /// Emit a data point to this output.
    pub fn emit(&self, point: &DataPoint) -> Result<(), SinkError> {
        match self {
            Output::Console => {
                println!("{point}");
            }
            Output::File(sink) => sink.write(point)?,
            Output::Socket(sink) => sink.send(point),
            Output::Store(store) => {
                let value = point.numeric_value().ok_or_else(|| SinkError::NotNumeric {
                    label: point.label.clone(),
                    data: point.data.clone(),
                })?;
                store.append(point.patient_id, value, &point.label, point.timestamp);
            }
            Output::Channel(tx) => {
                // Best effort send (don't block if channel is full)
                let _ = tx.try_send(point.clone());
            }
        }
        Ok(())
    }

    /// Release resources held by this output.
    ///
    /// Only the socket holds any: a listener still waiting for its client is
    /// closed.
    pub fn close(&self) {
        if let Output::Socket(sink) = self {
            sink.close();
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Output::Console => "console",
            Output::File(_) => "file",
            Output::Socket(_) => "socket",
            Output::Store(_) => "store",
            Output::Channel(_) => "channel",
        }
    }
}

/// The set of outputs every generator tick is dispatched to.
#[derive(Debug, Default)]
pub struct Outputs {
    outputs: Vec<Output>,
}

impl Outputs {
    pub fn new(outputs: Vec<Output>) -> Self {
        Self { outputs }
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Forward one data point to every output.
    ///
    /// A failing output is logged and skipped; the remaining outputs still
    /// receive the point.
    pub fn output(&self, patient_id: PatientId, timestamp: i64, label: &str, data: &str) {
        let point = DataPoint::new(patient_id, timestamp, label, data);
        for output in &self.outputs {
            if let Err(error) = output.emit(&point) {
                warn!(
                    output = output.name(),
                    patient_id,
                    label,
                    %error,
                    "output failed, data point skipped"
                );
            }
        }
    }

    /// Close every output.
    pub fn close(&self) {
        for output in &self.outputs {
            output.close();
        }
    }
}

/// Textual output specification, as given on the command line or in the
/// settings file: `console`, `store`, `file:<dir>` or `tcp:<port>`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum OutputSpec {
    Console,
    Store,
    File(PathBuf),
    Tcp(u16),
}

impl OutputSpec {
    /// Build the output this spec describes.
    ///
    /// `store` outputs all append to the given shared store.
    pub async fn build(&self, store: &Arc<MemoryStore>) -> Result<Output, SinkError> {
        Ok(match self {
            OutputSpec::Console => Output::Console,
            OutputSpec::Store => Output::store(store.clone()),
            OutputSpec::File(dir) => Output::file(dir.clone()),
            OutputSpec::Tcp(port) => Output::socket(*port).await?,
        })
    }
}

impl FromStr for OutputSpec {
    type Err = SinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "console" => return Ok(OutputSpec::Console),
            "store" => return Ok(OutputSpec::Store),
            _ => {}
        }

        match s.split_once(':') {
            Some(("file", dir)) if !dir.is_empty() => Ok(OutputSpec::File(PathBuf::from(dir))),
            Some(("tcp", port)) => port
                .parse()
                .map(OutputSpec::Tcp)
                .map_err(|_| SinkError::InvalidSpec(s.to_string())),
            _ => Err(SinkError::InvalidSpec(s.to_string())),
        }
    }
}

impl TryFrom<String> for OutputSpec {
    type Error = SinkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for OutputSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputSpec::Console => write!(f, "console"),
            OutputSpec::Store => write!(f, "store"),
            OutputSpec::File(dir) => write!(f, "file:{}", dir.display()),
            OutputSpec::Tcp(port) => write!(f, "tcp:{port}"),
        }
    }
}
