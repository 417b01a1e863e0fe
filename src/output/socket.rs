//! Single-client TCP streaming output.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::SinkError;
use crate::types::DataPoint;

/// Lines queued for the client before new ones are dropped.
const CLIENT_QUEUE: usize = 4096;

/// Streams newline-delimited `<patient_id>,<timestamp>,<label>,<data>` lines
/// to a single TCP client.
///
/// The listener accepts exactly one connection in a background task. Points
/// sent before that client arrives are dropped. Once the client disconnects
/// nothing more is delivered and no new client is accepted.
#[derive(Debug)]
pub struct SocketSink {
    local_addr: SocketAddr,
    client: Arc<OnceLock<mpsc::Sender<String>>>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl SocketSink {
    /// Listen on all interfaces at `port`.
    pub async fn listen(port: u16) -> Result<Self, SinkError> {
        Self::bind(&format!("0.0.0.0:{port}")).await
    }

    /// Bind the listener and start waiting for a client without blocking.
    pub async fn bind(addr: &str) -> Result<Self, SinkError> {
        let bind_err = |source| SinkError::Bind {
            addr: addr.to_string(),
            source,
        };
        let listener = TcpListener::bind(addr).await.map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;
        info!(%local_addr, "socket output listening");

        let client = Arc::new(OnceLock::new());
        let accept_task = tokio::spawn(accept_one(listener, client.clone()));

        Ok(Self {
            local_addr,
            client,
            accept_task: Mutex::new(Some(accept_task)),
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Whether a client has connected and is still being served.
    pub fn is_connected(&self) -> bool {
        self.client.get().is_some_and(|tx| !tx.is_closed())
    }

    /// Queue one line for the client. Never blocks.
    pub fn send(&self, point: &DataPoint) {
        let Some(tx) = self.client.get() else {
            return;
        };

        let mut line = point.to_wire_line();
        line.push('\n');
        match tx.try_send(line) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    patient_id = point.patient_id,
                    label = %point.label,
                    "socket client is not keeping up, line dropped"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("socket client gone, line dropped");
            }
        }
    }

    /// Stop listening if the client has not connected yet.
    pub fn close(&self) {
        if let Some(task) = self.accept_task.lock().take() {
            task.abort();
        }
    }
}

impl Drop for SocketSink {
    fn drop(&mut self) {
        self.close();
    }
}

async fn accept_one(listener: TcpListener, client: Arc<OnceLock<mpsc::Sender<String>>>) {
    match listener.accept().await {
        Ok((stream, peer)) => {
            info!(%peer, "socket client connected");
            let (tx, rx) = mpsc::channel(CLIENT_QUEUE);
            tokio::spawn(write_lines(stream, rx));
            let _ = client.set(tx);
        }
        Err(e) => {
            error!(error = %e, "failed to accept socket client");
        }
    }
    // The listener drops here; later connection attempts are refused.
}

async fn write_lines(mut stream: TcpStream, mut rx: mpsc::Receiver<String>) {
    while let Some(line) = rx.recv().await {
        if let Err(e) = stream.write_all(line.as_bytes()).await {
            warn!(error = %e, "socket client write failed, closing");
            break;
        }
    }
    let _ = stream.shutdown().await;
}
