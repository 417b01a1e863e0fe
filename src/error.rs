//! Error types for outputs and wire parsing.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by an output sink.
///
/// None of these are fatal to the simulation; the dispatcher logs them and
/// moves on to the next output.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The base directory for file output could not be created.
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Appending a line to an output file failed.
    #[error("failed to write to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The data point has no numeric value to store.
    #[error("non-numeric data {data:?} for label {label}")]
    NotNumeric { label: String, data: String },

    /// An output specification string was not understood.
    #[error("invalid output spec {0:?} (expected console, store, file:<dir> or tcp:<port>)")]
    InvalidSpec(String),
}

/// Errors raised while parsing a socket wire line.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("expected 4 comma-separated fields: {0:?}")]
    FieldCount(String),

    #[error("invalid patient id: {0:?}")]
    PatientId(String),

    #[error("invalid timestamp: {0:?}")]
    Timestamp(String),
}
