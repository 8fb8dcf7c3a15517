//! Error types for the core crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while producing or persisting batch reports.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The report sink could not be opened or written.
    #[error("report sink {}: {source}", path.display())]
    ReportSink {
        /// Path of the report file.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A severity level name was not recognised.
    #[error("unknown severity level: {0}")]
    UnknownLevel(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
