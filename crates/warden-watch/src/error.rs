//! Error types for the warden-watch crate.

use std::path::PathBuf;

use thiserror::Error;
use warden_core::CoreError;

/// Errors raised while watching a directory or processing a change event.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The monitored directory could not be created or is not a directory.
    #[error("cannot prepare directory {}: {source}", path.display())]
    Bootstrap {
        /// Directory path.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The filesystem subscription could not be established.
    #[error("cannot watch {}: {source}", path.display())]
    Subscribe {
        /// Directory path.
        path: PathBuf,
        /// Underlying notify failure.
        #[source]
        source: notify::Error,
    },

    /// A log file could not be opened or read.
    #[error("cannot read {}: {source}", path.display())]
    FileAccess {
        /// File path.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Newly appended content is not valid UTF-8.
    #[error("undecodable content in {} at byte {offset}", path.display())]
    Decode {
        /// File path.
        path: PathBuf,
        /// Offset where the undecodable chunk starts.
        offset: u64,
    },

    /// The batch report could not be written.
    #[error(transparent)]
    Report(#[from] CoreError),
}

impl WatchError {
    /// Returns true for startup errors that should stop the process.
    ///
    /// Per-event errors only drop the event that caused them.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Bootstrap { .. } | Self::Subscribe { .. })
    }

    pub(crate) fn file_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileAccess {
            path: path.into(),
            source,
        }
    }
}

/// Result type for watch operations.
pub type Result<T> = std::result::Result<T, WatchError>;
