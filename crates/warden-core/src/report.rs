//! Append-only report output.
//!
//! Every batch appends one rendered summary followed by a blank line. The
//! file is never truncated.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{CoreError, Result};

/// Default location of the report file, relative to the working directory.
pub const DEFAULT_REPORT_PATH: &str = "logs/report.txt";

/// Append-only text file receiving one report block per batch.
///
/// Appends are serialised through an internal lock and issued as a single
/// write, so blocks from concurrent callers never interleave.
#[derive(Debug)]
pub struct ReportSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ReportSink {
    /// Creates a sink writing to `path`. Nothing is touched until the first append.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the report file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends a report block and its blank-line separator.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::ReportSink` if the file cannot be opened or written.
    pub fn append(&self, report: &str) -> Result<()> {
        let block = format!("{report}\n\n");
        let _guard = self.write_lock.lock();

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.io_error(source))?;
        file.write_all(block.as_bytes())
            .map_err(|source| self.io_error(source))?;

        debug!(path = %self.path.display(), bytes = block.len(), "report appended");
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> CoreError {
        CoreError::ReportSink {
            path: self.path.clone(),
            source,
        }
    }
}

impl Default for ReportSink {
    fn default() -> Self {
        Self::new(DEFAULT_REPORT_PATH)
    }
}
