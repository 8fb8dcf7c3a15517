//! Process-wide diagnostic log.
//!
//! Two sinks:
//!
//! - a size-rotated file, `<dir>/system.log`, receiving DEBUG and above from
//!   the warden crates in the `YYYY-MM-DD HH:MM:SS,mmm - LEVEL - message`
//!   layout;
//! - stderr, filtered by `RUST_LOG` (default `info`).
//!
//! [`DiagnosticLog::init`] installs both once per process. Later calls
//! return the same handle and never add sinks.
//!
//! The file sink rolls by size into numbered backups (`system.log.1` up to
//! `system.log.5`). `tracing-appender` only rolls on a time schedule, so
//! [`RotatingFileWriter`] does the size check and renaming itself.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{Event, Level, Subscriber, debug};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;

use crate::error::LoggingError;

/// File name of the diagnostic log.
pub const SYSTEM_LOG_FILE: &str = "system.log";

/// Size at which the log is rotated.
pub const DEFAULT_MAX_BYTES: u64 = 1024 * 1024;

/// Number of rotated files kept.
pub const DEFAULT_MAX_BACKUPS: usize = 5;

/// Crates whose DEBUG records reach the file sink.
const WARDEN_TARGETS: [&str; 4] = ["warden_core", "warden_alerts", "warden_watch", "wardend"];

static DIAGNOSTIC_LOG: OnceCell<DiagnosticLog> = OnceCell::new();

#[derive(Debug)]
struct RotatingFile {
    path: PathBuf,
    file: Option<File>,
    size: u64,
    max_bytes: u64,
    max_backups: usize,
}

impl RotatingFile {
    fn open_file(&mut self) -> io::Result<&mut File> {
        if self.file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            self.size = file.metadata()?.len();
            self.file = Some(file);
        }
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("log file not open"))
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(format!(".{index}"));
        PathBuf::from(name)
    }

    /// Shifts `system.log.N` to `.N+1`, dropping the oldest, and starts a
    /// fresh file.
    fn rotate(&mut self) -> io::Result<()> {
        self.file = None;

        if self.max_backups == 0 {
            File::create(&self.path)?;
        } else {
            let oldest = self.backup_path(self.max_backups);
            if oldest.exists() {
                fs::remove_file(&oldest)?;
            }
            for index in (1..self.max_backups).rev() {
                let from = self.backup_path(index);
                if from.exists() {
                    fs::rename(&from, self.backup_path(index + 1))?;
                }
            }
            fs::rename(&self.path, self.backup_path(1))?;
        }

        self.size = 0;
        Ok(())
    }

    fn write_record(&mut self, buf: &[u8]) -> io::Result<()> {
        self.open_file()?;
        if self.size > 0 && self.size + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        let file = self.open_file()?;
        file.write_all(buf)?;
        self.size += buf.len() as u64;
        Ok(())
    }
}

/// A file writer that rotates by size.
///
/// Clones share the same file. Each `write` call is treated as one record
/// and never split across files.
#[derive(Debug, Clone)]
pub struct RotatingFileWriter {
    inner: Arc<Mutex<RotatingFile>>,
}

impl RotatingFileWriter {
    /// Opens (or creates) `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns `LoggingError::Open` if the directory or file cannot be created.
    pub fn open(
        path: impl Into<PathBuf>,
        max_bytes: u64,
        max_backups: usize,
    ) -> Result<Self, LoggingError> {
        let path = path.into();
        let open_error = |source| LoggingError::Open {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(open_error)?;
        }

        let mut file = RotatingFile {
            path: path.clone(),
            file: None,
            size: 0,
            max_bytes: max_bytes.max(1),
            max_backups,
        };
        file.open_file().map_err(open_error)?;

        Ok(Self {
            inner: Arc::new(Mutex::new(file)),
        })
    }

    /// Returns the active log file path.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.inner.lock().path.clone()
    }
}

impl Write for RotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().write_record(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.inner.lock().file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for RotatingFileWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Renders records as `YYYY-MM-DD HH:MM:SS,mmm - LEVEL - message`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineFormat;

/// Level name as it appears in the diagnostic log.
#[must_use]
pub fn level_name(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "TRACE",
        Level::DEBUG => "DEBUG",
        Level::INFO => "INFO",
        Level::WARN => "WARNING",
        _ => "ERROR",
    }
}

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(
            writer,
            "{} - {} - ",
            Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
            level_name(event.metadata().level())
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Handle to the installed diagnostic log.
#[derive(Debug)]
pub struct DiagnosticLog {
    path: PathBuf,
    writer: RotatingFileWriter,
    installed: bool,
}

impl DiagnosticLog {
    /// Installs the diagnostic log on first call; returns the existing
    /// handle afterwards, whatever `dir` is passed.
    ///
    /// If another global subscriber is already set, the file is still
    /// opened but records keep going to that subscriber.
    ///
    /// # Errors
    ///
    /// Returns `LoggingError::Open` if the log file cannot be opened.
    pub fn init(dir: &Path) -> Result<&'static Self, LoggingError> {
        DIAGNOSTIC_LOG.get_or_try_init(|| Self::install(dir))
    }

    /// Returns the handle if [`init`](Self::init) has succeeded.
    #[must_use]
    pub fn get() -> Option<&'static Self> {
        DIAGNOSTIC_LOG.get()
    }

    fn install(dir: &Path) -> Result<Self, LoggingError> {
        let path = dir.join(SYSTEM_LOG_FILE);
        let writer = RotatingFileWriter::open(&path, DEFAULT_MAX_BYTES, DEFAULT_MAX_BACKUPS)?;

        let file_targets = WARDEN_TARGETS
            .iter()
            .fold(Targets::new().with_default(LevelFilter::WARN), |targets, target| {
                targets.with_target(*target, LevelFilter::DEBUG)
            });
        let file_layer = tracing_subscriber::fmt::layer()
            .event_format(LineFormat)
            .with_ansi(false)
            .with_writer(writer.clone())
            .with_filter(file_targets);

        let console_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let console_layer = tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .with_filter(console_filter);

        let installed = tracing_subscriber::registry()
            .with(file_layer)
            .with(console_layer)
            .try_init()
            .is_ok();
        if installed {
            debug!(path = %path.display(), "diagnostic log initialised");
        }

        Ok(Self {
            path,
            writer,
            installed,
        })
    }

    /// Returns the active log file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if this handle's subscriber is the global default.
    #[must_use]
    pub const fn is_installed(&self) -> bool {
        self.installed
    }

    /// Flushes the log file.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    pub fn flush(&self) -> io::Result<()> {
        self.writer.clone().flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    mod rotation_tests {
        use super::*;

        fn write_records(writer: &mut RotatingFileWriter, count: usize, size: usize) {
            let record = format!("{}\n", "x".repeat(size - 1));
            for _ in 0..count {
                writer.write_all(record.as_bytes()).unwrap();
            }
        }

        #[test]
        fn creates_parent_directories() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("logs/system/system.log");

            let writer = RotatingFileWriter::open(&path, 1024, 2).unwrap();

            assert!(path.exists());
            assert_eq!(writer.path(), path);
        }

        #[test]
        fn rotates_when_full() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("system.log");
            let mut writer = RotatingFileWriter::open(&path, 100, 5).unwrap();

            write_records(&mut writer, 3, 40);

            assert_eq!(fs::metadata(&path).unwrap().len(), 40);
            assert_eq!(fs::metadata(dir.path().join("system.log.1")).unwrap().len(), 80);
            assert!(!dir.path().join("system.log.2").exists());
        }

        #[test]
        fn keeps_at_most_max_backups() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("system.log");
            let mut writer = RotatingFileWriter::open(&path, 50, 2).unwrap();

            write_records(&mut writer, 10, 50);

            assert!(path.exists());
            assert!(dir.path().join("system.log.1").exists());
            assert!(dir.path().join("system.log.2").exists());
            assert!(!dir.path().join("system.log.3").exists());
        }

        #[test]
        fn zero_backups_truncates() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("system.log");
            let mut writer = RotatingFileWriter::open(&path, 50, 0).unwrap();

            write_records(&mut writer, 3, 50);

            assert_eq!(fs::metadata(&path).unwrap().len(), 50);
            assert!(!dir.path().join("system.log.1").exists());
        }

        #[test]
        fn oversized_record_is_not_split() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("system.log");
            let mut writer = RotatingFileWriter::open(&path, 10, 1).unwrap();

            write_records(&mut writer, 1, 64);

            assert_eq!(fs::metadata(&path).unwrap().len(), 64);
        }

        #[test]
        fn appends_to_existing_file() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("system.log");
            fs::write(&path, "earlier\n").unwrap();

            let mut writer = RotatingFileWriter::open(&path, 1024, 1).unwrap();
            writer.write_all(b"later\n").unwrap();

            assert_eq!(fs::read_to_string(&path).unwrap(), "earlier\nlater\n");
        }
    }

    mod format_tests {
        use super::*;

        #[test]
        fn warn_is_rendered_as_warning() {
            assert_eq!(level_name(&Level::WARN), "WARNING");
            assert_eq!(level_name(&Level::ERROR), "ERROR");
            assert_eq!(level_name(&Level::DEBUG), "DEBUG");
        }

        #[test]
        fn line_layout() {
            let dir = TempDir::new().unwrap();
            let writer = RotatingFileWriter::open(dir.path().join("system.log"), 1024, 1).unwrap();
            let subscriber = tracing_subscriber::registry().with(
                tracing_subscriber::fmt::layer()
                    .event_format(LineFormat)
                    .with_ansi(false)
                    .with_writer(writer.clone()),
            );

            tracing::subscriber::with_default(subscriber, || {
                tracing::warn!("disk nearly full");
            });

            let content = fs::read_to_string(writer.path()).unwrap();
            let line = content.lines().next().unwrap();
            let (timestamp, rest) = line.split_at(23);
            assert_eq!(rest, " - WARNING - disk nearly full");
            assert_eq!(timestamp.as_bytes()[19], b',');
            assert!(chrono::NaiveDateTime::parse_from_str(&timestamp[..19], "%Y-%m-%d %H:%M:%S").is_ok());
        }
    }

    mod init_tests {
        use super::*;

        #[test]
        fn init_returns_the_same_handle() {
            let dir = TempDir::new().unwrap();
            let other = TempDir::new().unwrap();

            let first = DiagnosticLog::init(dir.path()).unwrap();
            let second = DiagnosticLog::init(other.path()).unwrap();

            assert!(std::ptr::eq(first, second));
            assert_eq!(second.path(), dir.path().join(SYSTEM_LOG_FILE));
            assert!(DiagnosticLog::get().is_some());
            assert!(!other.path().join(SYSTEM_LOG_FILE).exists());
        }
    }
}
