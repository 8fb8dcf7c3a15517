//! Log Warden daemon library.
//!
//! Holds everything `wardend` needs besides its entry point:
//!
//! - [`config`]: CLI flags and environment variables turned into [`AppConfig`]
//! - [`logging`]: the rotating diagnostic log
//! - [`signal`]: Ctrl+C and SIGTERM handling
//! - [`app`]: wiring of the configured monitor

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod app;
pub mod config;
pub mod error;
pub mod logging;
pub mod signal;

pub use app::{build_monitor, run};
pub use config::{AppConfig, Cli, DEFAULT_LOG_DIR, DEFAULT_SYSTEM_LOG_DIR, TailModeArg};
pub use error::{ConfigError, LoggingError};
pub use logging::{DiagnosticLog, LineFormat, RotatingFileWriter, SYSTEM_LOG_FILE};
pub use signal::{cancel_on_signal, shutdown_signal};
