//! Error types for wardend.

use std::path::PathBuf;

use thiserror::Error;
use warden_alerts::AlertError;

/// Errors raised while turning CLI flags and environment into configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A setting has an unusable value.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Name of the setting.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The email channel configuration is incomplete.
    #[error("email alerts: {0}")]
    Alerts(#[from] AlertError),
}

/// Errors raised while setting up the diagnostic log.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The log file or its directory could not be opened.
    #[error("cannot open diagnostic log {}: {source}", path.display())]
    Open {
        /// Log file path.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}
