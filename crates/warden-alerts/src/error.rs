//! Error types for the warden-alerts crate.

use thiserror::Error;

/// Errors that can occur while configuring or delivering alerts.
#[derive(Debug, Error)]
pub enum AlertError {
    /// The channel could not deliver the notification.
    #[error("delivery via {channel} failed: {reason}")]
    Delivery {
        /// Name of the channel that failed.
        channel: String,
        /// The reason delivery failed.
        reason: String,
    },

    /// Channel configuration is incomplete or inconsistent.
    #[error("invalid alert configuration: {reason}")]
    InvalidConfig {
        /// The reason the configuration is invalid.
        reason: String,
    },

    /// A sender or recipient address could not be parsed.
    #[error("invalid address {address:?}: {reason}")]
    InvalidAddress {
        /// The offending address.
        address: String,
        /// Parser message.
        reason: String,
    },

    /// The outgoing message could not be assembled.
    #[error("failed to build message: {0}")]
    MessageBuild(String),
}

impl AlertError {
    /// Shorthand for a configuration error.
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

/// Result type for alert operations.
pub type Result<T> = std::result::Result<T, AlertError>;
