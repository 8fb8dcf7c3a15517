//! Notification channels for alert delivery.
//!
//! This module provides the [`NotificationChannel`] trait and the in-memory
//! [`MemoryChannel`]. The SMTP implementation lives in [`crate::email`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{AlertError, Result};

/// A notification to be sent through a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
    /// File the alerted lines came from.
    pub source: PathBuf,
    /// Number of critical lines in the body.
    pub line_count: usize,
}

impl Notification {
    /// Creates a new notification.
    #[must_use]
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            source: PathBuf::new(),
            line_count: 0,
        }
    }

    /// Sets the source file.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = source.into();
        self
    }

    /// Sets the line count.
    #[must_use]
    pub const fn with_line_count(mut self, count: usize) -> Self {
        self.line_count = count;
        self
    }

    /// Returns the source file.
    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }
}

/// Result of sending a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationResult {
    /// Whether the notification was sent successfully.
    pub success: bool,
    /// The channel that processed this notification.
    pub channel: String,
    /// Optional message or error description.
    pub message: Option<String>,
}

impl NotificationResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(channel: impl Into<String>) -> Self {
        Self {
            success: true,
            channel: channel.into(),
            message: None,
        }
    }

    /// Creates a failed result.
    #[must_use]
    pub fn failure(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            channel: channel.into(),
            message: Some(message.into()),
        }
    }

    /// Sets the message.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }
}

/// Trait for notification channels.
///
/// Implementations must make exactly one delivery attempt per call to
/// [`send`](NotificationChannel::send) and must bound every network
/// operation so a dead peer cannot stall the caller forever.
pub trait NotificationChannel: Send + Sync + fmt::Debug {
    /// Returns the name of this channel.
    fn name(&self) -> &str;

    /// Sends a notification through this channel.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Delivery` if the notification cannot be sent.
    fn send(&self, notification: &Notification) -> Result<NotificationResult>;

    /// Returns true if this channel is enabled.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// A channel that records notifications in memory.
///
/// Clones share the same record, so a test can keep one handle while the
/// dispatcher owns another. In failing mode every send returns
/// `AlertError::Delivery`, which stands in for an unreachable server.
#[derive(Debug, Clone)]
pub struct MemoryChannel {
    name: String,
    enabled: bool,
    failing: Arc<AtomicBool>,
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl MemoryChannel {
    /// Creates a new recording channel.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            failing: Arc::new(AtomicBool::new(false)),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Sets whether the channel is enabled.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Switches failing mode on or off.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Returns a copy of every notification delivered so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    /// Number of notifications delivered so far.
    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl NotificationChannel for MemoryChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, notification: &Notification) -> Result<NotificationResult> {
        if !self.is_enabled() {
            debug!(channel = %self.name(), "channel is disabled, skipping");
            return Ok(NotificationResult::success(self.name()).with_message("channel disabled"));
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(AlertError::Delivery {
                channel: self.name.clone(),
                reason: "simulated outage".to_string(),
            });
        }

        self.sent.lock().push(notification.clone());
        Ok(NotificationResult::success(self.name()).with_message("recorded"))
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}
