//! Alert formatting and delivery.
//!
//! The [`AlertDispatcher`] turns the critical lines of a batch into one
//! notification and hands it to its channel exactly once. Delivery failures
//! are logged and reported as a [`DispatchOutcome`], never propagated to the
//! monitoring loop.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use warden_core::{SeverityLevel, classify};

use crate::channels::{Notification, NotificationChannel, NotificationResult};
use crate::dedup::AlertDeduplicator;
use crate::error::{AlertError, Result};

/// Default subject of alert messages.
pub const DEFAULT_ALERT_SUBJECT: &str = "Critical Alert from Log Monitoring System";

/// Fixed preamble of every alert body.
pub const ALERT_HEADER: &str = "Critical Alert!\n\nThe following critical events were detected:\n";

/// Formats critical lines into an alert body.
///
/// Each line is trimmed and emitted as a `- ` bullet in input order.
#[must_use]
pub fn format_critical_alert<S: AsRef<str>>(lines: &[S]) -> String {
    let mut body = String::from(ALERT_HEADER);
    for line in lines {
        body.push_str("- ");
        body.push_str(line.as_ref().trim());
        body.push('\n');
    }
    body
}

/// Returns the lines of a batch that classify as CRITICAL, in order.
#[must_use]
pub fn critical_subset<S: AsRef<str>>(lines: &[S]) -> Vec<&str> {
    lines
        .iter()
        .map(AsRef::as_ref)
        .filter(|line| classify(line) == Some(SeverityLevel::Critical))
        .collect()
}

/// What happened to one call to [`AlertDispatcher::alert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// There were no critical lines.
    NotNeeded,
    /// Every critical line had already been alerted.
    Suppressed,
    /// The channel is disabled; nothing was sent.
    Disabled,
    /// The channel accepted the alert.
    Delivered,
    /// The single delivery attempt failed.
    Failed(String),
}

impl DispatchOutcome {
    /// Returns true if the alert reached the channel.
    #[must_use]
    pub const fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotNeeded => write!(f, "not needed"),
            Self::Suppressed => write!(f, "suppressed"),
            Self::Disabled => write!(f, "disabled"),
            Self::Delivered => write!(f, "delivered"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Formats and delivers critical-event alerts through one channel.
#[derive(Debug)]
pub struct AlertDispatcher {
    channel: Arc<dyn NotificationChannel>,
    subject: String,
    dedup: Option<Mutex<AlertDeduplicator>>,
}

impl AlertDispatcher {
    /// Creates a dispatcher with the default subject and no deduplication.
    ///
    /// Every call to [`alert`](Self::alert) with critical lines makes one
    /// dispatch attempt. Deduplication only pays off when the same lines can
    /// be read twice, as in window mode; see [`with_dedup`](Self::with_dedup).
    #[must_use]
    pub fn new(channel: Arc<dyn NotificationChannel>) -> Self {
        Self {
            channel,
            subject: DEFAULT_ALERT_SUBJECT.to_string(),
            dedup: None,
        }
    }

    /// Sets the subject line.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Suppresses critical lines that were already alerted.
    #[must_use]
    pub fn with_dedup(mut self, dedup: AlertDeduplicator) -> Self {
        self.dedup = Some(Mutex::new(dedup));
        self
    }

    /// Turns deduplication off again; every critical line is alerted.
    #[must_use]
    pub fn without_dedup(mut self) -> Self {
        self.dedup = None;
        self
    }

    /// Returns the channel.
    #[must_use]
    pub fn channel(&self) -> &dyn NotificationChannel {
        self.channel.as_ref()
    }

    /// Returns the subject line.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Returns true if deduplication is on.
    #[must_use]
    pub const fn dedup_enabled(&self) -> bool {
        self.dedup.is_some()
    }

    /// Makes exactly one delivery attempt. No retry.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Delivery` if the channel fails or reports a
    /// negative result, or whatever configuration error the channel raises.
    pub fn dispatch(&self, notification: &Notification) -> Result<NotificationResult> {
        let result = self.channel.send(notification)?;
        if !result.success {
            return Err(AlertError::Delivery {
                channel: result.channel,
                reason: result
                    .message
                    .unwrap_or_else(|| "channel reported failure".to_string()),
            });
        }
        Ok(result)
    }

    /// Alerts on the critical lines of one batch.
    ///
    /// Applies deduplication, formats the body, dispatches once and logs the
    /// outcome. Never fails: delivery errors are logged and returned as
    /// [`DispatchOutcome::Failed`].
    pub fn alert<S: AsRef<str>>(&self, source: &Path, critical_lines: &[S]) -> DispatchOutcome {
        if critical_lines.is_empty() {
            return DispatchOutcome::NotNeeded;
        }

        let lines: Vec<&str> = match &self.dedup {
            Some(dedup) => dedup.lock().unseen(source, critical_lines),
            None => critical_lines.iter().map(AsRef::as_ref).collect(),
        };
        if lines.is_empty() {
            debug!(
                source = %source.display(),
                lines = critical_lines.len(),
                "critical lines already alerted, suppressing"
            );
            return DispatchOutcome::Suppressed;
        }

        let notification = Notification::new(self.subject.clone(), format_critical_alert(&lines))
            .with_source(source)
            .with_line_count(lines.len());

        let outcome = match self.dispatch(&notification) {
            Ok(_) if !self.channel.is_enabled() => DispatchOutcome::Disabled,
            Ok(result) => {
                info!(
                    channel = %result.channel,
                    source = %source.display(),
                    lines = lines.len(),
                    "critical alert dispatched"
                );
                DispatchOutcome::Delivered
            }
            Err(e @ AlertError::Delivery { .. }) => {
                error!(
                    channel = %self.channel.name(),
                    source = %source.display(),
                    error = %e,
                    "failed to deliver critical alert"
                );
                DispatchOutcome::Failed(e.to_string())
            }
            Err(e) => {
                warn!(
                    channel = %self.channel.name(),
                    source = %source.display(),
                    error = %e,
                    "critical alert not sent"
                );
                DispatchOutcome::Failed(e.to_string())
            }
        };

        if let Some(dedup) = &self.dedup {
            dedup.lock().record(source, &lines);
        }
        outcome
    }
}
