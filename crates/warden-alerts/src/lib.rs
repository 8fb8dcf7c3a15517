//! Critical-event alerting for Log Warden.
//!
//! `warden-alerts` turns the CRITICAL lines of a batch into a plain-text
//! notification and delivers it through a pluggable channel.
//!
//! # Features
//!
//! - **Formatting**: fixed header plus one bullet per critical line
//! - **Single attempt**: one delivery attempt per alert, no retry
//! - **Failure isolation**: delivery errors are logged, never propagated
//! - **Deduplication**: opt-in suppression of critical lines already alerted
//! - **SMTP**: STARTTLS, authentication and bounded timeouts via `lettre`
//!
//! # Example
//!
//! ```rust
//! use std::path::Path;
//! use std::sync::Arc;
//! use warden_alerts::{AlertDispatcher, DispatchOutcome, MemoryChannel};
//!
//! let channel = MemoryChannel::default();
//! let dispatcher = AlertDispatcher::new(Arc::new(channel.clone()));
//!
//! let outcome = dispatcher.alert(
//!     Path::new("app.log"),
//!     &["2024-11-28 10:00:05 - CRITICAL - disk full"],
//! );
//!
//! assert_eq!(outcome, DispatchOutcome::Delivered);
//! assert!(channel.sent()[0].body.contains("disk full"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod channels;
pub mod dedup;
pub mod dispatcher;
pub mod email;
pub mod error;

// Re-export main types at crate root
pub use channels::{MemoryChannel, Notification, NotificationChannel, NotificationResult};
pub use dedup::{AlertDeduplicator, DEFAULT_DEDUP_CAPACITY};
pub use dispatcher::{
    ALERT_HEADER, AlertDispatcher, DEFAULT_ALERT_SUBJECT, DispatchOutcome, critical_subset,
    format_critical_alert,
};
pub use email::{DEFAULT_SMTP_PORT, DEFAULT_SMTP_TIMEOUT, EmailChannel, SmtpConfig};
pub use error::{AlertError, Result};
