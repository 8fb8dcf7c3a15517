//! # warden-core
//!
//! Severity classification and per-batch statistics for Log Warden.
//!
//! This crate provides:
//!
//! - [`SeverityLevel`]: The closed set of levels (DEBUG to CRITICAL)
//! - [`classify`]: Maps a raw line to a level via its `" - LEVEL - "` tag
//! - [`LevelTally`]: Zero-initialised level counts for one batch
//! - [`ReportSink`]: Append-only report file
//! - [`render_bar_chart`]: Plain-text chart of a tally
//!
//! ## Example
//!
//! ```rust
//! use warden_core::{classify, tally, SeverityLevel};
//!
//! let lines = [
//!     "2024-11-28 10:00:00 - INFO - started\n",
//!     "2024-11-28 10:00:05 - CRITICAL - disk full\n",
//! ];
//!
//! assert_eq!(classify(lines[1]), Some(SeverityLevel::Critical));
//!
//! let stats = tally(lines);
//! assert_eq!(stats.get(SeverityLevel::Info), 1);
//! assert!(stats.render().contains("CRITICAL: 1 occurrences (50.00%)"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod chart;
pub mod error;
pub mod level;
pub mod report;
pub mod tally;

// Re-export main types
pub use chart::{CHART_TITLE, DEFAULT_CHART_WIDTH, render_bar_chart};
pub use error::{CoreError, Result};
pub use level::{SeverityLevel, classify};
pub use report::{DEFAULT_REPORT_PATH, ReportSink};
pub use tally::{LevelTally, REPORT_HEADER, tally};
