//! # warden-watch
//!
//! Directory watching and the monitor loop for Log Warden.
//!
//! ## Architecture
//!
//! ```text
//! notify thread                     tokio runtime
//! ┌───────────────────┐  bounded   ┌──────────────────────────────────┐
//! │ RecommendedWatcher│ ─mpsc────► │ Monitor::run (select! + cancel)  │
//! │  + LogFileFilter  │            │   └─ spawn_blocking(Pipeline)    │
//! └───────────────────┘            │        TailReader → LevelTally   │
//!                                  │        → ReportSink              │
//!                                  │        → AlertDispatcher         │
//!                                  └──────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use warden_alerts::{AlertDispatcher, MemoryChannel};
//! use warden_core::ReportSink;
//! use warden_watch::{LogFileFilter, LogWatcher, Monitor, Pipeline, TailMode, TailReader};
//!
//! # async fn example() -> warden_watch::Result<()> {
//! let pipeline = Pipeline::new(
//!     TailReader::new(TailMode::Offset),
//!     ReportSink::default(),
//!     AlertDispatcher::new(Arc::new(MemoryChannel::default())),
//! );
//! let watcher = LogWatcher::new("./logs/monitored", LogFileFilter::default());
//!
//! let cancel = CancellationToken::new();
//! Monitor::new(watcher, pipeline).run(cancel).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod filter;
pub mod monitor;
pub mod tail;
pub mod watcher;

pub use error::{Result, WatchError};
pub use filter::{DEFAULT_LOG_SUFFIX, LogFileFilter};
pub use monitor::{BatchOutcome, Monitor, Pipeline};
pub use tail::{DEFAULT_MAX_BATCH_BYTES, DEFAULT_WINDOW_LINES, TailMode, TailReader};
pub use watcher::{ChangeEvent, DEFAULT_EVENT_CAPACITY, LogWatcher, WatcherState, ensure_directory};
