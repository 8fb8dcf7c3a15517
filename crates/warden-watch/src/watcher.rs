//! Filesystem subscription for one directory.
//!
//! The `notify` backend delivers events on its own thread. Relevant
//! modifications are filtered there and forwarded with `blocking_send` into
//! a bounded tokio channel that the monitor loop awaits.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{Result, WatchError};
use crate::filter::LogFileFilter;

/// Default capacity of the event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Creates `path` (and its parents) unless it already exists.
///
/// Returns true if the directory was created by this call.
///
/// # Errors
///
/// Returns `WatchError::Bootstrap` if the path exists but is not a
/// directory, or if it cannot be created.
pub fn ensure_directory(path: &Path) -> Result<bool> {
    if path.is_dir() {
        return Ok(false);
    }
    fs::create_dir_all(path).map_err(|source| WatchError::Bootstrap {
        path: path.to_path_buf(),
        source,
    })?;
    info!(dir = %path.display(), "created monitored directory");
    Ok(true)
}

/// A modification of one accepted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Path of the modified file.
    pub path: PathBuf,
}

impl ChangeEvent {
    /// Creates a change event.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Lifecycle of a [`LogWatcher`].
///
/// ```text
/// Stopped -> Starting -> Running -> Stopping -> Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatcherState {
    /// No subscription is held.
    #[default]
    Stopped,
    /// Bootstrapping the directory and binding the subscription.
    Starting,
    /// Events are being delivered.
    Running,
    /// Tearing the subscription down.
    Stopping,
}

impl WatcherState {
    /// Returns the state name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        }
    }
}

impl fmt::Display for WatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns true for the event kinds that mean "content may have grown".
fn is_content_change(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Modify(modify) if !matches!(modify, ModifyKind::Name(_)))
}

/// Watches one directory, non-recursively, for modified log files.
pub struct LogWatcher {
    dir: PathBuf,
    filter: LogFileFilter,
    capacity: usize,
    state: WatcherState,
    watcher: Option<RecommendedWatcher>,
    events: Option<mpsc::Receiver<ChangeEvent>>,
}

impl LogWatcher {
    /// Creates a stopped watcher for `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, filter: LogFileFilter) -> Self {
        Self {
            dir: dir.into(),
            filter,
            capacity: DEFAULT_EVENT_CAPACITY,
            state: WatcherState::Stopped,
            watcher: None,
            events: None,
        }
    }

    /// Sets the event channel capacity.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Returns the watched directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.dir
    }

    /// Returns the file filter.
    #[must_use]
    pub const fn filter(&self) -> &LogFileFilter {
        &self.filter
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> WatcherState {
        self.state
    }

    /// Bootstraps the directory and binds the subscription.
    ///
    /// Returns true if the directory had to be created. Calling `start` on a
    /// running watcher does nothing.
    ///
    /// # Errors
    ///
    /// Returns `WatchError::Bootstrap` or `WatchError::Subscribe`. The
    /// watcher is left stopped.
    pub fn start(&mut self) -> Result<bool> {
        if self.state == WatcherState::Running {
            debug!(dir = %self.dir.display(), "watcher already running");
            return Ok(false);
        }

        self.state = WatcherState::Starting;
        match self.bind() {
            Ok(created) => {
                self.state = WatcherState::Running;
                info!(dir = %self.dir.display(), suffix = %self.filter.suffix(), "monitoring directory");
                Ok(created)
            }
            Err(e) => {
                self.state = WatcherState::Stopped;
                Err(e)
            }
        }
    }

    fn bind(&mut self) -> Result<bool> {
        let created = ensure_directory(&self.dir)?;

        let (tx, rx) = mpsc::channel(self.capacity);
        let filter = self.filter.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) if is_content_change(&event.kind) => {
                    for path in event.paths {
                        if !filter.accepts(&path) {
                            continue;
                        }
                        if tx.blocking_send(ChangeEvent { path }).is_err() {
                            // receiver dropped, the watcher is stopping
                            return;
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "filesystem notification error"),
            }
        })
        .map_err(|source| self.subscribe_error(source))?;

        watcher
            .watch(&self.dir, RecursiveMode::NonRecursive)
            .map_err(|source| self.subscribe_error(source))?;

        self.watcher = Some(watcher);
        self.events = Some(rx);
        Ok(created)
    }

    fn subscribe_error(&self, source: notify::Error) -> WatchError {
        WatchError::Subscribe {
            path: self.dir.clone(),
            source,
        }
    }

    /// Releases the subscription and the event channel.
    ///
    /// Stopping a stopped watcher does nothing.
    pub fn stop(&mut self) {
        if self.state == WatcherState::Stopped {
            return;
        }

        self.state = WatcherState::Stopping;
        if let Some(mut watcher) = self.watcher.take() {
            if let Err(e) = watcher.unwatch(&self.dir) {
                debug!(dir = %self.dir.display(), error = %e, "unwatch failed");
            }
        }
        self.events = None;
        self.state = WatcherState::Stopped;
        info!(dir = %self.dir.display(), "stopped monitoring directory");
    }

    /// Waits for the next change event.
    ///
    /// Returns `None` when the watcher is not running or the subscription
    /// has gone away.
    pub async fn next_event(&mut self) -> Option<ChangeEvent> {
        match self.events.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }
}

impl fmt::Debug for LogWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogWatcher")
            .field("dir", &self.dir)
            .field("filter", &self.filter)
            .field("capacity", &self.capacity)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Drop for LogWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
