//! The monitor loop.
//!
//! [`Pipeline`] is the synchronous per-event handler: read the batch,
//! tally it, append the report, alert on critical lines. [`Monitor`] owns
//! the [`LogWatcher`] and feeds it events one at a time until cancelled.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use warden_alerts::{AlertDispatcher, DispatchOutcome, critical_subset};
use warden_core::{DEFAULT_CHART_WIDTH, LevelTally, ReportSink, render_bar_chart};

use crate::error::Result;
use crate::tail::TailReader;
use crate::watcher::{ChangeEvent, LogWatcher, WatcherState};

/// What one change event produced.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    /// The modified file.
    pub path: PathBuf,
    /// Number of lines in the batch.
    pub lines: usize,
    /// Level counts of the batch.
    pub tally: LevelTally,
    /// Whether the report block was written.
    pub reported: bool,
    /// Number of CRITICAL lines.
    pub critical: usize,
    /// What happened to the alert.
    pub alert: DispatchOutcome,
}

/// Handles one change event at a time.
#[derive(Debug)]
pub struct Pipeline {
    tail: TailReader,
    report: ReportSink,
    dispatcher: AlertDispatcher,
    chart_width: usize,
}

impl Pipeline {
    /// Creates a pipeline.
    #[must_use]
    pub fn new(tail: TailReader, report: ReportSink, dispatcher: AlertDispatcher) -> Self {
        Self {
            tail,
            report,
            dispatcher,
            chart_width: DEFAULT_CHART_WIDTH,
        }
    }

    /// Sets the width of the debug chart.
    #[must_use]
    pub const fn with_chart_width(mut self, width: usize) -> Self {
        self.chart_width = width;
        self
    }

    /// Returns the tail reader.
    #[must_use]
    pub const fn tail(&self) -> &TailReader {
        &self.tail
    }

    /// Returns the report sink.
    #[must_use]
    pub const fn report(&self) -> &ReportSink {
        &self.report
    }

    /// Returns the dispatcher.
    #[must_use]
    pub const fn dispatcher(&self) -> &AlertDispatcher {
        &self.dispatcher
    }

    /// Handles an event, logging and dropping it on failure.
    ///
    /// Returns `None` when the event produced no batch or failed.
    pub fn handle(&self, event: &ChangeEvent) -> Option<BatchOutcome> {
        match self.process(&event.path) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(path = %event.path.display(), error = %e, "error reading log file, event dropped");
                None
            }
        }
    }

    /// Processes the new content of one file.
    ///
    /// A failed report write is logged and does not hold back the alert.
    ///
    /// # Errors
    ///
    /// Returns `WatchError::FileAccess` or `WatchError::Decode` if the
    /// batch cannot be read.
    pub fn process(&self, path: &Path) -> Result<Option<BatchOutcome>> {
        info!(path = %path.display(), "modified file");

        let lines = self.tail.read_new(path)?;
        if lines.is_empty() {
            debug!(path = %path.display(), "no new complete lines");
            return Ok(None);
        }
        debug!(path = %path.display(), lines = ?lines, "new lines");

        let tally = LevelTally::from_lines(&lines);
        let report = tally.render();
        info!(
            path = %path.display(),
            lines = lines.len(),
            classified = tally.total(),
            unclassified = tally.unclassified(),
            "batch analysed"
        );
        debug!("\n{}", render_bar_chart(&tally, self.chart_width));

        let reported = match self.report.append(&report) {
            Ok(()) => true,
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to write report");
                false
            }
        };

        let critical = critical_subset(&lines);
        let alert = self.dispatcher.alert(path, &critical);

        Ok(Some(BatchOutcome {
            path: path.to_path_buf(),
            lines: lines.len(),
            tally,
            reported,
            critical: critical.len(),
            alert,
        }))
    }
}

/// Runs the watcher and pipeline until cancelled.
#[derive(Debug)]
pub struct Monitor {
    session: Uuid,
    watcher: LogWatcher,
    pipeline: Arc<Pipeline>,
}

impl Monitor {
    /// Creates a monitor.
    #[must_use]
    pub fn new(watcher: LogWatcher, pipeline: Pipeline) -> Self {
        Self {
            session: Uuid::new_v4(),
            watcher,
            pipeline: Arc::new(pipeline),
        }
    }

    /// Returns the session id used in log records.
    #[must_use]
    pub const fn session(&self) -> Uuid {
        self.session
    }

    /// Returns the watcher state.
    #[must_use]
    pub const fn state(&self) -> WatcherState {
        self.watcher.state()
    }

    /// Returns the pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Starts watching and processes events until `cancel` fires.
    ///
    /// Files already in the directory are seeded first so their existing
    /// content is never reported. Each event is handled on the blocking
    /// pool and awaited before the next one is taken, so events are
    /// processed in delivery order. Cancellation lets an in-flight batch
    /// finish, then stops the watcher.
    ///
    /// # Errors
    ///
    /// Returns a fatal `WatchError` if the watcher cannot start.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<()> {
        let seeding = self
            .pipeline
            .tail()
            .seed_directory(self.watcher.directory(), self.watcher.filter());
        if let Err(e) = seeding {
            warn!(session = %self.session, error = %e, "cannot seed existing files");
        }

        self.watcher.start()?;
        info!(
            session = %self.session,
            dir = %self.watcher.directory().display(),
            mode = %self.pipeline.tail().mode(),
            "monitor started"
        );

        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    info!(session = %self.session, "monitor cancelled");
                    break;
                }
                event = self.watcher.next_event() => {
                    let Some(event) = event else {
                        warn!(session = %self.session, "event stream closed");
                        break;
                    };
                    Self::dispatch_event(self.session, Arc::clone(&self.pipeline), event).await;
                }
            }
        }

        self.watcher.stop();
        info!(session = %self.session, "monitor stopped");
        Ok(())
    }

    async fn dispatch_event(session: Uuid, pipeline: Arc<Pipeline>, event: ChangeEvent) {
        let path = event.path.clone();
        match tokio::task::spawn_blocking(move || pipeline.handle(&event)).await {
            Ok(Some(outcome)) => debug!(
                session = %session,
                path = %outcome.path.display(),
                alert = %outcome.alert,
                "batch handled"
            ),
            Ok(None) => {}
            Err(e) => error!(
                session = %session,
                path = %path.display(),
                error = %e,
                "event handler task failed"
            ),
        }
    }
}
