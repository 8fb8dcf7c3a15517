//! Wiring of configuration into a running monitor.

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::info;
use warden_alerts::{AlertDeduplicator, AlertDispatcher, EmailChannel};
use warden_core::ReportSink;
use warden_watch::{LogFileFilter, LogWatcher, Monitor, Pipeline, TailReader};

use crate::config::AppConfig;
use crate::error::ConfigError;

/// Builds the monitor described by `config`.
///
/// # Errors
///
/// Returns `ConfigError::Alerts` if the email channel cannot be created.
pub fn build_monitor(config: &AppConfig) -> Result<Monitor, ConfigError> {
    let channel = EmailChannel::new(config.smtp.clone())?;

    let mut dispatcher =
        AlertDispatcher::new(Arc::new(channel)).with_subject(config.alert_subject.clone());
    if config.alert_dedup {
        dispatcher = dispatcher.with_dedup(AlertDeduplicator::default());
    }

    let pipeline = Pipeline::new(
        TailReader::new(config.tail_mode).with_max_batch_bytes(config.max_batch_bytes),
        ReportSink::new(&config.report_path),
        dispatcher,
    );
    let watcher = LogWatcher::new(&config.log_dir, LogFileFilter::new(config.log_suffix.clone()));

    Ok(Monitor::new(watcher, pipeline))
}

/// Runs the monitor until `cancel` fires.
///
/// # Errors
///
/// Returns an error if the monitor cannot be built or cannot start.
pub async fn run(config: AppConfig, cancel: CancellationToken) -> anyhow::Result<()> {
    let mut monitor = build_monitor(&config).context("invalid configuration")?;

    info!(
        session = %monitor.session(),
        dir = %config.log_dir.display(),
        report = %config.report_path.display(),
        mode = %config.tail_mode,
        email_alerts = config.smtp.enabled,
        dedup = config.alert_dedup,
        max_batch_bytes = config.max_batch_bytes,
        "starting log monitoring"
    );

    monitor
        .run(cancel)
        .await
        .with_context(|| format!("failed to monitor {}", config.log_dir.display()))?;

    info!("log monitoring stopped");
    Ok(())
}
