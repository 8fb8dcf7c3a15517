//! Log Warden daemon entrypoint.

use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use wardend::{AppConfig, Cli, DiagnosticLog};

fn main() -> ExitCode {
    // Variables already in the environment win over .env entries.
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Err(e) = DiagnosticLog::init(&cli.system_log_dir) {
        eprintln!("Failed to initialise logging: {e}");
        return ExitCode::FAILURE;
    }

    match dotenv {
        Ok(path) => debug!(path = %path.display(), "loaded environment file"),
        Err(e) if e.not_found() => {}
        Err(e) => error!(error = %e, "failed to load .env file"),
    }

    let config = match AppConfig::from_cli(cli) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to create async runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(serve(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("log monitoring failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let signals = wardend::cancel_on_signal(cancel.clone());

    let result = wardend::run(config, cancel).await;

    signals.abort();
    info!("wardend exiting");
    result
}
