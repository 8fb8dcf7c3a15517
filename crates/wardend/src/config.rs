//! Daemon configuration.
//!
//! Every setting can come from a CLI flag or an environment variable; a
//! `.env` file in the working directory is loaded first by `main`, so real
//! environment variables and flags take precedence over it.

use std::path::PathBuf;
use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::{Parser, ValueEnum};
use warden_alerts::{DEFAULT_ALERT_SUBJECT, SmtpConfig};
use warden_core::DEFAULT_REPORT_PATH;
use warden_watch::{DEFAULT_LOG_SUFFIX, DEFAULT_MAX_BATCH_BYTES, DEFAULT_WINDOW_LINES, TailMode};

use crate::error::ConfigError;

/// Default monitored directory.
pub const DEFAULT_LOG_DIR: &str = "./logs/monitored";

/// Default directory of the diagnostic log.
pub const DEFAULT_SYSTEM_LOG_DIR: &str = "logs/system";

/// How new lines are cut from a modified file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum TailModeArg {
    /// Complete lines appended since the last read.
    #[default]
    Offset,
    /// The last N lines of the file.
    Window,
}

/// Log Warden daemon - watches a log directory and alerts on CRITICAL lines.
#[derive(Parser, Debug, Clone)]
#[command(name = "wardend")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Directory to monitor.
    #[arg(long, env = "LOG_DIR", default_value = DEFAULT_LOG_DIR)]
    pub log_dir: PathBuf,

    /// File name suffix of monitored files.
    #[arg(long, env = "WARDEN_LOG_SUFFIX", default_value = DEFAULT_LOG_SUFFIX)]
    pub log_suffix: String,

    /// How new lines are read.
    #[arg(long, env = "WARDEN_TAIL_MODE", value_enum, default_value_t = TailModeArg::Offset)]
    pub tail_mode: TailModeArg,

    /// Lines per batch in window mode.
    #[arg(long, env = "WARDEN_WINDOW_LINES", default_value_t = DEFAULT_WINDOW_LINES)]
    pub window_lines: usize,

    /// Report file receiving one summary per batch.
    #[arg(long, env = "WARDEN_REPORT_PATH", default_value = DEFAULT_REPORT_PATH)]
    pub report_path: PathBuf,

    /// Directory of the diagnostic log.
    #[arg(long, env = "WARDEN_SYSTEM_LOG_DIR", default_value = DEFAULT_SYSTEM_LOG_DIR)]
    pub system_log_dir: PathBuf,

    /// Alert each critical line at most once. Defaults to on in window mode
    /// and off in offset mode.
    #[arg(
        long,
        env = "WARDEN_ALERT_DEDUP",
        value_parser = BoolishValueParser::new(),
        action = clap::ArgAction::Set
    )]
    pub alert_dedup: Option<bool>,

    /// Upper bound on the bytes read from one file per change event.
    #[arg(long, env = "WARDEN_MAX_BATCH_BYTES", default_value_t = DEFAULT_MAX_BATCH_BYTES)]
    pub max_batch_bytes: u64,

    /// Subject of alert emails.
    #[arg(long, env = "WARDEN_ALERT_SUBJECT", default_value = DEFAULT_ALERT_SUBJECT)]
    pub alert_subject: String,

    /// Send critical alerts by email.
    #[arg(
        long,
        env = "ENABLE_EMAIL_ALERTS",
        default_value = "true",
        value_parser = BoolishValueParser::new(),
        action = clap::ArgAction::Set
    )]
    pub email_alerts: bool,

    /// SMTP server host.
    #[arg(long, env = "EMAIL_HOST")]
    pub email_host: Option<String>,

    /// SMTP server port.
    #[arg(long, env = "EMAIL_PORT", default_value_t = warden_alerts::DEFAULT_SMTP_PORT)]
    pub email_port: u16,

    /// SMTP login, also the sender address.
    #[arg(long, env = "EMAIL_USER")]
    pub email_user: Option<String>,

    /// SMTP password.
    #[arg(long, env = "EMAIL_PASS", hide_env_values = true)]
    pub email_pass: Option<String>,

    /// Comma-separated recipient addresses.
    #[arg(long, env = "EMAIL_RECEIVER", value_delimiter = ',')]
    pub email_receiver: Vec<String>,

    /// Negotiate STARTTLS before authenticating.
    #[arg(
        long,
        env = "EMAIL_USE_TLS",
        default_value = "true",
        value_parser = BoolishValueParser::new(),
        action = clap::ArgAction::Set
    )]
    pub email_use_tls: bool,

    /// Timeout of each SMTP operation, in seconds.
    #[arg(long, env = "EMAIL_TIMEOUT_SECS", default_value_t = 60)]
    pub email_timeout_secs: u64,
}

/// Validated daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Directory to monitor.
    pub log_dir: PathBuf,
    /// File name suffix of monitored files.
    pub log_suffix: String,
    /// How new lines are read.
    pub tail_mode: TailMode,
    /// Report file path.
    pub report_path: PathBuf,
    /// Directory of the diagnostic log.
    pub system_log_dir: PathBuf,
    /// Whether repeated critical lines are suppressed.
    pub alert_dedup: bool,
    /// Upper bound on the bytes read from one file per change event.
    pub max_batch_bytes: u64,
    /// Subject of alert emails.
    pub alert_subject: String,
    /// Email channel settings.
    pub smtp: SmtpConfig,
}

impl AppConfig {
    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an empty suffix, a zero window or batch size,
    /// or an enabled email channel with missing settings.
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        if cli.log_suffix.is_empty() {
            return Err(ConfigError::Invalid {
                field: "WARDEN_LOG_SUFFIX",
                reason: "must not be empty".to_string(),
            });
        }

        let tail_mode = match cli.tail_mode {
            TailModeArg::Offset => TailMode::Offset,
            TailModeArg::Window if cli.window_lines == 0 => {
                return Err(ConfigError::Invalid {
                    field: "WARDEN_WINDOW_LINES",
                    reason: "must be at least 1".to_string(),
                });
            }
            TailModeArg::Window => TailMode::Window(cli.window_lines),
        };

        if cli.max_batch_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "WARDEN_MAX_BATCH_BYTES",
                reason: "must be at least 1".to_string(),
            });
        }

        // Offset mode never rereads a line, so an identical line is a new event.
        let alert_dedup = cli.alert_dedup.unwrap_or(matches!(tail_mode, TailMode::Window(_)));

        let recipients = cli
            .email_receiver
            .iter()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect();

        let smtp = SmtpConfig::new(
            cli.email_host.unwrap_or_default(),
            cli.email_user.unwrap_or_default(),
            cli.email_pass.unwrap_or_default(),
        )
        .with_port(cli.email_port)
        .with_recipients(recipients)
        .with_tls(cli.email_use_tls)
        .with_timeout(Duration::from_secs(cli.email_timeout_secs))
        .enabled(cli.email_alerts);
        smtp.validate()?;

        Ok(Self {
            log_dir: cli.log_dir,
            log_suffix: cli.log_suffix,
            tail_mode,
            report_path: cli.report_path,
            system_log_dir: cli.system_log_dir,
            alert_dedup,
            max_batch_bytes: cli.max_batch_bytes,
            alert_subject: cli.alert_subject,
            smtp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;
    use warden_alerts::AlertError;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["wardend"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    fn full_email() -> Vec<&'static str> {
        vec![
            "--email-host",
            "smtp.example.com",
            "--email-user",
            "warden@example.com",
            "--email-pass",
            "secret",
            "--email-receiver",
            "ops@example.com, oncall@example.com",
        ]
    }

    mod cli_tests {
        use super::*;
        use test_case::test_case;

        #[test]
        fn cli_definition_is_consistent() {
            use clap::CommandFactory;
            Cli::command().debug_assert();
        }

        #[test_case("false", false ; "false")]
        #[test_case("False", false ; "capitalised")]
        #[test_case("0", false ; "zero")]
        #[test_case("yes", true ; "yes")]
        fn boolish_flags(value: &str, expected: bool) {
            let cli = parse(&["--email-alerts", value]);
            assert_eq!(cli.email_alerts, expected);
        }

        #[test]
        fn receivers_are_comma_separated() {
            let cli = parse(&full_email());
            assert_eq!(cli.email_receiver.len(), 2);
        }
    }

    mod app_config_tests {
        use super::*;
        use test_case::test_case;

        #[test]
        fn disabled_alerts_need_no_credentials() {
            let cli = parse(&[
                "--email-alerts",
                "false",
                "--log-dir",
                "/tmp/watched",
                "--log-suffix",
                ".log",
                "--tail-mode",
                "offset",
            ]);
            let config = AppConfig::from_cli(cli).unwrap();

            assert!(!config.smtp.enabled);
            assert_eq!(config.log_dir, PathBuf::from("/tmp/watched"));
            assert_eq!(config.tail_mode, TailMode::Offset);
        }

        #[test]
        fn full_email_configuration() {
            let mut args = full_email();
            args.extend(["--email-alerts", "true", "--email-use-tls", "true"]);
            let config = AppConfig::from_cli(parse(&args)).unwrap();

            assert!(config.smtp.enabled);
            assert_eq!(config.smtp.host, "smtp.example.com");
            assert_eq!(
                config.smtp.recipients,
                vec!["ops@example.com".to_string(), "oncall@example.com".to_string()]
            );
        }

        #[test]
        fn enabled_alerts_without_host_fail() {
            let cli = parse(&[
                "--email-alerts",
                "true",
                "--email-user",
                "warden@example.com",
                "--email-pass",
                "secret",
                "--email-receiver",
                "ops@example.com",
                "--email-host",
                "",
            ]);
            let err = AppConfig::from_cli(cli).unwrap_err();
            assert!(matches!(err, ConfigError::Alerts(AlertError::InvalidConfig { .. })));
        }

        #[test]
        fn window_mode_uses_window_lines() {
            let cli = parse(&[
                "--email-alerts",
                "false",
                "--tail-mode",
                "window",
                "--window-lines",
                "7",
            ]);
            let config = AppConfig::from_cli(cli).unwrap();
            assert_eq!(config.tail_mode, TailMode::Window(7));
        }

        #[test_case(&["--tail-mode", "offset"], false ; "offset defaults off")]
        #[test_case(&["--tail-mode", "window"], true ; "window defaults on")]
        #[test_case(&["--tail-mode", "offset", "--alert-dedup", "true"], true ; "explicit on")]
        #[test_case(&["--tail-mode", "window", "--alert-dedup", "false"], false ; "explicit off")]
        fn alert_dedup_follows_tail_mode(args: &[&str], expected: bool) {
            let mut argv = vec!["--email-alerts", "false"];
            argv.extend_from_slice(args);
            let config = AppConfig::from_cli(parse(&argv)).unwrap();
            assert_eq!(config.alert_dedup, expected);
        }

        #[test]
        fn zero_batch_size_is_rejected() {
            let cli = parse(&["--email-alerts", "false", "--max-batch-bytes", "0"]);
            assert!(matches!(
                AppConfig::from_cli(cli),
                Err(ConfigError::Invalid { field: "WARDEN_MAX_BATCH_BYTES", .. })
            ));
        }

        #[test]
        fn zero_window_is_rejected() {
            let cli = parse(&[
                "--email-alerts",
                "false",
                "--tail-mode",
                "window",
                "--window-lines",
                "0",
            ]);
            assert!(matches!(
                AppConfig::from_cli(cli),
                Err(ConfigError::Invalid { field: "WARDEN_WINDOW_LINES", .. })
            ));
        }

        #[test]
        fn empty_suffix_is_rejected() {
            let cli = parse(&["--email-alerts", "false", "--log-suffix", ""]);
            assert!(matches!(
                AppConfig::from_cli(cli),
                Err(ConfigError::Invalid { field: "WARDEN_LOG_SUFFIX", .. })
            ));
        }
    }
}
