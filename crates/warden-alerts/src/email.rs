//! SMTP email channel.
//!
//! One connection per notification: connect, STARTTLS (when enabled),
//! authenticate, send, quit. Every network operation is bounded by the
//! configured timeout.

use std::fmt;
use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::{debug, info, warn};

use crate::channels::{Notification, NotificationChannel, NotificationResult};
use crate::error::{AlertError, Result};

/// Default SMTP submission port.
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Default bound on each SMTP network operation.
pub const DEFAULT_SMTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for the SMTP channel.
#[derive(Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    /// SMTP server host name.
    pub host: String,
    /// SMTP server port.
    pub port: u16,
    /// Login name, also used as the sender address.
    pub username: String,
    /// Login password.
    pub password: String,
    /// Negotiate STARTTLS before authenticating.
    pub use_tls: bool,
    /// Recipient addresses.
    pub recipients: Vec<String>,
    /// Bound on each network operation.
    pub timeout: Duration,
    /// Whether email alerts are sent at all.
    pub enabled: bool,
}

impl SmtpConfig {
    /// Creates an enabled configuration with default port, TLS and timeout.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_SMTP_PORT,
            username: username.into(),
            password: password.into(),
            use_tls: true,
            recipients: Vec::new(),
            timeout: DEFAULT_SMTP_TIMEOUT,
            enabled: true,
        }
    }

    /// Creates a configuration with email alerts switched off.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new("", "", "").enabled(false)
    }

    /// Sets the port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Adds a recipient.
    #[must_use]
    pub fn with_recipient(mut self, address: impl Into<String>) -> Self {
        self.recipients.push(address.into());
        self
    }

    /// Replaces the recipient list.
    #[must_use]
    pub fn with_recipients(mut self, recipients: Vec<String>) -> Self {
        self.recipients = recipients;
        self
    }

    /// Sets whether STARTTLS is negotiated.
    #[must_use]
    pub const fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    /// Sets the network timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets whether email alerts are enabled.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Checks that an enabled configuration has everything needed to send.
    ///
    /// A disabled configuration is always valid.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidConfig` when a required field is missing
    /// and `AlertError::InvalidAddress` when an address does not parse.
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.host.trim().is_empty() {
            return Err(AlertError::config("SMTP host is required"));
        }
        if self.port == 0 {
            return Err(AlertError::config("SMTP port must be non-zero"));
        }
        if self.username.trim().is_empty() {
            return Err(AlertError::config("SMTP username is required"));
        }
        if self.password.is_empty() {
            return Err(AlertError::config("SMTP password is required"));
        }
        if self.recipients.is_empty() {
            return Err(AlertError::config("at least one recipient is required"));
        }
        if self.timeout.is_zero() {
            return Err(AlertError::config("SMTP timeout must be non-zero"));
        }

        parse_mailbox(&self.username)?;
        for recipient in &self.recipients {
            parse_mailbox(recipient)?;
        }
        Ok(())
    }
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("use_tls", &self.use_tls)
            .field("recipients", &self.recipients)
            .field("timeout", &self.timeout)
            .field("enabled", &self.enabled)
            .finish()
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address
        .trim()
        .parse::<Mailbox>()
        .map_err(|e| AlertError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}

/// Sender, recipients and transport of an enabled channel.
struct Mailer {
    from: Mailbox,
    to: Vec<Mailbox>,
    transport: SmtpTransport,
}

/// Email notification channel backed by SMTP.
pub struct EmailChannel {
    name: String,
    config: SmtpConfig,
    mailer: Option<Mailer>,
}

impl EmailChannel {
    /// Creates a channel from a validated configuration.
    ///
    /// A disabled configuration yields a channel that never touches the
    /// network.
    ///
    /// # Errors
    ///
    /// Returns a configuration or address error if `config` is invalid, or
    /// `AlertError::InvalidConfig` if the TLS parameters cannot be built.
    pub fn new(config: SmtpConfig) -> Result<Self> {
        config.validate()?;

        let mailer = if config.enabled {
            Some(Self::build_mailer(&config)?)
        } else {
            None
        };

        Ok(Self {
            name: "email".to_string(),
            config,
            mailer,
        })
    }

    fn build_mailer(config: &SmtpConfig) -> Result<Mailer> {
        let from = parse_mailbox(&config.username)?;
        let to = config
            .recipients
            .iter()
            .map(|r| parse_mailbox(r))
            .collect::<Result<Vec<_>>>()?;

        let builder = if config.use_tls {
            SmtpTransport::starttls_relay(config.host.trim())
                .map_err(|e| AlertError::config(format!("TLS setup failed: {e}")))?
        } else {
            SmtpTransport::builder_dangerous(config.host.trim())
        };

        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(
                config.username.trim().to_string(),
                config.password.clone(),
            ))
            .timeout(Some(config.timeout))
            .build();

        Ok(Mailer { from, to, transport })
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &SmtpConfig {
        &self.config
    }

    /// Builds the MIME message for a notification.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::MessageBuild` if the channel is disabled or the
    /// message cannot be assembled.
    pub fn build_message(&self, notification: &Notification) -> Result<Message> {
        let mailer = self
            .mailer
            .as_ref()
            .ok_or_else(|| AlertError::MessageBuild("channel is disabled".to_string()))?;

        let mut builder = Message::builder()
            .from(mailer.from.clone())
            .subject(notification.subject.clone())
            .header(ContentType::TEXT_PLAIN);
        for recipient in &mailer.to {
            builder = builder.to(recipient.clone());
        }

        builder
            .body(notification.body.clone())
            .map_err(|e| AlertError::MessageBuild(e.to_string()))
    }
}

impl fmt::Debug for EmailChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailChannel")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl NotificationChannel for EmailChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, notification: &Notification) -> Result<NotificationResult> {
        let Some(mailer) = &self.mailer else {
            info!(
                channel = %self.name(),
                source = %notification.source.display(),
                lines = notification.line_count,
                "email alerts disabled, notification not sent"
            );
            return Ok(NotificationResult::success(self.name()).with_message("channel disabled"));
        };

        let message = self.build_message(notification)?;

        debug!(
            channel = %self.name(),
            host = %self.config.host,
            port = self.config.port,
            recipients = self.config.recipients.len(),
            "sending email notification"
        );

        let response = mailer
            .transport
            .send(&message)
            .map_err(|e| AlertError::Delivery {
                channel: self.name.clone(),
                reason: e.to_string(),
            })?;

        if !response.is_positive() {
            warn!(channel = %self.name(), code = %response.code(), "server rejected email");
            return Ok(NotificationResult::failure(
                self.name(),
                format!("server replied {}", response.code()),
            ));
        }

        info!(
            channel = %self.name(),
            source = %notification.source.display(),
            lines = notification.line_count,
            "email alert sent"
        );
        Ok(NotificationResult::success(self.name())
            .with_message(format!("accepted with code {}", response.code())))
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}
