//! Notification delivery
//!
//! [`SmtpNotifier`] sends plain-text mail through an SMTP relay using
//! lettre's tokio transport. [`LogNotifier`] is used when no relay is
//! configured and only records the notification in the log.

use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, info};

use lendr_core::{
    config::SmtpConfig,
    ports::{INotifier, Notification},
};

use crate::OutboundError;

/// Port for implicit-TLS submission; every other port negotiates STARTTLS
const IMPLICIT_TLS_PORT: u16 = 465;

/// Per-delivery SMTP timeout
const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// SmtpNotifier
// ============================================================================

/// `INotifier` backed by an SMTP relay
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    /// Builds a notifier from the `notify.smtp` configuration section
    ///
    /// No connection is opened until the first notification is sent.
    ///
    /// # Errors
    ///
    /// - `InvalidAddress` if `from_address` does not parse
    /// - `InvalidConfig` if a username is given without a password
    /// - `Smtp` if the relay host is rejected by the transport builder
    pub fn from_config(config: &SmtpConfig) -> Result<Self, OutboundError> {
        let address: Address = config.from_address.parse().map_err(|e| {
            OutboundError::InvalidAddress(format!("{}: {}", config.from_address, e))
        })?;
        let from = Mailbox::new(Some(config.from_name.clone()), address);

        let builder = if config.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .map_err(|e| OutboundError::Smtp(format!("{}: {}", config.host, e)))?
        .port(config.port)
        .timeout(Some(SMTP_TIMEOUT));

        let builder = match (&config.username, &config.password) {
            (Some(user), Some(password)) => {
                builder.credentials(Credentials::new(user.clone(), password.clone()))
            }
            (Some(user), None) => {
                return Err(OutboundError::InvalidConfig(format!(
                    "SMTP user {user} has no password"
                )));
            }
            _ => builder,
        };

        debug!(host = %config.host, port = config.port, "SMTP notifier configured");

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    /// Sender mailbox used for every message
    pub fn from_mailbox(&self) -> &Mailbox {
        &self.from
    }

    pub(crate) fn build_message(&self, notification: &Notification) -> Result<Message, OutboundError> {
        let to: Address = notification.recipient.as_str().parse().map_err(|e| {
            OutboundError::InvalidAddress(format!("{}: {}", notification.recipient, e))
        })?;

        Message::builder()
            .from(self.from.clone())
            .to(Mailbox::new(None, to))
            .subject(notification.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(notification.body.clone())
            .map_err(|e| OutboundError::InvalidMessage(e.to_string()))
    }
}

#[async_trait]
impl INotifier for SmtpNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        let message = self.build_message(notification)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| OutboundError::Smtp(e.to_string()))?;

        info!(recipient = %notification.recipient, subject = %notification.subject, "Mail sent");
        Ok(())
    }
}

// ============================================================================
// LogNotifier
// ============================================================================

/// `INotifier` that only logs, for setups without a mail relay
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl INotifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        info!(
            recipient = %notification.recipient,
            subject = %notification.subject,
            "Notification (no SMTP relay configured)"
        );
        debug!(body = %notification.body, "Notification body");
        Ok(())
    }
}
