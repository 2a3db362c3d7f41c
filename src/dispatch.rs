//! Mails the produced digests to the configured inbox.
//!
//! All artifacts of a run go out as `text/html` attachments on a single
//! message. Transfer encoding is left to `lettre`. A failed send is reported
//! to the caller and never retried.

use crate::config::{EmailConfig, SmtpSecurity};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Invalid email address '{address}': {source}")]
    Address {
        address: String,
        source: lettre::address::AddressError,
    },

    #[error("Failed to read attachment '{}': {source}", .path.display())]
    Attachment {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Result of a dispatch attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No artifacts, so no message was sent.
    Skipped,
    Sent { attachments: usize },
}

/// Sends digest artifacts over SMTP.
pub struct SmtpDispatcher {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
    subject: String,
}

impl SmtpDispatcher {
    /// Validates addresses and prepares the SMTP transport. No connection is
    /// made until [`SmtpDispatcher::send`].
    pub fn from_config(config: &EmailConfig) -> Result<Self, DispatchError> {
        let from = parse_mailbox(&config.from)?;
        let to = parse_mailbox(&config.recipient)?;

        let host = config.smtp_host.trim();
        let mut builder = match config.security {
            SmtpSecurity::Starttls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?,
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(host)?,
            SmtpSecurity::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
        }
        .port(config.smtp_port);

        if let Some(username) = &config.username {
            let password = config
                .secret_password()
                .unwrap_or_else(|| SecretString::from(String::new()));
            builder = builder.credentials(Credentials::new(
                username.clone(),
                password.expose_secret().to_string(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            to,
            subject: config.subject.clone(),
        })
    }

    /// Builds the outgoing message: an empty text part followed by one HTML
    /// attachment per file, named after the file.
    pub async fn build_message(&self, files: &[PathBuf]) -> Result<Message, DispatchError> {
        let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(String::new()));

        for path in files {
            tracing::info!(path = %path.display(), "Processing file");
            let body = tokio::fs::read(path)
                .await
                .map_err(|source| DispatchError::Attachment {
                    path: path.clone(),
                    source,
                })?;
            let attachment =
                Attachment::new(attachment_name(path)).body(body, ContentType::TEXT_HTML);
            parts = parts.singlepart(attachment);
        }

        let message = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(self.subject.clone())
            .multipart(parts)?;
        Ok(message)
    }

    /// Sends every artifact in one message. With no artifacts nothing is
    /// sent.
    pub async fn send(&self, files: &[PathBuf]) -> Result<DispatchOutcome, DispatchError> {
        if files.is_empty() {
            tracing::info!("No digests produced, skipping email");
            return Ok(DispatchOutcome::Skipped);
        }

        let message = self.build_message(files).await?;
        tracing::info!(attachments = files.len(), to = %self.to, "Sending email");

        let response = self.transport.send(message).await?;
        tracing::info!(
            code = %response.code(),
            attachments = files.len(),
            "Email sent successfully"
        );

        Ok(DispatchOutcome::Sent {
            attachments: files.len(),
        })
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, DispatchError> {
    address
        .trim()
        .parse()
        .map_err(|source| DispatchError::Address {
            address: address.to_string(),
            source,
        })
}

fn attachment_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "digest.html".to_string())
}
