//! Configuration file parser for ~/.config/courier/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde (with `deny_unknown_fields` off),
//! though we log a warning when the file contains potential typos.
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::feed::FetchLimits;
use crate::pipeline::PipelineConfig;

/// Overrides `email.password` when set.
pub const SMTP_PASSWORD_ENV: &str = "COURIER_SMTP_PASSWORD";
/// Overrides `email.recipient` when set.
pub const RECIPIENT_ENV: &str = "COURIER_RECIPIENT";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// Values parse but cannot be used.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// OPML subscription list.
    pub opml_path: PathBuf,

    /// Directory receiving the generated digests. Created if missing.
    pub output_dir: PathBuf,

    /// Only entries published strictly after this instant are kept.
    /// RFC 3339 string, e.g. `"2024-05-01T08:00:00Z"`.
    pub published_after: Option<DateTime<Utc>>,

    /// Relative cutoff used when `published_after` is absent.
    pub lookback_hours: Option<u64>,

    /// Per-feed request timeout in seconds.
    pub fetch_timeout_secs: u64,

    /// Maximum accepted feed body size in bytes.
    pub max_feed_bytes: usize,

    /// User-Agent header for feed requests.
    pub user_agent: Option<String>,

    /// Delivery settings. Without them the run only writes files.
    pub email: Option<EmailConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let limits = FetchLimits::default();
        Self {
            opml_path: PathBuf::from("feeds.opml"),
            output_dir: PathBuf::from("digests"),
            published_after: None,
            lookback_hours: None,
            fetch_timeout_secs: limits.timeout.as_secs(),
            max_feed_bytes: limits.max_feed_size,
            user_agent: None,
            email: None,
        }
    }
}

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// Plain connection upgraded with STARTTLS (port 587).
    #[default]
    Starttls,
    /// Implicit TLS (port 465).
    Tls,
    /// No encryption. Only for local relays and tests.
    None,
}

/// SMTP delivery settings for the `[email]` table.
///
/// SEC-015: Custom Debug impl masks `password` to prevent secret leakage
/// in logs, error messages, and debug output.
#[derive(Clone, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default)]
    pub security: SmtpSecurity,

    #[serde(default)]
    pub username: Option<String>,

    /// SMTP password (alternative to the `COURIER_SMTP_PASSWORD` env var).
    /// Env var takes precedence over config file.
    #[serde(default)]
    pub password: Option<String>,

    /// Sender address.
    pub from: String,

    /// Reading-device inbox. `COURIER_RECIPIENT` takes precedence.
    #[serde(default)]
    pub recipient: String,

    #[serde(default = "default_subject")]
    pub subject: String,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_subject() -> String {
    "Kindle Courier Daily Digest".to_string()
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("security", &self.security)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("from", &self.from)
            .field("recipient", &self.recipient)
            .field("subject", &self.subject)
            .finish()
    }
}

impl EmailConfig {
    /// The SMTP password, wrapped so it stays out of logs once loaded.
    pub fn secret_password(&self) -> Option<SecretString> {
        self.password.clone().map(SecretString::from)
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    ///
    /// Environment overrides are not applied here; see
    /// [`Config::apply_env_overrides`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading to prevent memory exhaustion
        // from a maliciously large or corrupted config file.
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {} // Size is within limits, proceed
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        // Parse the TOML content first as a raw table to detect unknown keys
        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = [
                "opml_path",
                "output_dir",
                "published_after",
                "lookback_hours",
                "fetch_timeout_secs",
                "max_feed_bytes",
                "user_agent",
                "email",
            ];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            opml = %config.opml_path.display(),
            output = %config.output_dir.display(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Applies `COURIER_SMTP_PASSWORD` and `COURIER_RECIPIENT` from the
    /// process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from `lookup`; empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let Some(email) = self.email.as_mut() else {
            return;
        };
        if let Some(password) = lookup(SMTP_PASSWORD_ENV).filter(|v| !v.is_empty()) {
            email.password = Some(password);
        }
        if let Some(recipient) = lookup(RECIPIENT_ENV).filter(|v| !v.trim().is_empty()) {
            email.recipient = recipient.trim().to_string();
        }
    }

    /// Rejects values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "fetch_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.max_feed_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_feed_bytes must be greater than 0".to_string(),
            ));
        }
        if let Some(email) = &self.email {
            if email.smtp_host.trim().is_empty() {
                return Err(ConfigError::Invalid("email.smtp_host is empty".to_string()));
            }
            if email.from.trim().is_empty() {
                return Err(ConfigError::Invalid("email.from is empty".to_string()));
            }
            if email.recipient.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "email.recipient is empty (set it in the config or via {RECIPIENT_ENV})"
                )));
            }
        }
        Ok(())
    }

    /// Resolves the cutoff for a run starting at `now`.
    ///
    /// `published_after` wins; otherwise `lookback_hours` counts back from
    /// `now`; with neither, every entry qualifies.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if let Some(at) = self.published_after {
            return Some(at);
        }
        self.lookback_hours.map(|hours| {
            let hours = i64::try_from(hours).unwrap_or(i64::MAX);
            ChronoDuration::try_hours(hours)
                .and_then(|d| now.checked_sub_signed(d))
                .unwrap_or(DateTime::<Utc>::MIN_UTC)
        })
    }

    pub fn fetch_limits(&self) -> FetchLimits {
        FetchLimits {
            timeout: Duration::from_secs(self.fetch_timeout_secs),
            max_feed_size: self.max_feed_bytes,
        }
    }

    /// Builds the pipeline settings for a run starting at `now`.
    pub fn pipeline_config(&self, now: DateTime<Utc>) -> PipelineConfig {
        PipelineConfig {
            opml_path: self.opml_path.clone(),
            output_dir: self.output_dir.clone(),
            cutoff: self.cutoff(now),
            limits: self.fetch_limits(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
