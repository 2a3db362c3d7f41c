use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;

use courier::dispatch::{DispatchOutcome, SmtpDispatcher};
use courier::feed::build_client;
use courier::pipeline::{FeedStatus, Pipeline};
use courier::Config;

/// Get the default config path (~/.config/courier/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("courier")
        .join("config.toml"))
}

#[derive(Parser, Debug)]
#[command(
    name = "courier",
    about = "Builds HTML digests from OPML feeds and mails them to your reader"
)]
struct Args {
    /// Config file (defaults to ~/.config/courier/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write digests but do not send email
    #[arg(long)]
    no_send: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config '{}'", config_path.display()))?;
    config.apply_env_overrides();
    config.validate().context("Invalid configuration")?;
    tracing::debug!(config = ?config, "Configuration loaded");

    let client = build_client(
        config.fetch_limits().timeout,
        config.user_agent.as_deref(),
    )
    .context("Failed to build HTTP client")?;

    let pipeline = Pipeline::new(config.pipeline_config(Utc::now()), client);
    let report = pipeline.run().await;

    for outcome in &report.outcomes {
        match &outcome.status {
            FeedStatus::Written { path, articles } => tracing::info!(
                title = %outcome.feed.title,
                path = %path.display(),
                articles,
                "Digest written"
            ),
            FeedStatus::NoNewArticles => {}
            FeedStatus::FetchFailed(e) => tracing::warn!(
                title = %outcome.feed.title,
                error = %e,
                "Feed skipped"
            ),
            FeedStatus::WriteFailed(e) => tracing::warn!(
                title = %outcome.feed.title,
                error = %e,
                "Digest not saved"
            ),
        }
    }

    if args.no_send {
        tracing::info!(artifacts = report.artifacts.len(), "--no-send given, skipping email");
        return Ok(());
    }

    let Some(email) = &config.email else {
        tracing::info!("No [email] section configured, skipping email");
        return Ok(());
    };

    // Delivery problems are reported, never fatal
    let result = match SmtpDispatcher::from_config(email) {
        Ok(dispatcher) => dispatcher.send(&report.artifacts).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(DispatchOutcome::Sent { attachments }) => {
            tracing::info!(attachments, "Digests delivered");
        }
        Ok(DispatchOutcome::Skipped) => {}
        Err(e) => tracing::error!(error = %e, "Error sending email"),
    }

    Ok(())
}
