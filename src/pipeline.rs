//! One digest run: load → extract → (fetch → render → write) per feed.
//!
//! Per-feed failures never abort the run. Each stage returns a `Result`, and
//! the driver folds them into a [`RunReport`] so callers (and tests) can
//! inspect exactly what happened to every feed.

use crate::digest::{render_digest, ArtifactWriter, WriteError};
use crate::feed::{
    extract_feeds, fetch_articles, load_opml, FeedRef, FetchError, FetchLimits, OpmlError,
};
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;

/// Inputs for one run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub opml_path: PathBuf,
    pub output_dir: PathBuf,
    /// Entries must be published strictly after this instant. `None` keeps
    /// every entry.
    pub cutoff: Option<DateTime<Utc>>,
    pub limits: FetchLimits,
}

/// Driver state, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Idle,
    Loading,
    PerFeedProcessing,
    Done,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStage::Idle => "idle",
            RunStage::Loading => "loading",
            RunStage::PerFeedProcessing => "per-feed-processing",
            RunStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// What happened to one feed.
#[derive(Debug)]
pub enum FeedStatus {
    /// Digest saved with this many articles.
    Written { path: PathBuf, articles: usize },
    /// Fetched fine but nothing qualified; no file was written.
    NoNewArticles,
    FetchFailed(FetchError),
    /// Articles were selected but the digest could not be saved. The feed is
    /// skipped and the run continues.
    WriteFailed(WriteError),
}

#[derive(Debug)]
pub struct FeedOutcome {
    pub feed: FeedRef,
    pub status: FeedStatus,
}

/// Result of a run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Set when the subscription file could not be loaded; the run then
    /// processed zero feeds.
    pub load_error: Option<OpmlError>,
    pub feeds_found: usize,
    /// Saved digests in extraction order. This is what dispatch consumes.
    pub artifacts: Vec<PathBuf>,
    /// One entry per extracted feed, in extraction order.
    pub outcomes: Vec<FeedOutcome>,
}

impl RunReport {
    pub fn fetch_failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, FeedStatus::FetchFailed(_)))
            .count()
    }

    pub fn write_failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, FeedStatus::WriteFailed(_)))
            .count()
    }

    /// True when no digest was produced, whatever the reason.
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

/// Runs the digest pipeline for one invocation.
pub struct Pipeline {
    config: PipelineConfig,
    client: reqwest::Client,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    /// Executes the run. Never fails: load, fetch and write errors are
    /// recorded in the returned report.
    pub async fn run(&self) -> RunReport {
        let mut report = RunReport::default();
        tracing::debug!(stage = %RunStage::Idle, "Starting digest run");

        tracing::debug!(
            stage = %RunStage::Loading,
            path = %self.config.opml_path.display(),
            "Loading subscriptions"
        );
        let document = match load_opml(&self.config.opml_path).await {
            Ok(document) => document,
            Err(e) => {
                tracing::error!(
                    path = %self.config.opml_path.display(),
                    error = %e,
                    "Error loading OPML file, no feeds to process"
                );
                report.load_error = Some(e);
                tracing::info!(stage = %RunStage::Done, artifacts = 0, "Digest run finished");
                return report;
            }
        };

        let feeds = extract_feeds(&document);
        report.feeds_found = feeds.len();
        tracing::info!(
            stage = %RunStage::PerFeedProcessing,
            opml_title = document.title.as_deref().unwrap_or("(untitled)"),
            feeds = feeds.len(),
            cutoff = ?self.config.cutoff,
            "Total feeds found"
        );
        for feed in &feeds {
            tracing::debug!(title = %feed.title, url = %feed.feed_url, "Feed");
        }

        let mut writer = ArtifactWriter::new(&self.config.output_dir);
        for feed in feeds {
            let status = self.process_feed(&feed, &mut writer).await;
            if let FeedStatus::Written { path, .. } = &status {
                report.artifacts.push(path.clone());
            }
            report.outcomes.push(FeedOutcome { feed, status });
        }

        tracing::info!(
            stage = %RunStage::Done,
            artifacts = report.artifacts.len(),
            fetch_failures = report.fetch_failures(),
            write_failures = report.write_failures(),
            "Digest run finished"
        );
        report
    }

    async fn process_feed(&self, feed: &FeedRef, writer: &mut ArtifactWriter) -> FeedStatus {
        let articles = match fetch_articles(
            &self.client,
            &feed.feed_url,
            self.config.cutoff,
            self.config.limits,
        )
        .await
        {
            Ok(articles) => articles,
            Err(e) => {
                tracing::warn!(
                    title = %feed.title,
                    url = %feed.feed_url,
                    error = %e,
                    "Error fetching feed articles"
                );
                return FeedStatus::FetchFailed(e);
            }
        };

        // Empty digests are never written or mailed
        if articles.is_empty() {
            tracing::info!(title = %feed.title, "No new articles");
            return FeedStatus::NoNewArticles;
        }

        tracing::info!(title = %feed.title, articles = articles.len(), "New articles");
        for article in &articles {
            tracing::debug!(title = %article.title, link = %article.link, "Article");
        }

        let html = render_digest(&feed.title, &articles);
        match writer.write(&feed.title, &feed.feed_url, &html) {
            Ok(path) => FeedStatus::Written {
                path,
                articles: articles.len(),
            },
            Err(e) => {
                tracing::error!(
                    title = %feed.title,
                    error = %e,
                    "Failed to save digest, skipping feed"
                );
                FeedStatus::WriteFailed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: &str) -> PipelineConfig {
        let dir = std::env::temp_dir().join(format!("courier_pipeline_unit_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        PipelineConfig {
            opml_path: dir.join("feeds.opml"),
            output_dir: dir.join("out"),
            cutoff: None,
            limits: FetchLimits::default(),
        }
    }

    #[tokio::test]
    async fn test_missing_opml_is_empty_run() {
        let pipeline = Pipeline::new(config("missing"), reqwest::Client::new());
        let report = pipeline.run().await;

        assert!(matches!(report.load_error, Some(OpmlError::Io(_))));
        assert_eq!(report.feeds_found, 0);
        assert!(report.is_empty());
        assert!(report.outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_opml_is_empty_run() {
        let cfg = config("malformed");
        std::fs::create_dir_all(cfg.opml_path.parent().unwrap()).unwrap();
        std::fs::write(&cfg.opml_path, "<opml><body><outline").unwrap();

        let report = Pipeline::new(cfg.clone(), reqwest::Client::new()).run().await;
        assert!(report.load_error.is_some());
        assert!(report.is_empty());
        // Nothing attempted, so the output directory is never created
        assert!(!cfg.output_dir.exists());

        std::fs::remove_dir_all(cfg.opml_path.parent().unwrap()).ok();
    }

    #[tokio::test]
    async fn test_feedless_opml_is_empty_run() {
        let cfg = config("feedless");
        std::fs::create_dir_all(cfg.opml_path.parent().unwrap()).unwrap();
        std::fs::write(
            &cfg.opml_path,
            r#"<opml version="2.0"><body><outline text="Empty folder"/></body></opml>"#,
        )
        .unwrap();

        let report = Pipeline::new(cfg.clone(), reqwest::Client::new()).run().await;
        assert!(report.load_error.is_none());
        assert_eq!(report.feeds_found, 0);
        assert!(report.is_empty());

        std::fs::remove_dir_all(cfg.opml_path.parent().unwrap()).ok();
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(RunStage::PerFeedProcessing.to_string(), "per-feed-processing");
        assert_eq!(RunStage::Done.to_string(), "done");
    }
}
