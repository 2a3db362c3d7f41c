use crate::feed::parser::{parse_feed, FeedEntry};
use crate::util::validate_url;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while fetching a single feed.
///
/// Every variant is recovered by the pipeline: the feed contributes no
/// articles and the run moves on to the next feed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Feed URL is unparseable or not http(s)
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(String),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// Feed XML could not be parsed as RSS or Atom
    #[error("Parse error: {0}")]
    Parse(String),
    /// Response body exceeded the size limit
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Bounds applied to every feed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchLimits {
    pub timeout: Duration,
    pub max_feed_size: usize,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_feed_size: DEFAULT_MAX_FEED_SIZE,
        }
    }
}

/// A feed entry selected for the digest.
///
/// Optional entry fields are flattened to empty strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub link: String,
    pub summary: String,
    pub content: String,
}

impl From<FeedEntry> for Article {
    fn from(entry: FeedEntry) -> Self {
        Self {
            title: entry.title,
            link: entry.link.unwrap_or_default(),
            summary: entry.summary.unwrap_or_default(),
            content: entry.content.unwrap_or_default(),
        }
    }
}

/// Fetches a feed and returns its entries newer than `cutoff`.
///
/// A single attempt is made. With `cutoff` set, only entries whose publish
/// timestamp is strictly later than it are returned; undated entries are
/// dropped. Without a cutoff every entry is returned. Feed order is kept.
///
/// # Errors
///
/// - [`FetchError::InvalidUrl`] - URL does not parse or is not http(s)
/// - [`FetchError::Timeout`] - Request exceeded `limits.timeout`
/// - [`FetchError::Network`] - Connection or TLS errors
/// - [`FetchError::HttpStatus`] - Non-2xx HTTP response
/// - [`FetchError::ResponseTooLarge`] - Body exceeded `limits.max_feed_size`
/// - [`FetchError::IncompleteResponse`] - Body shorter than Content-Length
/// - [`FetchError::Parse`] - Invalid RSS/Atom XML
pub async fn fetch_articles(
    client: &reqwest::Client,
    url: &str,
    cutoff: Option<DateTime<Utc>>,
    limits: FetchLimits,
) -> Result<Vec<Article>, FetchError> {
    let url = validate_url(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

    let bytes = tokio::time::timeout(
        limits.timeout,
        fetch_bytes(client, url.as_str(), limits.max_feed_size),
    )
    .await
    .map_err(|_| FetchError::Timeout(limits.timeout))??;

    let entries = parse_feed(&bytes).map_err(|e| FetchError::Parse(e.to_string()))?;
    let total = entries.len();
    let articles = select_articles(entries, cutoff);

    tracing::debug!(
        feed = %url,
        entries = total,
        selected = articles.len(),
        "Fetched feed"
    );

    Ok(articles)
}

/// Applies the cutoff rule to parsed entries, keeping feed order.
pub fn select_articles(entries: Vec<FeedEntry>, cutoff: Option<DateTime<Utc>>) -> Vec<Article> {
    entries
        .into_iter()
        .filter(|entry| match cutoff {
            Some(cutoff) => entry.published.is_some_and(|published| published > cutoff),
            None => true,
        })
        .map(Article::from)
        .collect()
}

async fn fetch_bytes(
    client: &reqwest::Client,
    url: &str,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let response = client.get(url).send().await?;

    // Single attempt: any non-2xx status fails the feed for this run
    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    read_limited_bytes(response, limit).await
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Capture Content-Length for completeness check
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    // EDGE-005: Network interruptions can end the stream early
    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
