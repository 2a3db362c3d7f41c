use chrono::{DateTime, Utc};
use feed_rs::parser;

/// One entry of a parsed RSS/Atom feed, before cutoff selection.
#[derive(Debug, Clone)]
pub struct FeedEntry {
    pub title: String,
    pub link: Option<String>,
    /// The entry's publish timestamp. An entry that only carries `updated`
    /// has none.
    pub published: Option<DateTime<Utc>>,
    pub summary: Option<String>,
    pub content: Option<String>,
}

/// Parses RSS/Atom bytes into entries, preserving feed order.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<FeedEntry>, parser::ParseFeedError> {
    let feed = parser::parse(bytes)?;

    let entries = feed
        .entries
        .into_iter()
        .map(|entry| {
            let link = entry.links.first().map(|l| l.href.clone());
            let summary = entry.summary.map(|s| s.content);
            let content = entry.content.and_then(|c| c.body);
            let title = entry
                .title
                .map(|t| t.content)
                .unwrap_or_else(|| "Untitled".to_string());

            FeedEntry {
                title,
                link,
                published: entry.published,
                summary,
                content,
            }
        })
        .collect();

    Ok(entries)
}
