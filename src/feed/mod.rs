//! Subscription loading and feed retrieval.
//!
//! - [`opml`] - Parse an OPML file into an outline tree
//! - [`extract`] - Flatten the tree into feed references
//! - [`parser`] - RSS/Atom parsing using the `feed-rs` crate
//! - [`fetcher`] - Single-attempt HTTP retrieval with cutoff selection
//! - [`client`] - The shared `reqwest` client
//!
//! # Example
//!
//! ```ignore
//! use courier::feed::{build_client, extract_feeds, fetch_articles, load_opml, FetchLimits};
//!
//! let document = load_opml(Path::new("feeds.opml")).await?;
//! let client = build_client(Duration::from_secs(30), None)?;
//! for feed in extract_feeds(&document) {
//!     let articles = fetch_articles(&client, &feed.feed_url, None, FetchLimits::default()).await?;
//! }
//! ```

pub mod client;
pub mod extract;
pub mod fetcher;
pub mod opml;
pub mod parser;

pub use client::build_client;
pub use extract::{extract_feeds, FeedRef};
pub use fetcher::{fetch_articles, select_articles, Article, FetchError, FetchLimits};
pub use opml::{load as load_opml, OpmlDocument, OpmlError, Outline};
pub use parser::FeedEntry;
