use chrono::{DateTime, Utc};
use serde::Serialize;

use super::dialect::Dialect;

/// Number of articles a freshly parsed feed shows by default.
pub const DEFAULT_ARTICLES: u32 = 5;

/// Placeholder title for items whose source omits one.
pub const UNTITLED_ITEM: &str = "No title";

/// One subscribed source, normalized from RSS or Atom.
///
/// Created once per successful parse. Only `articles` is meant to change
/// afterwards, and only by the presentation layer through
/// [`FeedRegistry::set_articles`](crate::feed::FeedRegistry::set_articles).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Feed {
    pub title: String,
    pub description: String,
    /// Site link; the source URL when the document has none.
    pub link: String,
    pub dialect: Dialect,
    /// Entries in document order.
    pub items: Vec<FeedItem>,
    /// Wall-clock time the document was parsed.
    pub last_updated: DateTime<Utc>,
    /// Display window size. Does not affect parsing.
    pub articles: u32,
}

/// One entry within a feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    /// Native id/guid, else the link, else a synthesized token. Never empty.
    pub id: String,
    pub title: String,
    /// Empty string when the item has no link.
    pub link: String,
    /// Plain text extracted from the HTML description or content.
    pub description: String,
    /// Empty string when absent.
    pub author: String,
    pub categories: Vec<String>,
    pub publish_date: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
}
