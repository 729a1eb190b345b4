use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::Serialize;

use super::model::Feed;

/// Feeds registered in this process, keyed by the URL they were fetched from.
///
/// At most one feed per URL; registering a URL again replaces the feed but
/// keeps the URL's original position, so iteration follows first insertion.
/// Entries live until [`remove`](Self::remove) or drop, there is no eviction.
///
/// All methods take `&self` and lock internally, so one registry can be shared
/// between concurrent fetch tasks. Writes for the same URL are last-write-wins.
#[derive(Debug, Default)]
pub struct FeedRegistry {
    feeds: RwLock<IndexMap<String, Arc<Feed>>>,
}

/// Size-reduced view of a registered feed: scalar fields plus an item count.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSummary {
    pub title: String,
    pub description: String,
    pub link: String,
    pub last_updated: DateTime<Utc>,
    /// Number of items, not the items themselves.
    pub items: usize,
    pub articles: u32,
}

impl From<&Feed> for FeedSummary {
    fn from(feed: &Feed) -> Self {
        Self {
            title: feed.title.clone(),
            description: feed.description.clone(),
            link: feed.link.clone(),
            last_updated: feed.last_updated,
            items: feed.items.len(),
            articles: feed.articles,
        }
    }
}

impl FeedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `feed` under `url`, returning the feed it replaced.
    pub fn insert(&self, url: impl Into<String>, feed: impl Into<Arc<Feed>>) -> Option<Arc<Feed>> {
        let url = url.into();
        let previous = self.feeds.write().insert(url.clone(), feed.into());
        if previous.is_some() {
            tracing::debug!(url = %url, "Replaced registered feed");
        }
        previous
    }

    pub fn get(&self, url: &str) -> Option<Arc<Feed>> {
        self.feeds.read().get(url).cloned()
    }

    /// All feeds in insertion order.
    pub fn get_all(&self) -> Vec<Arc<Feed>> {
        self.feeds.read().values().cloned().collect()
    }

    pub fn urls(&self) -> Vec<String> {
        self.feeds.read().keys().cloned().collect()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.feeds.read().contains_key(url)
    }

    /// Removes the feed registered under `url`, preserving the order of the rest.
    pub fn remove(&self, url: &str) -> Option<Arc<Feed>> {
        self.feeds.write().shift_remove(url)
    }

    /// Changes the display window of a registered feed.
    ///
    /// Returns `false` when no feed is registered under `url`.
    pub fn set_articles(&self, url: &str, articles: u32) -> bool {
        let mut feeds = self.feeds.write();
        match feeds.get_mut(url) {
            Some(feed) => {
                Arc::make_mut(feed).articles = articles;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.feeds.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.read().is_empty()
    }

    /// Per-URL summaries in insertion order.
    pub fn summaries(&self) -> IndexMap<String, FeedSummary> {
        self.feeds
            .read()
            .iter()
            .map(|(url, feed)| (url.clone(), FeedSummary::from(feed.as_ref())))
            .collect()
    }

    /// Pretty-printed JSON mapping each URL to its [`FeedSummary`].
    pub fn export(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.summaries())
    }
}
