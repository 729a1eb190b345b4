use std::sync::Arc;

use futures::stream::{self, StreamExt};
use thiserror::Error;

use crate::config::Config;
use crate::feed::{self, Feed, FeedRegistry, FetchError, Fetcher, ParseError, DEFAULT_ARTICLES};

/// Failure of a fetch-then-parse operation.
///
/// The two kinds are kept distinct: a caller can report "could not reach the
/// server" differently from "the server returned something that is not a feed".
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Outcome of one feed in [`FeedExtractor::fetch_all`].
#[derive(Debug)]
pub struct FetchOutcome {
    pub url: String,
    pub result: Result<Arc<Feed>, ExtractError>,
}

/// Explicit context for the feed engine: a [`Fetcher`] plus the
/// [`FeedRegistry`] of everything fetched through it.
///
/// Owned by the caller and shared by reference; nothing in the crate keeps
/// global state. A successful fetch or parse registers the feed under the URL
/// it came from. A failed one leaves the registry untouched.
#[derive(Debug)]
pub struct FeedExtractor {
    fetcher: Fetcher,
    registry: FeedRegistry,
    default_articles: u32,
}

impl FeedExtractor {
    pub fn new(fetcher: Fetcher) -> Self {
        Self {
            fetcher,
            registry: FeedRegistry::new(),
            default_articles: DEFAULT_ARTICLES,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        Ok(Self::new(Fetcher::from_config(config)?).with_default_articles(config.default_articles))
    }

    /// Sets the `articles` value given to feeds registered from now on.
    pub fn with_default_articles(mut self, articles: u32) -> Self {
        self.default_articles = articles;
        self
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    pub fn registry(&self) -> &FeedRegistry {
        &self.registry
    }

    /// Fetches `url`, parses the document and registers the result under `url`.
    ///
    /// Surrounding whitespace is trimmed first, so the key matches the URL requested.
    ///
    /// # Errors
    ///
    /// - [`ExtractError::Fetch`] - the document could not be retrieved
    /// - [`ExtractError::Parse`] - the document is not a usable RSS/Atom feed
    pub async fn fetch_feed(&self, url: &str) -> Result<Arc<Feed>, ExtractError> {
        let url = url.trim();
        let text = self.fetcher.fetch(url).await.inspect_err(|e| {
            tracing::warn!(url = %url, error = %e, "Failed to fetch feed");
        })?;
        let feed = self.parse_feed(&text, url)?;
        tracing::info!(
            url = %url,
            title = %feed.title,
            items = feed.items.len(),
            "Feed updated"
        );
        Ok(feed)
    }

    /// Parses an already retrieved document and registers it under `source_url`.
    pub fn parse_feed(&self, text: &str, source_url: &str) -> Result<Arc<Feed>, ParseError> {
        let source_url = source_url.trim();
        let mut parsed = feed::parse_feed(text, source_url).inspect_err(|e| {
            tracing::warn!(url = %source_url, error = %e, "Failed to parse feed");
        })?;
        parsed.articles = self.default_articles;

        let parsed = Arc::new(parsed);
        self.registry.insert(source_url, Arc::clone(&parsed));
        Ok(parsed)
    }

    /// Fetches several feeds with at most `concurrency` requests in flight.
    ///
    /// Results are returned in completion order, not input order. Feeds are
    /// independent: one failure does not affect the others.
    pub async fn fetch_all(&self, urls: &[String], concurrency: usize) -> Vec<FetchOutcome> {
        stream::iter(urls)
            .map(|url| async move {
                FetchOutcome {
                    url: url.clone(),
                    result: self.fetch_feed(url).await,
                }
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await
    }

    pub fn get_feed(&self, url: &str) -> Option<Arc<Feed>> {
        self.registry.get(url.trim())
    }

    pub fn get_all_feeds(&self) -> Vec<Arc<Feed>> {
        self.registry.get_all()
    }

    pub fn remove_feed(&self, url: &str) -> Option<Arc<Feed>> {
        self.registry.remove(url.trim())
    }

    pub fn set_articles(&self, url: &str, articles: u32) -> bool {
        self.registry.set_articles(url.trim(), articles)
    }

    /// JSON summary of every registered feed, see [`FeedRegistry::export`].
    pub fn export(&self) -> Result<String, serde_json::Error> {
        self.registry.export()
    }
}
