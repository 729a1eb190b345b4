//! Fetch RSS 2.0 and Atom feeds and normalize them into one feed model.
//!
//! The entry point is [`FeedExtractor`]: it retrieves a document through a
//! relay with [`feed::Fetcher`], parses it with [`feed::parse_feed`] and keeps
//! the result in a [`feed::FeedRegistry`] keyed by URL.
//!
//! ```ignore
//! use rss_extractor::{Config, FeedExtractor};
//!
//! let extractor = FeedExtractor::from_config(&Config::default())?;
//! let feed = extractor.fetch_feed("https://blog.cloudflare.com/rss/").await?;
//! println!("{} ({} items)", feed.title, feed.items.len());
//! println!("{}", extractor.export()?);
//! ```

pub mod config;
pub mod extractor;
pub mod feed;
pub mod util;

pub use config::{Config, ConfigError};
pub use extractor::{ExtractError, FeedExtractor, FetchOutcome};
pub use feed::{Feed, FeedItem};
