//! Feed retrieval and normalization.
//!
//! This module provides the core functionality for working with RSS and Atom feeds:
//!
//! - **Fetching**: One HTTP GET per feed through a configurable relay
//! - **Parsing**: RSS 2.0 / Atom XML into the uniform [`Feed`] / [`FeedItem`] model
//! - **Registry**: The set of feeds fetched so far, keyed by URL, with a JSON export
//!
//! # Architecture
//!
//! - [`fetcher`] - HTTP retrieval with a body size limit, no retries
//! - [`parser`] - Dialect detection and per-field extraction with graceful defaults
//! - [`registry`] - In-memory URL → feed map shared between fetch tasks
//! - `xml`, `dialect`, `html`, `date` - Parser building blocks
//!
//! # Example
//!
//! ```ignore
//! use rss_extractor::feed::{parse_feed, Fetcher, FeedRegistry};
//!
//! let text = fetcher.fetch(url).await?;
//! let feed = parse_feed(&text, url)?;
//! registry.insert(url, feed);
//! ```

mod date;
mod dialect;
pub mod fetcher;
mod html;
mod model;
pub mod parser;
pub mod registry;
mod xml;

pub use date::parse_date;
pub use dialect::Dialect;
pub use fetcher::{FetchError, Fetcher};
pub use html::html_to_text;
pub use model::{Feed, FeedItem, DEFAULT_ARTICLES, UNTITLED_ITEM};
pub use parser::{parse_feed, ParseError};
pub use registry::{FeedRegistry, FeedSummary};
pub use xml::XmlError;
