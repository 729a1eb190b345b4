//! Utility functions for common operations.
//!
//! This module provides reusable utilities for:
//!
//! - **URL validation**: Syntactic checks applied before a feed URL is handed to the relay
//! - **Text processing**: Whitespace normalization and control-character stripping for
//!   text pulled out of feed documents
//!
//! # Examples
//!
//! ```
//! use rss_extractor::util::{collapse_whitespace, validate_url};
//!
//! // Validate a feed URL
//! let url = validate_url("https://example.com/feed.xml").unwrap();
//!
//! // Normalize text extracted from markup
//! assert_eq!(collapse_whitespace("  Hello \n\t World "), "Hello World");
//! ```

mod text;
mod url_validator;

pub use text::{collapse_whitespace, strip_control_chars};
pub use url_validator::{validate_url, UrlValidationError};
