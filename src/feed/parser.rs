use std::collections::HashSet;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::date::parse_date;
use super::dialect::{Dialect, FieldMap, LinkSource};
use super::html::html_to_text;
use super::model::{Feed, FeedItem, DEFAULT_ARTICLES, UNTITLED_ITEM};
use super::xml::{parse_document, Element, XmlError};
use crate::util::{collapse_whitespace, strip_control_chars};

/// Length of the token in synthesized item ids.
const ID_TOKEN_LEN: usize = 13;
const ID_TOKEN_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Errors that abort a whole parse.
///
/// Only structural problems end up here; a missing or malformed field inside
/// an item falls back to its default instead.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The document is not well-formed XML.
    #[error("invalid XML: {0}")]
    InvalidXml(#[from] XmlError),
    /// Well-formed XML without an RSS `channel` or Atom `feed`.
    #[error("unrecognized feed format")]
    UnrecognizedFormat,
}

/// Parses an RSS 2.0 or Atom document into a normalized [`Feed`].
///
/// `source_url` is the URL the document was fetched from; it becomes the feed
/// link when the document carries none and seeds synthesized item ids.
///
/// Items keep document order and are neither sorted, deduplicated nor
/// truncated. `last_updated` is set to the current time and `articles` to
/// [`DEFAULT_ARTICLES`].
///
/// # Errors
///
/// - [`ParseError::InvalidXml`] if `content` is not well-formed
/// - [`ParseError::UnrecognizedFormat`] if there is no `channel` or `feed` near the root
pub fn parse_feed(content: &str, source_url: &str) -> Result<Feed, ParseError> {
    let root = parse_document(content)?;
    let (dialect, container) = Dialect::detect(&root).ok_or(ParseError::UnrecognizedFormat)?;
    let fields = dialect.fields();

    // `<atom:feed>` documents are read as if their own prefix were absent
    let unprefixed;
    let container = match container.prefix() {
        Some(prefix) if dialect == Dialect::Atom => {
            unprefixed = container.without_prefix(prefix);
            &unprefixed
        }
        _ => container,
    };

    let title = container.child("title").map(clean_text).unwrap_or_default();
    let link = match fields.link {
        LinkSource::Text => container.child("link").map(clean_text),
        LinkSource::Href => preferred_href(container.children_named("link")),
    }
    .filter(|link| !link.is_empty())
    .unwrap_or_else(|| source_url.to_string());
    let description = container
        .child(fields.channel_description)
        .map(markup_text)
        .unwrap_or_default();
    // Atom entries inherit the feed author when they have none of their own
    let feed_author = match dialect {
        Dialect::Atom => find_path(container, &["author", "name"], true).unwrap_or_default(),
        Dialect::Rss => String::new(),
    };

    let scope = if fields.items_document_wide { &root } else { container };
    let mut ids = IdAllocator::new(source_url, &title);
    let items: Vec<FeedItem> = scope
        .find_all(fields.item)
        .into_iter()
        .enumerate()
        .map(|(index, item)| parse_item(item, fields, &feed_author, index, &mut ids))
        .collect();

    tracing::debug!(
        url = %source_url,
        dialect = %dialect,
        items = items.len(),
        "Parsed feed"
    );

    Ok(Feed {
        title,
        description,
        link,
        dialect,
        items,
        last_updated: Utc::now(),
        articles: DEFAULT_ARTICLES,
    })
}

fn parse_item(
    item: &Element,
    fields: &FieldMap,
    feed_author: &str,
    index: usize,
    ids: &mut IdAllocator<'_>,
) -> FeedItem {
    let title = item
        .find("title")
        .map(clean_text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED_ITEM.to_string());

    let link = match fields.link {
        LinkSource::Text => item.find("link").map(clean_text),
        LinkSource::Href => preferred_href(item.find_all("link").into_iter()),
    }
    .unwrap_or_default();

    let native_id = item.find(fields.id).map(clean_text);
    let id = ids.resolve(native_id, &link, index, &title);

    let description = fields
        .description
        .iter()
        .filter_map(|name| item.find(name))
        .map(markup_text)
        .find(|text| !text.is_empty())
        .unwrap_or_default();

    let author = fields
        .author
        .iter()
        .find_map(|path| find_path(item, path, false))
        .unwrap_or_else(|| feed_author.to_string());

    let categories = item
        .find_all("category")
        .into_iter()
        .filter_map(|el| {
            let text = clean_text(el);
            if !text.is_empty() {
                return Some(text);
            }
            fields
                .category_attr
                .and_then(|attr| el.attr(attr))
                .map(|value| collapse_whitespace(value).into_owned())
                .filter(|value| !value.is_empty())
        })
        .collect();

    let publish_date = fields
        .date
        .iter()
        .filter_map(|name| item.find(name))
        .find_map(|el| parse_date(Some(&el.text())));

    FeedItem {
        id,
        title,
        link,
        description,
        author,
        categories,
        publish_date,
        image_url: extract_image_url(item),
    }
}

/// Best-effort item image: media namespace, then an image enclosure, then an
/// RSS `<image><url>`.
fn extract_image_url(item: &Element) -> Option<String> {
    let media = item
        .find_any(&["media:content", "media:thumbnail"])
        .and_then(|el| attr_value(el, "url"));
    if media.is_some() {
        return media;
    }

    let enclosure = item
        .find_all("enclosure")
        .into_iter()
        .find(|el| {
            el.attr("type")
                .is_some_and(|t| t.trim().to_ascii_lowercase().starts_with("image/"))
        })
        .and_then(|el| attr_value(el, "url"));
    if enclosure.is_some() {
        return enclosure;
    }

    item.find("image")
        .and_then(|image| image.find("url"))
        .map(clean_text)
        .filter(|url| !url.is_empty())
}

/// `href` of the `rel="alternate"` (or rel-less) link, else of the first link with an `href`.
fn preferred_href<'a>(links: impl Iterator<Item = &'a Element>) -> Option<String> {
    let links: Vec<&Element> = links.filter(|el| attr_value(el, "href").is_some()).collect();
    links
        .iter()
        .find(|el| matches!(el.attr("rel").map(str::trim), None | Some("alternate")))
        .or_else(|| links.first())
        .and_then(|el| attr_value(el, "href"))
}

/// Walks `path` one lookup at a time and returns the cleaned text at its end.
/// The first step is a direct-child lookup when `direct` is set.
fn find_path(start: &Element, path: &[&str], direct: bool) -> Option<String> {
    let (first, rest) = path.split_first()?;
    let mut current = if direct { start.child(first)? } else { start.find(first)? };
    for name in rest {
        current = current.find(name)?;
    }
    Some(clean_text(current)).filter(|text| !text.is_empty())
}

fn attr_value(el: &Element, name: &str) -> Option<String> {
    el.attr(name)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Plain text of a field that may hold HTML, whether escaped, in CDATA or
/// written as child elements (Atom `type="xhtml"`).
fn markup_text(el: &Element) -> String {
    if el.child_elements().next().is_some() {
        html_to_text(&el.inner_markup())
    } else {
        html_to_text(&el.text())
    }
}

fn clean_text(el: &Element) -> String {
    collapse_whitespace(&strip_control_chars(&el.text())).into_owned()
}

/// Resolves item ids: native id, else link, else `<feed title>-<token>`.
///
/// Tokens come from a PRNG seeded with a SHA-256 of the feed URL, feed title,
/// item position and item title, so the same document always yields the same
/// ids. A token that collides with an id already handed out is redrawn.
struct IdAllocator<'a> {
    source_url: &'a str,
    feed_title: &'a str,
    used: HashSet<String>,
}

impl<'a> IdAllocator<'a> {
    fn new(source_url: &'a str, feed_title: &'a str) -> Self {
        Self {
            source_url,
            feed_title,
            used: HashSet::new(),
        }
    }

    fn resolve(&mut self, native: Option<String>, link: &str, index: usize, title: &str) -> String {
        let id = native
            .filter(|id| !id.is_empty())
            .or_else(|| (!link.is_empty()).then(|| link.to_string()))
            .unwrap_or_else(|| self.synthesize(index, title));
        self.used.insert(id.clone());
        id
    }

    fn synthesize(&self, index: usize, title: &str) -> String {
        let input = format!("{}|{}|{}|{}", self.source_url, self.feed_title, index, title);
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&Sha256::digest(input.as_bytes()));
        let mut rng = StdRng::from_seed(seed);

        loop {
            let token: String = (0..ID_TOKEN_LEN)
                .map(|_| char::from(ID_TOKEN_ALPHABET[rng.random_range(0..ID_TOKEN_ALPHABET.len())]))
                .collect();
            let candidate = format!("{}-{}", self.feed_title, token);
            if !self.used.contains(&candidate) {
                return candidate;
            }
        }
    }
}
