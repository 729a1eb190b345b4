use serde::Serialize;

use super::xml::Element;

/// Which syndication format a document follows.
///
/// Chosen once per document by [`Dialect::detect`]; every field-extraction
/// rule that differs between the formats is looked up through
/// [`Dialect::fields`] instead of branching at the extraction site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Rss,
    Atom,
}

/// How an item's link is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSource {
    /// `<link>https://...</link>`
    Text,
    /// `<link rel="alternate" href="https://..."/>`
    Href,
}

/// Element names used to pull each field out of a document, per dialect.
///
/// Entries holding a list are fallbacks tried in order; nested paths
/// (`author` then `name`) are walked one descendant lookup at a time.
#[derive(Debug)]
pub struct FieldMap {
    /// Container of feed-wide metadata: `channel` or `feed`.
    /// Alternatives cover documents that prefix their own elements.
    pub container: &'static [&'static str],
    pub item: &'static str,
    /// Feed-level description: `description` or `subtitle`.
    pub channel_description: &'static str,
    pub id: &'static str,
    pub link: LinkSource,
    pub description: &'static [&'static str],
    pub author: &'static [&'static [&'static str]],
    pub date: &'static [&'static str],
    /// Attribute consulted when a category element has no text.
    pub category_attr: Option<&'static str>,
    /// Items are selected document-wide rather than under the container.
    /// RSS 1.0 places `item` beside `channel`, not inside it.
    pub items_document_wide: bool,
}

const RSS_FIELDS: FieldMap = FieldMap {
    container: &["channel"],
    item: "item",
    channel_description: "description",
    id: "guid",
    link: LinkSource::Text,
    description: &["description", "content:encoded"],
    author: &[&["author"], &["dc:creator"]],
    date: &["pubDate", "dc:date"],
    category_attr: None,
    items_document_wide: true,
};

const ATOM_FIELDS: FieldMap = FieldMap {
    container: &["feed", "atom:feed"],
    item: "entry",
    channel_description: "subtitle",
    id: "id",
    link: LinkSource::Href,
    description: &["summary", "content"],
    author: &[&["author", "name"]],
    date: &["published", "updated"],
    category_attr: Some("term"),
    items_document_wide: false,
};

impl Dialect {
    pub fn fields(self) -> &'static FieldMap {
        match self {
            Dialect::Rss => &RSS_FIELDS,
            Dialect::Atom => &ATOM_FIELDS,
        }
    }

    /// Detects the dialect and returns it with its metadata container.
    ///
    /// The container is looked for at the root and among the root's children.
    /// An Atom `feed` wins over an RSS `channel` when both are present.
    pub fn detect(root: &Element) -> Option<(Dialect, &Element)> {
        [Dialect::Atom, Dialect::Rss].into_iter().find_map(|dialect| {
            let names = dialect.fields().container;
            if root.matches_any(names) {
                return Some((dialect, root));
            }
            root.child_elements()
                .find(|el| el.matches_any(names))
                .map(|container| (dialect, container))
        })
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::Rss => f.write_str("rss"),
            Dialect::Atom => f.write_str("atom"),
        }
    }
}
