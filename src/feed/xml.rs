//! Minimal owned XML tree used by the feed parser.
//!
//! `quick-xml` is a pull parser; feed field extraction needs "first descendant
//! named X" style lookups, so the event stream is folded into a small tree of
//! [`Element`]s first. Element names are kept exactly as written (prefix
//! included) next to the namespace URI the prefix resolved to, which is what
//! [`Selector`] matching needs.

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// SEC-003: Maximum element nesting depth accepted.
/// Dropping a tree is recursive, so absurdly deep documents are rejected up front.
const MAX_DEPTH: usize = 256;

/// Namespace URIs conventionally bound to the prefixes feeds use.
///
/// Feeds are inconsistent about which prefix they bind to these URIs, so a
/// prefixed selector also matches any element living in the URI conventionally
/// associated with its prefix.
const WELL_KNOWN_NAMESPACES: &[(&str, &str)] = &[
    ("dc", "http://purl.org/dc/elements/1.1/"),
    ("content", "http://purl.org/rss/1.0/modules/content/"),
    ("media", "http://search.yahoo.com/mrss/"),
    ("atom", "http://www.w3.org/2005/Atom"),
];

/// The document could not be read as well-formed XML.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct XmlError(String);

/// A node in the element tree: either a child element or a run of character data.
#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An XML element with its attributes and children in document order.
#[derive(Debug, Clone)]
pub struct Element {
    name: String,
    namespace: Option<String>,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

/// An element-name pattern such as `item` or `dc:creator`.
///
/// Matching is by local name first. When the selector carries a prefix, the
/// candidate must then either be written with the same prefix or live in the
/// namespace conventionally bound to that prefix. An unprefixed selector only
/// matches unprefixed elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selector<'a> {
    prefix: Option<&'a str>,
    local: &'a str,
}

impl<'a> Selector<'a> {
    pub fn parse(pattern: &'a str) -> Self {
        match pattern.split_once(':') {
            Some((prefix, local)) => Self {
                prefix: Some(prefix),
                local,
            },
            None => Self {
                prefix: None,
                local: pattern,
            },
        }
    }
}

impl Element {
    /// Qualified name as written in the document, e.g. `media:content`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local_name(&self) -> &str {
        split_qname(&self.name).1
    }

    pub fn prefix(&self) -> Option<&str> {
        split_qname(&self.name).0
    }

    /// Namespace URI the element's prefix (or the default namespace) resolved to.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Value of the attribute with the given qualified name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Concatenated character data of this element and all its descendants,
    /// untrimmed.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Children serialized back to markup, without namespace prefixes or
    /// `xmlns` declarations.
    ///
    /// Used for fields that carry XHTML as child elements rather than as
    /// escaped text, so `<xhtml:p>` reaches an HTML parser as `<p>`.
    pub fn inner_markup(&self) -> String {
        let mut out = String::new();
        write_markup(self, &mut out);
        out
    }

    /// Copy of this subtree with `prefix` removed from every element written with it.
    pub fn without_prefix(&self, prefix: &str) -> Element {
        let name = match split_qname(&self.name) {
            (Some(own), local) if own == prefix => local.to_string(),
            _ => self.name.clone(),
        };
        Element {
            name,
            namespace: self.namespace.clone(),
            attributes: self.attributes.clone(),
            children: self
                .children
                .iter()
                .map(|node| match node {
                    Node::Element(el) => Node::Element(el.without_prefix(prefix)),
                    Node::Text(text) => Node::Text(text.clone()),
                })
                .collect(),
        }
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }

    pub fn matches(&self, selector: &Selector<'_>) -> bool {
        let (prefix, local) = split_qname(&self.name);
        if local != selector.local {
            return false;
        }
        match selector.prefix {
            None => prefix.is_none(),
            Some(wanted) => {
                prefix == Some(wanted)
                    || well_known_namespace(wanted)
                        .zip(self.namespace())
                        .is_some_and(|(expected, actual)| same_namespace(expected, actual))
            }
        }
    }

    pub fn matches_any(&self, patterns: &[&str]) -> bool {
        patterns.iter().any(|p| self.matches(&Selector::parse(p)))
    }

    /// First direct child matching `pattern`.
    pub fn child(&self, pattern: &str) -> Option<&Element> {
        let selector = Selector::parse(pattern);
        self.child_elements().find(|el| el.matches(&selector))
    }

    /// All direct children matching `pattern`, in document order.
    pub fn children_named<'s>(&'s self, pattern: &'s str) -> impl Iterator<Item = &'s Element> {
        let selector = Selector::parse(pattern);
        self.child_elements()
            .filter(move |el| el.matches(&selector))
    }

    /// Descendants of this element (not including itself) in document order.
    pub fn descendants(&self) -> Descendants<'_> {
        let mut stack: Vec<&Element> = self.child_elements().collect();
        stack.reverse();
        Descendants { stack }
    }

    /// First descendant matching `pattern`.
    pub fn find(&self, pattern: &str) -> Option<&Element> {
        let selector = Selector::parse(pattern);
        self.descendants().find(|el| el.matches(&selector))
    }

    /// First descendant matching any of `patterns`, in document order.
    pub fn find_any(&self, patterns: &[&str]) -> Option<&Element> {
        let selectors: Vec<Selector<'_>> = patterns.iter().map(|p| Selector::parse(p)).collect();
        self.descendants()
            .find(|el| selectors.iter().any(|s| el.matches(s)))
    }

    /// All descendants matching `pattern`, in document order.
    pub fn find_all(&self, pattern: &str) -> Vec<&Element> {
        let selector = Selector::parse(pattern);
        self.descendants()
            .filter(|el| el.matches(&selector))
            .collect()
    }
}

/// Pre-order iterator over an element's descendants.
pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        let start = self.stack.len();
        self.stack.extend(next.child_elements());
        self.stack[start..].reverse();
        Some(next)
    }
}

/// Parses `content` into its root element.
///
/// Fails on anything that is not well-formed: syntax errors, mismatched or
/// unclosed tags, undeclared entities, a missing root, or a second root.
///
/// SEC-002: quick-xml (0.37) never expands `<!ENTITY>` declarations; only the five
/// XML builtins are resolved and anything else fails in `unescape()`.
pub fn parse_document(content: &str) -> Result<Element, XmlError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(false);

    let mut open: Vec<Element> = Vec::new();
    let mut scopes: Vec<Vec<(Option<String>, String)>> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            XmlError(format!("{} at byte {}", e, reader.error_position()))
        })?;

        match event {
            Event::Start(e) => {
                if root.is_some() {
                    return Err(XmlError("content after root element".into()));
                }
                if open.len() >= MAX_DEPTH {
                    return Err(XmlError(format!(
                        "nesting depth exceeds maximum of {MAX_DEPTH} levels"
                    )));
                }
                let (element, declared) = start_element(&e, &reader, &scopes)?;
                scopes.push(declared);
                open.push(element);
            }
            Event::Empty(e) => {
                if root.is_some() {
                    return Err(XmlError("content after root element".into()));
                }
                let (element, _) = start_element(&e, &reader, &scopes)?;
                attach(element, &mut open, &mut root);
            }
            Event::End(_) => {
                let element = open
                    .pop()
                    .ok_or_else(|| XmlError("closing tag without matching opening tag".into()))?;
                scopes.pop();
                attach(element, &mut open, &mut root);
            }
            Event::Text(t) => {
                if let Some(parent) = open.last_mut() {
                    let text = t
                        .unescape()
                        .map_err(|e| XmlError(format!("{} at byte {}", e, reader.buffer_position())))?;
                    push_text(parent, &text);
                }
            }
            Event::CData(c) => {
                if let Some(parent) = open.last_mut() {
                    push_text(parent, &String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions and doctypes carry no feed data
            _ => {}
        }
    }

    if let Some(unclosed) = open.last() {
        return Err(XmlError(format!(
            "unexpected end of document: <{}> is not closed",
            unclosed.name
        )));
    }

    root.ok_or_else(|| XmlError("document has no root element".into()))
}

fn start_element(
    e: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
    scopes: &[Vec<(Option<String>, String)>],
) -> Result<(Element, Vec<(Option<String>, String)>), XmlError> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let decoder = reader.decoder();

    let mut attributes = Vec::new();
    let mut declared = Vec::new();
    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|e| XmlError(format!("malformed attribute: {e}")))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .decode_and_unescape_value(decoder)
            .map_err(|e| XmlError(format!("malformed attribute value: {e}")))?
            .into_owned();

        if key == "xmlns" {
            declared.push((None, value.clone()));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            declared.push((Some(prefix.to_string()), value.clone()));
        }
        attributes.push((key, value));
    }

    let prefix = split_qname(&name).0;
    let namespace = declared
        .iter()
        .chain(scopes.iter().rev().flatten())
        .find(|(declared_prefix, _)| declared_prefix.as_deref() == prefix)
        .map(|(_, uri)| uri.clone())
        .filter(|uri| !uri.is_empty());

    Ok((
        Element {
            name,
            namespace,
            attributes,
            children: Vec::new(),
        },
        declared,
    ))
}

fn attach(element: Element, open: &mut [Element], root: &mut Option<Element>) {
    match open.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None => *root = Some(element),
    }
}

fn push_text(parent: &mut Element, text: &str) {
    // Adjacent text and CDATA sections merge into one node
    if let Some(Node::Text(existing)) = parent.children.last_mut() {
        existing.push_str(text);
    } else {
        parent.children.push(Node::Text(text.to_string()));
    }
}

fn write_markup(element: &Element, out: &mut String) {
    for node in &element.children {
        match node {
            Node::Text(text) => out.push_str(&escape(text.as_str())),
            Node::Element(child) => {
                let name = child.local_name();
                out.push('<');
                out.push_str(name);
                for (key, value) in &child.attributes {
                    if key == "xmlns" || key.starts_with("xmlns:") {
                        continue;
                    }
                    out.push(' ');
                    out.push_str(key);
                    out.push_str("=\"");
                    out.push_str(&escape(value.as_str()));
                    out.push('"');
                }
                out.push('>');
                write_markup(child, out);
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
        }
    }
}

fn collect_text(element: &Element, out: &mut String) {
    for node in &element.children {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element(child) => collect_text(child, out),
        }
    }
}

fn split_qname(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

fn well_known_namespace(prefix: &str) -> Option<&'static str> {
    WELL_KNOWN_NAMESPACES
        .iter()
        .find(|(p, _)| *p == prefix)
        .map(|(_, uri)| *uri)
}

fn same_namespace(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_builds_tree_in_document_order() {
        let root = parse_document("<a><b>1</b><c/><b>2</b></a>").unwrap();
        assert_eq!(root.name(), "a");
        let names: Vec<_> = root.child_elements().map(Element::name).collect();
        assert_eq!(names, vec!["b", "c", "b"]);
        assert_eq!(root.text(), "12");
    }

    #[test]
    fn test_truncated_document_is_error() {
        let err = parse_document("<rss><channel>").unwrap_err();
        assert!(err.to_string().contains("not closed"));
    }

    #[test]
    fn test_mismatched_tags_are_error() {
        assert!(parse_document("<a><b></a></b>").is_err());
    }

    #[test]
    fn test_stray_closing_tag_is_error() {
        assert!(parse_document("<a></a></b>").is_err());
    }

    #[test]
    fn test_empty_document_is_error() {
        assert!(parse_document("").is_err());
        assert!(parse_document("<?xml version=\"1.0\"?>").is_err());
    }

    #[test]
    fn test_second_root_is_error() {
        assert!(parse_document("<a/><b/>").is_err());
        assert!(parse_document("<a></a><b></b>").is_err());
    }

    #[test]
    fn test_unknown_entity_is_error() {
        assert!(parse_document("<a>&bogus;</a>").is_err());
    }

    #[test]
    fn test_builtin_entities_and_cdata() {
        let root = parse_document("<a>x &amp; y <![CDATA[<p>raw</p>]]></a>").unwrap();
        assert_eq!(root.text(), "x & y <p>raw</p>");
    }

    #[test]
    fn test_attributes_are_unescaped() {
        let root = parse_document(r#"<a href="https://e.com/?a=1&amp;b=2"/>"#).unwrap();
        assert_eq!(root.attr("href"), Some("https://e.com/?a=1&b=2"));
        assert_eq!(root.attr("missing"), None);
    }

    #[test]
    fn test_find_is_depth_first_document_order() {
        let root = parse_document("<r><x><t>inner</t></x><t>outer</t></r>").unwrap();
        assert_eq!(root.find("t").unwrap().text(), "inner");
        assert_eq!(root.child("t").unwrap().text(), "outer");
        let all: Vec<_> = root.find_all("t").iter().map(|e| e.text()).collect();
        assert_eq!(all, vec!["inner", "outer"]);
    }

    #[test]
    fn test_find_does_not_match_self() {
        let root = parse_document("<t><u/></t>").unwrap();
        assert!(root.find("t").is_none());
    }

    #[test]
    fn test_prefixed_selector_matches_declared_prefix() {
        let root = parse_document(
            r#"<item xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:creator>Ann</dc:creator></item>"#,
        )
        .unwrap();
        let creator = root.find("dc:creator").unwrap();
        assert_eq!(creator.text(), "Ann");
        assert_eq!(creator.local_name(), "creator");
        assert_eq!(creator.prefix(), Some("dc"));
        assert_eq!(creator.namespace(), Some("http://purl.org/dc/elements/1.1/"));
    }

    #[test]
    fn test_prefixed_selector_matches_rebound_prefix_by_uri() {
        let root = parse_document(
            r#"<item xmlns:d="http://purl.org/dc/elements/1.1"><d:creator>Bo</d:creator></item>"#,
        )
        .unwrap();
        assert_eq!(root.find("dc:creator").unwrap().text(), "Bo");
    }

    #[test]
    fn test_prefixed_selector_matches_unbound_prefix() {
        let root = parse_document("<item><dc:creator>Cy</dc:creator></item>").unwrap();
        let creator = root.find("dc:creator").unwrap();
        assert_eq!(creator.text(), "Cy");
        assert_eq!(creator.namespace(), None);
    }

    #[test]
    fn test_prefixed_selector_rejects_other_namespace() {
        let root = parse_document(
            r#"<item xmlns:x="urn:other"><x:creator>No</x:creator></item>"#,
        )
        .unwrap();
        assert!(root.find("dc:creator").is_none());
    }

    #[test]
    fn test_unprefixed_selector_skips_prefixed_elements() {
        let root = parse_document(
            r#"<item xmlns:media="http://search.yahoo.com/mrss/"><media:title>m</media:title><title>t</title></item>"#,
        )
        .unwrap();
        assert_eq!(root.find("title").unwrap().text(), "t");
    }

    #[test]
    fn test_default_namespace_resolved() {
        let root = parse_document(r#"<feed xmlns="http://www.w3.org/2005/Atom"><entry/></feed>"#)
            .unwrap();
        assert_eq!(root.namespace(), Some("http://www.w3.org/2005/Atom"));
        assert_eq!(
            root.find("entry").unwrap().namespace(),
            Some("http://www.w3.org/2005/Atom")
        );
    }

    #[test]
    fn test_find_any_returns_earliest_in_document() {
        let root = parse_document(
            "<i><media:thumbnail url=\"t\"/><media:content url=\"c\"/></i>",
        )
        .unwrap();
        let found = root
            .find_any(&["media:content", "media:thumbnail"])
            .unwrap();
        assert_eq!(found.attr("url"), Some("t"));
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("{}{}", "<a>".repeat(MAX_DEPTH + 1), "</a>".repeat(MAX_DEPTH + 1));
        let err = parse_document(&deep).unwrap_err();
        assert!(err.to_string().contains("nesting depth"));
    }

    #[test]
    fn test_inner_markup_drops_prefixes_and_declarations() {
        let root = parse_document(
            r#"<content type="xhtml"><x:div xmlns:x="http://www.w3.org/1999/xhtml"><x:p class="a">Fish &amp; chips</x:p><x:br/></x:div></content>"#,
        )
        .unwrap();
        assert_eq!(
            root.inner_markup(),
            r#"<div><p class="a">Fish &amp; chips</p><br></br></div>"#
        );
    }

    #[test]
    fn test_without_prefix_only_touches_that_prefix() {
        let root = parse_document(
            r#"<atom:feed xmlns:atom="http://www.w3.org/2005/Atom" xmlns:media="http://search.yahoo.com/mrss/"><atom:title>T</atom:title><media:content/></atom:feed>"#,
        )
        .unwrap();
        let plain = root.without_prefix("atom");
        assert_eq!(plain.name(), "feed");
        assert_eq!(plain.child("title").unwrap().text(), "T");
        assert!(plain.child("media:content").is_some());
        assert!(plain.matches_any(&["channel", "feed"]));
    }
}
