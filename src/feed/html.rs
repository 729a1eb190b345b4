use scraper::{ElementRef, Html, Node, Selector};

use crate::util::{collapse_whitespace, strip_control_chars};

/// Elements whose text is never part of a summary.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "template", "noscript"];

/// Elements that separate words when rendered.
const BREAKING_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "ol", "p",
    "pre", "section", "table", "td", "th", "tr", "ul",
];

/// Reduces an HTML fragment from a feed field to a plain-text summary.
///
/// Description fields are HTML carried inside XML text (escaped or CDATA), so
/// after the outer XML parse the value is parsed again as an HTML fragment.
/// The text of every `<p>` is collected, whitespace-normalized and joined with
/// single spaces. Fragments without any paragraph (plain text, a bare `<div>`,
/// an inline snippet) fall back to their whole text content.
///
/// `<br>` and block elements count as word breaks; `<script>` and `<style>`
/// contribute nothing.
///
/// # Examples
///
/// ```
/// use rss_extractor::feed::html_to_text;
///
/// assert_eq!(html_to_text("<p>Hello</p><p>World</p>"), "Hello World");
/// assert_eq!(html_to_text("Fish &amp; chips"), "Fish & chips");
/// ```
pub fn html_to_text(fragment: &str) -> String {
    if fragment.trim().is_empty() {
        return String::new();
    }

    let document = Html::parse_fragment(fragment);

    let mut paragraphs: Vec<String> = Vec::new();
    if let Ok(selector) = Selector::parse("p") {
        paragraphs = document
            .select(&selector)
            .map(|p| normalize(&visible_text(p)))
            .filter(|text| !text.is_empty())
            .collect();
    }

    if paragraphs.is_empty() {
        return normalize(&visible_text(document.root_element()));
    }

    paragraphs.join(" ")
}

enum Step<'a> {
    Enter(ElementRef<'a>),
    Text(&'a str),
    Break,
}

/// Text under `element` with breaks at block boundaries.
///
/// Walks with an explicit stack; fragments are untrusted and may nest deeply.
fn visible_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    let mut stack = vec![Step::Enter(element)];

    while let Some(step) = stack.pop() {
        match step {
            Step::Text(text) => out.push_str(text),
            Step::Break => out.push(' '),
            Step::Enter(el) => {
                let name = el.value().name();
                if SKIPPED_ELEMENTS.contains(&name) {
                    continue;
                }
                if BREAKING_ELEMENTS.contains(&name) {
                    out.push(' ');
                    stack.push(Step::Break);
                }
                for child in el.children().rev() {
                    match child.value() {
                        Node::Text(text) => stack.push(Step::Text(&**text)),
                        Node::Element(_) => stack.extend(ElementRef::wrap(child).map(Step::Enter)),
                        _ => {}
                    }
                }
            }
        }
    }
    out
}

fn normalize(text: &str) -> String {
    collapse_whitespace(&strip_control_chars(text)).into_owned()
}
