//! Query-able document trees for feeds (XML) and web pages (HTML).
//!
//! HTML goes through `scraper`; XML goes through the arena tree in [`xml`].
//! Both trees implement `selectors::Element`, so one compiled [`Selector`]
//! queries either through the same [`Document`] / [`Element`] API.

mod selector;
mod xml;

use scraper::{ElementRef, Html};
use selectors::matching::SelectorCaches;
use serde::Deserialize;
use thiserror::Error;

pub use self::selector::Selector;
pub use self::xml::{XmlDocument, XmlElement};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Html,
    #[default]
    Xml,
}

#[derive(Debug, Error)]
#[error("Invalid selector '{selector}': {reason}")]
pub struct SelectorError {
    pub selector: String,
    pub reason: String,
}

impl SelectorError {
    fn new(selector: &str, reason: impl Into<String>) -> Self {
        Self {
            selector: selector.to_string(),
            reason: reason.into(),
        }
    }
}

pub enum Document {
    Html(Html),
    Xml(XmlDocument),
}

/// Parses `text` as the given content type. Malformed input yields a
/// best-effort tree rather than an error.
pub fn parse(text: &str, content_type: ContentType) -> Document {
    match content_type {
        ContentType::Html => Document::Html(Html::parse_document(text)),
        ContentType::Xml => Document::Xml(XmlDocument::parse(text)),
    }
}

impl Document {
    pub fn query_selector<'a>(&'a self, selector: &'a Selector) -> Option<Element<'a>> {
        self.select(selector).next()
    }

    pub fn query_selector_all<'a>(&'a self, selector: &'a Selector) -> Vec<Element<'a>> {
        self.select(selector).collect()
    }

    fn select<'a>(&'a self, selector: &'a Selector) -> Box<dyn Iterator<Item = Element<'a>> + 'a> {
        let mut caches = SelectorCaches::default();

        match self {
            Document::Html(html) => Box::new(
                html.root_element()
                    .descendent_elements()
                    .filter(move |e| selector.matches(e, None, &mut caches))
                    .map(Element::Html),
            ),
            Document::Xml(doc) => Box::new(
                doc.elements()
                    .filter(move |e| selector.matches(e, None, &mut caches))
                    .map(Element::Xml),
            ),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Element<'a> {
    Html(ElementRef<'a>),
    Xml(XmlElement<'a>),
}

impl<'a> Element<'a> {
    /// First descendant matching `selector`. Never matches `self`.
    pub fn query_selector(&self, selector: &'a Selector) -> Option<Element<'a>> {
        self.select(selector).next()
    }

    pub fn query_selector_all(&self, selector: &'a Selector) -> Vec<Element<'a>> {
        self.select(selector).collect()
    }

    fn select(&self, selector: &'a Selector) -> Box<dyn Iterator<Item = Element<'a>> + 'a> {
        let mut caches = SelectorCaches::default();

        match *self {
            Element::Html(element) => Box::new(
                element
                    .descendent_elements()
                    .skip(1)
                    .filter(move |e| selector.matches(e, Some(&element), &mut caches))
                    .map(Element::Html),
            ),
            Element::Xml(element) => Box::new(
                element
                    .descendants()
                    .filter(move |e| selector.matches(e, Some(&element), &mut caches))
                    .map(Element::Xml),
            ),
        }
    }

    /// Concatenated text of all descendants. Always `Some` for elements.
    pub fn text_content(&self) -> Option<String> {
        Some(match self {
            Element::Html(element) => element.text().collect(),
            Element::Xml(element) => element.text(),
        })
    }

    pub fn get_attribute(&self, name: &str) -> Option<&'a str> {
        match self {
            Element::Html(element) => element.value().attr(name),
            Element::Xml(element) => element.attr(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example Feed</title>
    <item>
      <title>First</title>
      <link>https://example.com/1</link>
    </item>
    <item>
      <title>Second</title>
      <link>https://example.com/2</link>
    </item>
  </channel>
</rss>"#;

    fn selector(source: &str) -> Selector {
        Selector::parse(source).unwrap()
    }

    #[test]
    fn test_xml_link_text_survives() {
        // An HTML parser would treat <link> as a void element and drop its text
        let doc = parse(RSS, ContentType::Xml);
        let item = selector("item");
        let link = selector("link");

        let links: Vec<String> = doc
            .query_selector_all(&item)
            .iter()
            .filter_map(|item| item.query_selector(&link))
            .filter_map(|link| link.text_content())
            .collect();
        assert_eq!(links, vec!["https://example.com/1", "https://example.com/2"]);
    }

    #[test]
    fn test_scoped_query_does_not_match_self() {
        let doc = parse("<item><item>inner</item></item>", ContentType::Xml);
        let item = selector("item");

        let outer = doc.query_selector(&item).unwrap();
        let inner = outer.query_selector(&item).unwrap();
        assert_eq!(inner.text_content().unwrap(), "inner");
        assert!(inner.query_selector(&item).is_none());
    }

    #[test]
    fn test_html_meta_attribute() {
        let doc = parse(
            r#"<html><head><meta property="og:image" content="https://x/1.png"></head></html>"#,
            ContentType::Html,
        );
        let meta = selector("meta[property='og:image']");
        let content = doc
            .query_selector(&meta)
            .and_then(|m| m.get_attribute("content"));
        assert_eq!(content, Some("https://x/1.png"));
    }

    #[test]
    fn test_html_scoped_query_does_not_match_self() {
        let doc = parse("<div class=a><div class=a>x</div></div>", ContentType::Html);
        let div = selector("div.a");

        let outer = doc.query_selector(&div).unwrap();
        assert_eq!(outer.query_selector_all(&div).len(), 1);
    }

    #[test]
    fn test_malformed_html_still_parses() {
        let doc = parse("<p>unclosed <b>bold", ContentType::Html);
        let b = selector("b");
        assert_eq!(
            doc.query_selector(&b).and_then(|e| e.text_content()),
            Some("bold".to_string())
        );
    }

    #[test]
    fn test_same_selector_queries_both_content_types() {
        let first = selector("item:nth-child(-n+2) > title, li:first-of-type");

        let xml = parse(RSS, ContentType::Xml);
        let html = parse("<ul><li>one</li><li>two</li></ul>", ContentType::Html);

        let texts = |doc: &Document| -> Vec<String> {
            doc.query_selector_all(&first)
                .iter()
                .filter_map(|e| e.text_content())
                .collect()
        };
        assert_eq!(texts(&xml), vec!["First"]);
        assert_eq!(texts(&html), vec!["one"]);
    }

    #[test]
    fn test_scoped_query_resolves_scope_to_the_element() {
        let doc = parse(RSS, ContentType::Xml);
        let channel_selector = selector("channel");
        let channel = doc.query_selector(&channel_selector).unwrap();

        let titles: Vec<String> = channel
            .query_selector_all(&selector(":scope > title"))
            .iter()
            .filter_map(|e| e.text_content())
            .collect();
        assert_eq!(titles, vec!["Example Feed"]);
    }

    #[test]
    fn test_invalid_selector_is_an_error() {
        let err = Selector::parse("item[").unwrap_err();
        assert_eq!(err.selector, "item[");
        assert!(err.to_string().starts_with("Invalid selector 'item['"));

        assert!(Selector::parse("meta[").is_err());
    }

    #[test]
    fn test_missing_attribute_is_none() {
        let doc = parse(r#"<meta property="og:image">"#, ContentType::Html);
        let meta = selector("meta");
        assert_eq!(doc.query_selector(&meta).unwrap().get_attribute("content"), None);
    }
}
