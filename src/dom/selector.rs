use cssparser::{Parser as CssParser, ParserInput};
use scraper::error::SelectorErrorKind;
use scraper::selector::{Parser, Simple};
use selectors::matching::{
    self, MatchingContext, MatchingForInvalidation, MatchingMode, NeedsSelectorFlags, QuirksMode,
    SelectorCaches,
};
use selectors::parser::{ParseRelative, SelectorList};

use super::SelectorError;

/// A compiled CSS selector group.
///
/// Parsed with scraper's selector grammar, so the same selector matches
/// HTML elements and [`XmlElement`](super::XmlElement)s alike.
#[derive(Debug, Clone)]
pub struct Selector {
    list: SelectorList<Simple>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let mut input = ParserInput::new(source);
        let mut parser = CssParser::new(&mut input);

        SelectorList::parse(&Parser, &mut parser, ParseRelative::No)
            .map(|list| Self { list })
            .map_err(|e| SelectorError::new(source, SelectorErrorKind::from(e).to_string()))
    }

    /// Whether `element` matches any selector of the group. `:scope` refers
    /// to `scope` when given, the root element otherwise.
    pub(super) fn matches<E>(&self, element: &E, scope: Option<&E>, caches: &mut SelectorCaches) -> bool
    where
        E: selectors::Element<Impl = Simple>,
    {
        let mut context = MatchingContext::new(
            MatchingMode::Normal,
            None,
            caches,
            QuirksMode::NoQuirks,
            NeedsSelectorFlags::No,
            MatchingForInvalidation::No,
        );
        context.scope_element = scope.map(|scope| scope.opaque());

        self.list
            .slice()
            .iter()
            .any(|selector| matching::matches_selector(selector, 0, None, element, &mut context))
    }
}
