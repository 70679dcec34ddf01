use std::borrow::Cow;
use std::fmt;

use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use scraper::selector::{CssLocalName, CssString, NonTSPseudoClass, PseudoElement, Simple};
use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::bloom::BloomFilter;
use selectors::matching::{ElementSelectorFlags, MatchingContext};
use selectors::parser::SelectorImpl;
use selectors::OpaqueElement;
use tracing::debug;

type Namespace = <Simple as SelectorImpl>::NamespaceUrl;

/// An XML document stored as an arena of nodes.
///
/// Nodes are pushed in the order they appear in the source, so walking the
/// arena front to back visits elements in document order. Node `0` is the
/// document itself.
#[derive(Debug)]
pub struct XmlDocument {
    nodes: Vec<Node>,
}

#[derive(Debug)]
struct Node {
    parent: Option<usize>,
    children: Vec<usize>,
    kind: NodeKind,
}

#[derive(Debug)]
enum NodeKind {
    Document,
    Element {
        name: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
}

impl XmlDocument {
    /// Parses `text` into a tree, never failing.
    ///
    /// Mismatched end tags close the nearest open element of the same name
    /// and stray end tags are ignored. A hard syntax error stops the parse,
    /// keeping everything read up to that point.
    pub fn parse(text: &str) -> Self {
        let mut doc = Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Document,
            }],
        };

        let mut reader = Reader::from_str(text);
        reader.config_mut().check_end_names = false;

        let mut open: Vec<usize> = vec![0];

        loop {
            let current = open.last().copied().unwrap_or(0);

            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    let id = doc.push_element(current, &e);
                    open.push(id);
                }
                Ok(Event::Empty(e)) => {
                    doc.push_element(current, &e);
                }
                Ok(Event::End(e)) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if let Some(pos) = open
                        .iter()
                        .rposition(|&id| doc.element_name(id) == Some(name.as_str()))
                    {
                        open.truncate(pos);
                    }
                }
                Ok(Event::Text(e)) => {
                    let raw = String::from_utf8_lossy(&e);
                    doc.push_text(current, unescape_lenient(&raw).into_owned());
                }
                Ok(Event::CData(e)) => {
                    doc.push_text(current, String::from_utf8_lossy(&e).into_owned());
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!(
                        "Stopping XML parse at position {}: {}",
                        reader.buffer_position(),
                        e
                    );
                    break;
                }
            }
        }

        doc
    }

    /// All elements of the document in document order.
    pub fn elements(&self) -> impl Iterator<Item = XmlElement<'_>> + '_ {
        descendants_of(self, 0)
    }

    fn push(&mut self, parent: usize, kind: NodeKind) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node {
            parent: Some(parent),
            children: Vec::new(),
            kind,
        });
        self.nodes[parent].children.push(id);
        id
    }

    fn push_element(&mut self, parent: usize, start: &BytesStart<'_>) -> usize {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let attributes = start
            .attributes()
            .with_checks(false)
            .filter_map(Result::ok)
            .map(|attr| {
                let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                let raw = String::from_utf8_lossy(&attr.value);
                (key, unescape_lenient(&raw).into_owned())
            })
            .collect();

        self.push(parent, NodeKind::Element { name, attributes })
    }

    fn push_text(&mut self, parent: usize, text: String) {
        if text.is_empty() {
            return;
        }
        self.push(parent, NodeKind::Text(text));
    }

    fn element_name(&self, id: usize) -> Option<&str> {
        match &self.nodes[id].kind {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    fn is_element(&self, id: usize) -> bool {
        matches!(self.nodes[id].kind, NodeKind::Element { .. })
    }
}

/// Resolves entity and character references one at a time. References
/// quick-xml does not know (e.g. HTML's `&nbsp;`) are kept verbatim.
fn unescape_lenient(raw: &str) -> Cow<'_, str> {
    if let Ok(text) = unescape(raw) {
        return text;
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];

        match tail.find([';', '&']) {
            Some(end) if tail.as_bytes()[end] == b';' => {
                let reference = &rest[start..start + end + 2];
                match unescape(reference) {
                    Ok(resolved) => out.push_str(&resolved),
                    Err(_) => out.push_str(reference),
                }
                rest = &tail[end + 1..];
            }
            _ => {
                out.push('&');
                rest = tail;
            }
        }
    }
    out.push_str(rest);

    Cow::Owned(out)
}

fn descendants_of(doc: &XmlDocument, id: usize) -> impl Iterator<Item = XmlElement<'_>> + '_ {
    let mut stack: Vec<usize> = doc.nodes[id].children.iter().rev().copied().collect();

    std::iter::from_fn(move || {
        while let Some(id) = stack.pop() {
            stack.extend(doc.nodes[id].children.iter().rev().copied());
            if doc.is_element(id) {
                return Some(XmlElement { doc, id });
            }
        }
        None
    })
}

/// A borrowed handle to one element of an [`XmlDocument`].
#[derive(Clone, Copy)]
pub struct XmlElement<'a> {
    doc: &'a XmlDocument,
    id: usize,
}

impl<'a> XmlElement<'a> {
    /// Qualified tag name, including any namespace prefix.
    pub fn name(&self) -> &'a str {
        self.doc.element_name(self.id).unwrap_or_default()
    }

    /// Tag name with the namespace prefix stripped.
    pub fn local_name(&self) -> &'a str {
        let name = self.name();
        match name.split_once(':') {
            Some((_, local)) => local,
            None => name,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&'a str> {
        match &self.doc.nodes[self.id].kind {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    /// Concatenated text of all descendant text and CDATA nodes.
    pub fn text(&self) -> String {
        let mut text = String::new();
        let mut stack = vec![self.id];

        while let Some(id) = stack.pop() {
            let node = &self.doc.nodes[id];
            if let NodeKind::Text(t) = &node.kind {
                text.push_str(t);
            }
            stack.extend(node.children.iter().rev().copied());
        }

        text
    }

    pub fn parent_element(&self) -> Option<XmlElement<'a>> {
        let parent = self.doc.nodes[self.id].parent?;
        self.doc.is_element(parent).then_some(XmlElement {
            doc: self.doc,
            id: parent,
        })
    }

    /// Descendant elements in document order, excluding `self`.
    pub fn descendants(&self) -> impl Iterator<Item = XmlElement<'a>> + 'a {
        descendants_of(self.doc, self.id)
    }

    fn element_siblings(&self) -> (Vec<XmlElement<'a>>, usize) {
        let Some(parent) = self.doc.nodes[self.id].parent else {
            return (vec![*self], 0);
        };

        let siblings: Vec<XmlElement<'a>> = self.doc.nodes[parent]
            .children
            .iter()
            .copied()
            .filter(|&id| self.doc.is_element(id))
            .map(|id| XmlElement { doc: self.doc, id })
            .collect();
        let pos = siblings
            .iter()
            .position(|s| s.id == self.id)
            .unwrap_or_default();

        (siblings, pos)
    }
}

impl fmt::Debug for XmlElement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlElement")
            .field("id", &self.id)
            .field("name", &self.name())
            .finish()
    }
}

/// Type selectors compare case-sensitively against the local name or the
/// qualified name, so `creator` and `dc\:creator` both match `<dc:creator>`.
impl selectors::Element for XmlElement<'_> {
    type Impl = Simple;

    fn opaque(&self) -> OpaqueElement {
        OpaqueElement::new(&self.doc.nodes[self.id])
    }

    fn parent_element(&self) -> Option<Self> {
        XmlElement::parent_element(self)
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        false
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        None
    }

    fn is_pseudo_element(&self) -> bool {
        false
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        let (siblings, pos) = self.element_siblings();
        pos.checked_sub(1).map(|prev| siblings[prev])
    }

    fn next_sibling_element(&self) -> Option<Self> {
        let (siblings, pos) = self.element_siblings();
        siblings.get(pos + 1).copied()
    }

    fn first_element_child(&self) -> Option<Self> {
        self.doc.nodes[self.id]
            .children
            .iter()
            .copied()
            .find(|&id| self.doc.is_element(id))
            .map(|id| XmlElement { doc: self.doc, id })
    }

    fn is_html_element_in_html_document(&self) -> bool {
        false
    }

    fn has_local_name(&self, name: &CssLocalName) -> bool {
        let name: &str = &name.0;
        self.local_name() == name || self.name() == name
    }

    fn has_namespace(&self, namespace: &Namespace) -> bool {
        namespace.is_empty()
    }

    fn is_same_type(&self, other: &Self) -> bool {
        self.name() == other.name()
    }

    fn attr_matches(
        &self,
        ns: &NamespaceConstraint<&Namespace>,
        local_name: &CssLocalName,
        operation: &AttrSelectorOperation<&CssString>,
    ) -> bool {
        if matches!(*ns, NamespaceConstraint::Specific(url) if !url.is_empty()) {
            return false;
        }
        self.attr(&local_name.0).is_some_and(|value| operation.eval_str(value))
    }

    fn match_non_ts_pseudo_class(
        &self,
        pc: &NonTSPseudoClass,
        _context: &mut MatchingContext<'_, Self::Impl>,
    ) -> bool {
        match *pc {}
    }

    fn match_pseudo_element(
        &self,
        pe: &PseudoElement,
        _context: &mut MatchingContext<'_, Self::Impl>,
    ) -> bool {
        match *pe {}
    }

    fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

    fn is_link(&self) -> bool {
        false
    }

    fn is_html_slot_element(&self) -> bool {
        false
    }

    fn has_id(&self, id: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
        self.attr("id")
            .is_some_and(|value| case_sensitivity.eq(id.0.as_bytes(), value.as_bytes()))
    }

    fn has_class(&self, name: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
        self.attr("class").is_some_and(|classes| {
            classes
                .split_ascii_whitespace()
                .any(|class| case_sensitivity.eq(name.0.as_bytes(), class.as_bytes()))
        })
    }

    fn has_custom_state(&self, _name: &CssLocalName) -> bool {
        false
    }

    fn imported_part(&self, _name: &CssLocalName) -> Option<CssLocalName> {
        None
    }

    fn is_part(&self, _name: &CssLocalName) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        // Empty text is never pushed, so any child counts
        self.doc.nodes[self.id].children.is_empty()
    }

    fn is_root(&self) -> bool {
        self.doc.nodes[self.id].parent == Some(0)
    }

    fn add_element_unique_hashes(&self, _filter: &mut BloomFilter) -> bool {
        false
    }
}
