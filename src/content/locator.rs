//! Structural locators for nodes inside a section.
//!
//! A locator is a child-combinator chain from the section root (or from a
//! stable anchor inside it) down to one node:
//!
//! ```text
//! div.container > div.service-card:nth-of-type(2) > h3
//! #pricing-title
//! [data-admin-added="true"][data-admin-added-time="2024-05-01T12:00:00.000Z"]
//! ```
//!
//! Anchors are an element id or the marker attribute pair stamped on
//! materialized nodes. Ordinals use `nth-of-type` (position among element
//! siblings with the same tag) and only appear when the tag and classes alone
//! would match more than one sibling.
//!
//! Locators are recomputed on every extraction and never persisted beyond a
//! load/save cycle.

use std::fmt;
use std::str::FromStr;

use cssparser::{ParseError, Parser, ParserInput, Token};

use crate::dom::{Dom, NodeId};
use crate::error::Error;
use crate::util::is_css_identifier;

/// Marker attribute set to `"true"` on materialized nodes.
pub const MARKER_ATTR: &str = "data-admin-added";
/// Marker attribute holding the materialization timestamp.
pub const MARKER_TIME_ATTR: &str = "data-admin-added-time";

type PResult<'i, T> = Result<T, ParseError<'i, ()>>;

/// Where a locator's chain starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Anchor {
    /// The section root itself.
    Root,
    /// The first descendant of the section root with this id.
    Id(String),
    /// The first descendant carrying the marker pair with this timestamp.
    Marker(String),
}

/// One `tag.class.class:nth-of-type(n)` step.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
    pub tag: String,
    pub classes: Vec<String>,
    pub nth_of_type: Option<usize>,
}

impl Segment {
    /// A bare tag step, first matching child.
    pub fn tag(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            classes: Vec::new(),
            nth_of_type: None,
        }
    }

    fn for_node(dom: &Dom, id: NodeId) -> Self {
        let mut segment = Self {
            tag: dom.tag(id).unwrap_or_default().to_string(),
            classes: dom
                .element_classes(id)
                .iter()
                .filter(|c| is_css_identifier(c))
                .cloned()
                .collect(),
            nth_of_type: None,
        };

        if let Some(parent) = dom.parent(id) {
            let same_tag: Vec<NodeId> = dom
                .element_children(parent)
                .filter(|&c| dom.is_tag(c, &segment.tag))
                .collect();
            let ambiguous = same_tag.iter().filter(|&&c| segment.matches(dom, c)).count() > 1;
            if ambiguous {
                segment.nth_of_type = same_tag.iter().position(|&c| c == id).map(|i| i + 1);
            }
        }
        segment
    }

    /// Tag and classes match (extra classes on the node are fine).
    fn matches(&self, dom: &Dom, id: NodeId) -> bool {
        dom.is_tag(id, &self.tag) && {
            let classes = dom.element_classes(id);
            self.classes.iter().all(|c| classes.contains(c))
        }
    }

    fn select_child(&self, dom: &Dom, parent: NodeId) -> Option<NodeId> {
        match self.nth_of_type {
            Some(n) => {
                let child = dom
                    .element_children(parent)
                    .filter(|&c| dom.is_tag(c, &self.tag))
                    .nth(n.checked_sub(1)?)?;
                self.matches(dom, child).then_some(child)
            }
            None => dom.element_children(parent).find(|&c| self.matches(dom, c)),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag)?;
        for class in &self.classes {
            f.write_str(".")?;
            cssparser::serialize_identifier(class, f)?;
        }
        if let Some(n) = self.nth_of_type {
            write!(f, ":nth-of-type({n})")?;
        }
        Ok(())
    }
}

/// A resolvable path to one node within a section subtree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    anchor: Anchor,
    segments: Vec<Segment>,
}

impl Locator {
    pub fn new(anchor: Anchor, segments: Vec<Segment>) -> Self {
        Self { anchor, segments }
    }

    /// Locator for a materialized node stamped with `time`.
    pub fn marker(time: impl Into<String>) -> Self {
        Self::new(Anchor::Marker(time.into()), Vec::new())
    }

    pub fn anchor(&self) -> &Anchor {
        &self.anchor
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Compute the locator of `node` relative to `root`.
    ///
    /// Walks up from the node, stopping at the first ancestor-or-self below
    /// the root that has a selector-safe id or the marker pair.
    pub fn compute(dom: &Dom, node: NodeId, root: NodeId) -> Self {
        let mut segments = Vec::new();
        let mut current = node;

        let anchor = loop {
            if current == root {
                break Anchor::Root;
            }
            if let Some(anchor) = stable_anchor(dom, current) {
                break anchor;
            }
            segments.push(Segment::for_node(dom, current));
            match dom.parent(current) {
                Some(parent) if dom.is_element(parent) => current = parent,
                _ => break Anchor::Root,
            }
        };

        segments.reverse();
        Self { anchor, segments }
    }

    /// Find the node this locator names inside `root`.
    pub fn resolve(&self, dom: &Dom, root: NodeId) -> Option<NodeId> {
        let mut current = match &self.anchor {
            Anchor::Root => root,
            Anchor::Id(id) => dom
                .descendants(root)
                .find(|&n| dom.element_id(n) == Some(id.as_str()))?,
            Anchor::Marker(time) => dom
                .descendants(root)
                .find(|&n| is_marker(dom, n, time))?,
        };

        for segment in &self.segments {
            current = segment.select_child(dom, current)?;
        }
        Some(current)
    }

    /// This locator extended by one more step.
    pub fn child(&self, segment: Segment) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment);
        Self::new(self.anchor.clone(), segments)
    }

    /// This locator without its last step, if it has one.
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.segments.split_last()?;
        Some(Self::new(self.anchor.clone(), rest.to_vec()))
    }
}

fn stable_anchor(dom: &Dom, id: NodeId) -> Option<Anchor> {
    if let Some(elem_id) = dom.element_id(id)
        && is_css_identifier(elem_id)
    {
        return Some(Anchor::Id(elem_id.to_string()));
    }
    if dom.get_attr(id, MARKER_ATTR) == Some("true") {
        let time = dom.get_attr(id, MARKER_TIME_ATTR)?;
        return Some(Anchor::Marker(time.to_string()));
    }
    None
}

/// Whether `id` is a materialized node stamped with `time`.
pub fn is_marker(dom: &Dom, id: NodeId, time: &str) -> bool {
    dom.get_attr(id, MARKER_ATTR) == Some("true") && dom.get_attr(id, MARKER_TIME_ATTR) == Some(time)
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut separate = false;
        match &self.anchor {
            Anchor::Root if self.segments.is_empty() => return f.write_str(":scope"),
            Anchor::Root => {}
            Anchor::Id(id) => {
                f.write_str("#")?;
                cssparser::serialize_identifier(id, f)?;
                separate = true;
            }
            Anchor::Marker(time) => {
                write!(f, "[{MARKER_ATTR}=\"true\"][{MARKER_TIME_ATTR}=")?;
                cssparser::serialize_string(time, f)?;
                f.write_str("]")?;
                separate = true;
            }
        }

        for segment in &self.segments {
            if separate {
                f.write_str(" > ")?;
            }
            write!(f, "{segment}")?;
            separate = true;
        }
        Ok(())
    }
}

impl FromStr for Locator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut input = ParserInput::new(s);
        let mut parser = Parser::new(&mut input);
        parser
            .parse_entirely(|p| parse_locator(p))
            .map_err(|_| Error::InvalidLocator(s.to_string()))
    }
}

/// Compute the locator string of `node` inside `section_root`.
pub fn compute_path(dom: &Dom, node: NodeId, section_root: NodeId) -> Locator {
    Locator::compute(dom, node, section_root)
}

/// Resolve a stored path. Unparseable paths (such as the `new-<ts>`
/// placeholders of unsaved items) and drifted paths both yield `None`.
pub fn resolve_path(dom: &Dom, path: &str, section_root: NodeId) -> Option<NodeId> {
    match path.parse::<Locator>() {
        Ok(locator) => locator.resolve(dom, section_root),
        Err(_) => {
            tracing::debug!(path, "unparseable locator");
            None
        }
    }
}

enum Compound {
    Anchor(Anchor),
    Segment(Segment),
}

fn parse_locator<'i>(input: &mut Parser<'i, '_>) -> PResult<'i, Locator> {
    let mut anchor = Anchor::Root;
    let mut segments = Vec::new();
    let mut first = true;

    loop {
        input.skip_whitespace();
        match parse_compound(input)? {
            Compound::Anchor(a) if first => anchor = a,
            Compound::Anchor(_) => return Err(input.new_custom_error(())),
            Compound::Segment(s) => segments.push(s),
        }
        first = false;

        input.skip_whitespace();
        if input.is_exhausted() {
            break;
        }
        input.expect_delim('>')?;
    }

    Ok(Locator { anchor, segments })
}

fn parse_compound<'i>(input: &mut Parser<'i, '_>) -> PResult<'i, Compound> {
    let location = input.current_source_location();
    let token = input.next_including_whitespace()?.clone();

    match token {
        Token::Colon => {
            input.expect_ident_matching("scope")?;
            Ok(Compound::Anchor(Anchor::Root))
        }
        Token::IDHash(id) => Ok(Compound::Anchor(Anchor::Id(id.to_string()))),
        Token::SquareBracketBlock => {
            let mut attrs = vec![input.parse_nested_block(|p| parse_attribute(p))?];
            while let Ok(attr) = input.try_parse(|p| -> PResult<'i, (String, String)> {
                p.expect_square_bracket_block()?;
                p.parse_nested_block(|p| parse_attribute(p))
            }) {
                attrs.push(attr);
            }
            marker_from(&attrs)
                .map(Compound::Anchor)
                .ok_or_else(|| location.new_custom_error(()))
        }
        Token::Ident(tag) => {
            let mut segment = Segment::tag(tag.to_ascii_lowercase());
            loop {
                let start = input.state();
                let token = match input.next_including_whitespace() {
                    Ok(token) => token.clone(),
                    Err(_) => break,
                };
                match token {
                    Token::Delim('.') => segment.classes.push(input.expect_ident()?.to_string()),
                    Token::Colon => {
                        input.expect_function_matching("nth-of-type")?;
                        let n = input.parse_nested_block(|p| -> PResult<'i, i32> {
                            Ok(p.expect_integer()?)
                        })?;
                        let n = usize::try_from(n)
                            .ok()
                            .filter(|&n| n > 0)
                            .ok_or_else(|| input.new_custom_error(()))?;
                        segment.nth_of_type = Some(n);
                    }
                    _ => {
                        input.reset(&start);
                        break;
                    }
                }
            }
            Ok(Compound::Segment(segment))
        }
        other => Err(location.new_unexpected_token_error(other)),
    }
}

fn parse_attribute<'i>(input: &mut Parser<'i, '_>) -> PResult<'i, (String, String)> {
    let name = input.expect_ident()?.to_string();
    input.expect_delim('=')?;
    let value = input.expect_ident_or_string()?.to_string();
    input.expect_exhausted()?;
    Ok((name, value))
}

fn marker_from(attrs: &[(String, String)]) -> Option<Anchor> {
    let flagged = attrs.iter().any(|(n, v)| n == MARKER_ATTR && v == "true");
    let time = attrs
        .iter()
        .find(|(n, _)| n == MARKER_TIME_ATTR)
        .map(|(_, v)| v.clone())?;
    (flagged && attrs.len() == 2).then_some(Anchor::Marker(time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Document, SelectorSet};

    fn section(doc: &Document, selector: &str) -> NodeId {
        SelectorSet::parse(selector)
            .unwrap()
            .query_first(doc.dom(), doc.dom().document())
            .unwrap()
    }

    fn nth(doc: &Document, root: NodeId, tag: &str, n: usize) -> NodeId {
        doc.dom()
            .descendants(root)
            .filter(|&id| doc.dom().is_tag(id, tag))
            .nth(n)
            .unwrap()
    }

    #[test]
    fn test_path_from_section_root() {
        let doc = Document::parse(
            r#"<section id="services"><div class="container"><h2 class="section-title">Services</h2></div></section>"#,
        )
        .unwrap();
        let root = section(&doc, "#services");
        let h2 = nth(&doc, root, "h2", 0);

        let locator = compute_path(doc.dom(), h2, root);
        assert_eq!(locator.to_string(), "div.container > h2.section-title");
        assert_eq!(locator.resolve(doc.dom(), root), Some(h2));
    }

    #[test]
    fn test_id_anchor_below_root() {
        let doc = Document::parse(
            r#"<section id="home"><div id="hero-copy"><p>One</p></div></section>"#,
        )
        .unwrap();
        let root = section(&doc, "#home");
        let p = nth(&doc, root, "p", 0);

        let locator = compute_path(doc.dom(), p, root);
        assert_eq!(locator.to_string(), "#hero-copy > p");
        assert_eq!(locator.anchor(), &Anchor::Id("hero-copy".into()));
        assert_eq!(resolve_path(doc.dom(), "#hero-copy > p", root), Some(p));
    }

    #[test]
    fn test_nth_of_type_counts_same_tag_only() {
        // The <h3> between the paragraphs does not shift the ordinal.
        let doc = Document::parse(
            r#"<div class="s"><p>a</p><h3>t</h3><p>b</p><p class="note">c</p></div>"#,
        )
        .unwrap();
        let root = section(&doc, ".s");
        let b = nth(&doc, root, "p", 1);
        let c = nth(&doc, root, "p", 2);

        assert_eq!(compute_path(doc.dom(), b, root).to_string(), "p:nth-of-type(2)");
        assert_eq!(compute_path(doc.dom(), c, root).to_string(), "p.note");
        let h3 = nth(&doc, root, "h3", 0);
        assert_eq!(compute_path(doc.dom(), h3, root).to_string(), "h3");

        for node in [b, c, h3] {
            let path = compute_path(doc.dom(), node, root).to_string();
            assert_eq!(resolve_path(doc.dom(), &path, root), Some(node), "{path}");
        }
    }

    #[test]
    fn test_unsafe_classes_and_ids_are_skipped() {
        let doc = Document::parse(
            r#"<div class="s"><span id="1st" class="md:flex tag">x</span></div>"#,
        )
        .unwrap();
        let root = section(&doc, ".s");
        let span = nth(&doc, root, "span", 0);

        let locator = compute_path(doc.dom(), span, root);
        assert_eq!(locator.to_string(), "span.tag");
        assert_eq!(locator.resolve(doc.dom(), root), Some(span));
    }

    #[test]
    fn test_marker_anchor_round_trip() {
        let doc = Document::parse(
            r##"<section class="s"><div class="container"><a href="#" class="admin-added-link" data-admin-added="true" data-admin-added-time="2024-05-01T12:00:00.000Z">New Link</a></div></section>"##,
        )
        .unwrap();
        let root = section(&doc, ".s");
        let a = nth(&doc, root, "a", 0);

        let locator = compute_path(doc.dom(), a, root);
        assert_eq!(locator, Locator::marker("2024-05-01T12:00:00.000Z"));
        let text = locator.to_string();
        assert_eq!(
            text,
            r#"[data-admin-added="true"][data-admin-added-time="2024-05-01T12:00:00.000Z"]"#
        );
        assert_eq!(resolve_path(doc.dom(), &text, root), Some(a));
    }

    #[test]
    fn test_child_and_parent() {
        let locator: Locator = "div.logo > h1.logo-text".parse().unwrap();
        let span = locator.child(Segment::tag("span"));
        assert_eq!(span.to_string(), "div.logo > h1.logo-text > span");
        assert_eq!(span.parent(), Some(locator));
        assert_eq!(Locator::marker("t").parent(), None);
    }

    #[test]
    fn test_drift_and_garbage_resolve_to_none() {
        let doc = Document::parse(r#"<div class="s"><p>a</p></div>"#).unwrap();
        let root = section(&doc, ".s");

        assert_eq!(resolve_path(doc.dom(), "p:nth-of-type(3)", root), None);
        assert_eq!(resolve_path(doc.dom(), "#gone > p", root), None);
        assert_eq!(resolve_path(doc.dom(), "new-1714564800000", root), None);
        assert_eq!(resolve_path(doc.dom(), "", root), None);
        assert_eq!(resolve_path(doc.dom(), "div p", root), None);
        assert!("p:nth-of-type(0)".parse::<Locator>().is_err());
        assert!("p > ".parse::<Locator>().is_err());
    }

    #[test]
    fn test_scope_is_the_root() {
        let doc = Document::parse(r#"<div class="s"><p>a</p></div>"#).unwrap();
        let root = section(&doc, ".s");
        assert_eq!(compute_path(doc.dom(), root, root).to_string(), ":scope");
        assert_eq!(resolve_path(doc.dom(), ":scope", root), Some(root));
    }
}
