//! Compiled selector lists and DOM-style queries over the arena.

use std::fmt;

use cssparser::{Parser, ParserInput};
use selectors::context::{MatchingContext, QuirksMode, SelectorCaches};
use selectors::matching::{MatchingForInvalidation, MatchingMode, NeedsSelectorFlags};
use selectors::parser::{ParseRelative, Selector, SelectorList};

use super::arena::{Dom, NodeId};
use super::element_ref::{ElementRef, SiteSelectors};
use crate::error::{Error, Result};

/// A comma-separated selector list, parsed once and matched many times.
#[derive(Clone)]
pub struct SelectorSet {
    source: String,
    selectors: Vec<Selector<SiteSelectors>>,
}

impl SelectorSet {
    /// Parse a selector list such as `".logo-text, .footer-logo h2"`.
    pub fn parse(source: &str) -> Result<Self> {
        let mut input = ParserInput::new(source);
        let mut parser = Parser::new(&mut input);
        let list = SelectorList::parse(&SiteSelectors, &mut parser, ParseRelative::No).map_err(
            |e| Error::InvalidSelector {
                selector: source.to_string(),
                reason: format!("{:?}", e.kind),
            },
        )?;

        Ok(Self {
            source: source.to_string(),
            selectors: list.slice().to_vec(),
        })
    }

    /// Build a set from several selector strings. An empty slice never matches.
    pub fn from_list<S: AsRef<str>>(items: &[S]) -> Result<Self> {
        let joined = items
            .iter()
            .map(AsRef::as_ref)
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        if joined.is_empty() {
            return Ok(Self::empty());
        }
        Self::parse(&joined)
    }

    /// A set that matches nothing.
    pub fn empty() -> Self {
        Self {
            source: String::new(),
            selectors: Vec::new(),
        }
    }

    /// The text this set was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    /// Whether the element matches any selector in the set.
    pub fn matches(&self, dom: &Dom, id: NodeId) -> bool {
        if self.selectors.is_empty() || !dom.is_element(id) {
            return false;
        }
        let mut caches = SelectorCaches::default();
        self.matches_with_caches(dom, id, &mut caches)
    }

    fn matches_with_caches(&self, dom: &Dom, id: NodeId, caches: &mut SelectorCaches) -> bool {
        let elem = ElementRef::new(dom, id);
        let mut context = MatchingContext::new(
            MatchingMode::Normal,
            None,
            caches,
            QuirksMode::NoQuirks,
            NeedsSelectorFlags::No,
            MatchingForInvalidation::No,
        );
        self.selectors
            .iter()
            .any(|selector| selectors::matching::matches_selector(selector, 0, None, &elem, &mut context))
    }

    /// First matching descendant of `root` in document order (`querySelector`).
    pub fn query_first(&self, dom: &Dom, root: NodeId) -> Option<NodeId> {
        self.query_all(dom, root).into_iter().next()
    }

    /// All matching descendants of `root` in document order (`querySelectorAll`).
    pub fn query_all(&self, dom: &Dom, root: NodeId) -> Vec<NodeId> {
        if self.selectors.is_empty() {
            return Vec::new();
        }
        let mut caches = SelectorCaches::default();
        dom.descendants(root)
            .filter(|&id| dom.is_element(id) && self.matches_with_caches(dom, id, &mut caches))
            .collect()
    }

    /// Nearest inclusive ancestor matching the set (`Element.closest`).
    pub fn closest(&self, dom: &Dom, id: NodeId) -> Option<NodeId> {
        if self.selectors.is_empty() {
            return None;
        }
        let mut caches = SelectorCaches::default();
        std::iter::once(id)
            .chain(dom.ancestors(id))
            .filter(|&n| dom.is_element(n))
            .find(|&n| self.matches_with_caches(dom, n, &mut caches))
    }
}

impl fmt::Debug for SelectorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SelectorSet").field(&self.source).finish()
    }
}
