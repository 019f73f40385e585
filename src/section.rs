//! The section map: named, selector-addressed regions of the page.
//!
//! A section is the unit of editing. The map is ordered (extraction and
//! reconciliation both walk it front to back) and immutable once built.

use serde::{Deserialize, Serialize};

use crate::dom::{Document, NodeId, SelectorSet};
use crate::error::Result;

/// A named region of the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub title: String,
    pub selector: String,
}

impl Section {
    pub fn new(id: impl Into<String>, title: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            selector: selector.into(),
        }
    }
}

/// The sections of the stock marketing page the panel was built for.
pub fn default_sections() -> Vec<Section> {
    vec![
        Section::new("header", "Header", "header"),
        Section::new("hero", "Hero Section", "#home"),
        Section::new("services", "Services Section", "#services"),
        Section::new("this-and-that", "This & That Section", ".this-and-that"),
        Section::new("portfolio", "Portfolio Section", "#portfolio"),
        Section::new("testimonial", "Testimonial Section", ".testimonial"),
        Section::new("stats", "Stats Section", "#stats"),
        Section::new("contact", "Contact Section", "#contact"),
        Section::new("footer", "Footer Section", "footer"),
    ]
}

/// Ordered sections with their selectors compiled.
#[derive(Debug, Clone)]
pub struct SectionMap {
    entries: Vec<(Section, SelectorSet)>,
}

impl SectionMap {
    /// Compile every section selector. Fails on the first invalid one.
    pub fn new(sections: Vec<Section>) -> Result<Self> {
        let entries = sections
            .into_iter()
            .map(|section| {
                let selector = SelectorSet::parse(&section.selector)?;
                Ok((section, selector))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sections in map order.
    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.entries.iter().map(|(section, _)| section)
    }

    /// Look up a section by id. Unknown ids yield `None`.
    pub fn get(&self, id: &str) -> Option<&Section> {
        self.entries
            .iter()
            .find(|(section, _)| section.id == id)
            .map(|(section, _)| section)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// The first element in `doc` matching the section's selector.
    pub fn resolve(&self, doc: &Document, id: &str) -> Option<NodeId> {
        let (_, selector) = self.entries.iter().find(|(section, _)| section.id == id)?;
        selector.query_first(doc.dom(), doc.dom().document())
    }
}

impl Default for SectionMap {
    fn default() -> Self {
        let entries = default_sections()
            .into_iter()
            .filter_map(|section| {
                let selector = SelectorSet::parse(&section.selector).ok()?;
                Some((section, selector))
            })
            .collect();
        Self { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_default_map_order() {
        let map = SectionMap::default();
        let ids: Vec<_> = map.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(
            ids,
            [
                "header",
                "hero",
                "services",
                "this-and-that",
                "portfolio",
                "testimonial",
                "stats",
                "contact",
                "footer"
            ]
        );
    }

    #[test]
    fn test_lookup_unknown_id() {
        let map = SectionMap::default();
        assert_eq!(map.get("hero").map(|s| s.selector.as_str()), Some("#home"));
        assert!(map.get("pricing").is_none());
        assert!(!map.contains("pricing"));
    }

    #[test]
    fn test_resolve_against_document() {
        let doc = Document::parse(
            r#"<header><nav>n</nav></header><section id="home"><h1>Hi</h1></section>"#,
        )
        .unwrap();
        let map = SectionMap::default();

        let hero = map.resolve(&doc, "hero").unwrap();
        assert_eq!(doc.dom().element_id(hero), Some("home"));
        assert!(map.resolve(&doc, "footer").is_none());
        assert!(map.resolve(&doc, "nope").is_none());
    }

    #[test]
    fn test_invalid_selector_is_rejected() {
        let err = SectionMap::new(vec![Section::new("bad", "Bad", "#")]).unwrap_err();
        assert!(matches!(err, Error::InvalidSelector { .. }));
    }
}
