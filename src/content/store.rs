//! The editable content store.
//!
//! A plain map from section id to [`SectionContent`], passed by reference to
//! the extractor, the injector and the reconciler. Updates never fail: an
//! unknown section or item id is a silent no-op, since the UI can race a
//! section switch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::item::{ContentItem, Field, SectionContent};
use crate::section::SectionMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentStore {
    sections: BTreeMap<String, SectionContent>,
}

impl ContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, section: &str) -> Option<&SectionContent> {
        self.sections.get(section)
    }

    pub fn get_mut(&mut self, section: &str) -> Option<&mut SectionContent> {
        self.sections.get_mut(section)
    }

    /// Replace a section's content wholesale (used by extraction).
    pub fn insert(&mut self, section: impl Into<String>, content: SectionContent) {
        self.sections.insert(section.into(), content);
    }

    pub fn contains(&self, section: &str) -> bool {
        self.sections.contains_key(section)
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn clear(&mut self) {
        self.sections.clear();
    }

    /// Section ids in sorted order.
    pub fn section_ids(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    /// Sections present in the store, in section-map order.
    pub fn iter_in<'a>(
        &'a self,
        map: &'a SectionMap,
    ) -> impl Iterator<Item = (&'a str, &'a SectionContent)> + 'a {
        map.iter()
            .filter_map(|s| self.sections.get(&s.id).map(|c| (s.id.as_str(), c)))
    }

    /// Set one field of one item. Returns whether anything was applied.
    ///
    /// A field that does not belong to the item's kind (say `src` on a text
    /// item) is ignored, as are unknown section and item ids.
    pub fn update_field(&mut self, section: &str, item: &str, field: Field, value: &str) -> bool {
        let Some(content) = self.sections.get_mut(section) else {
            tracing::debug!(section, item, "update for unknown section ignored");
            return false;
        };

        let slot = match field {
            Field::Content => content
                .texts
                .iter_mut()
                .find(|t| t.id == item)
                .map(|t| &mut t.content),
            Field::Src => content
                .images
                .iter_mut()
                .find(|i| i.id == item)
                .map(|i| &mut i.src),
            Field::Alt => content
                .images
                .iter_mut()
                .find(|i| i.id == item)
                .map(|i| &mut i.alt),
            Field::Href => content
                .links
                .iter_mut()
                .find(|l| l.id == item)
                .map(|l| &mut l.href),
            Field::Text => content
                .links
                .iter_mut()
                .find(|l| l.id == item)
                .map(|l| &mut l.text),
        };

        match slot {
            Some(slot) => {
                *slot = value.to_string();
                true
            }
            None => {
                tracing::debug!(section, item, %field, "update for unknown item ignored");
                false
            }
        }
    }

    /// Append an item to a section that is already in the store.
    pub fn append_new(&mut self, section: &str, item: ContentItem) -> bool {
        match self.sections.get_mut(section) {
            Some(content) => {
                content.push(item);
                true
            }
            None => {
                tracing::debug!(section, "append to unknown section ignored");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::item::{ImageItem, LinkItem, TextItem};

    fn store() -> ContentStore {
        let mut store = ContentStore::new();
        store.insert(
            "hero",
            SectionContent {
                texts: vec![TextItem {
                    id: "text-0".into(),
                    element: "h1".into(),
                    content: "Grow".into(),
                    path: "h1".into(),
                    is_new: false,
                    part: None,
                    original_element: None,
                }],
                images: vec![ImageItem {
                    id: "image-0".into(),
                    src: "hero.png".into(),
                    alt: "".into(),
                    path: "img".into(),
                    is_new: false,
                }],
                links: vec![LinkItem {
                    id: "link-0".into(),
                    href: "#contact".into(),
                    text: "Talk to us".into(),
                    path: "a".into(),
                    is_new: false,
                }],
            },
        );
        store
    }

    #[test]
    fn test_update_each_field() {
        let mut s = store();
        assert!(s.update_field("hero", "text-0", Field::Content, "Scale"));
        assert!(s.update_field("hero", "image-0", Field::Alt, "Team photo"));
        assert!(s.update_field("hero", "link-0", Field::Href, "/contact"));

        let hero = s.get("hero").unwrap();
        assert_eq!(hero.texts[0].content, "Scale");
        assert_eq!(hero.images[0].alt, "Team photo");
        assert_eq!(hero.links[0].href, "/contact");
    }

    #[test]
    fn test_unknown_ids_are_silent_noops() {
        let mut s = store();
        let before = s.clone();
        assert!(!s.update_field("pricing", "text-0", Field::Content, "x"));
        assert!(!s.update_field("hero", "text-9", Field::Content, "x"));
        // Field of another kind on an existing id.
        assert!(!s.update_field("hero", "text-0", Field::Src, "x.png"));
        assert_eq!(s, before);
    }

    #[test]
    fn test_append_new_requires_section() {
        let mut s = store();
        let link = ContentItem::Link(LinkItem {
            id: "link-1".into(),
            href: "#".into(),
            text: "New Link".into(),
            path: "new-1".into(),
            is_new: true,
        });
        assert!(!s.append_new("pricing", link.clone()));
        assert!(s.append_new("hero", link));
        assert_eq!(s.get("hero").unwrap().links.len(), 2);
    }

    #[test]
    fn test_iter_in_follows_section_order() {
        let mut s = store();
        s.insert("footer", SectionContent::default());
        s.insert("not-a-section", SectionContent::default());
        let map = SectionMap::default();
        let ids: Vec<_> = s.iter_in(&map).map(|(id, _)| id).collect();
        assert_eq!(ids, ["hero", "footer"]);
    }

    #[test]
    fn test_store_json_is_keyed_by_section() {
        let s = store();
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["hero"]["texts"][0]["content"], "Grow");
        let back: ContentStore = serde_json::from_value(json).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn test_store_json_order_is_stable() {
        let mut a = ContentStore::new();
        let mut b = ContentStore::new();
        for id in ["stats", "hero", "footer", "contact"] {
            a.insert(id, SectionContent::default());
        }
        for id in ["contact", "footer", "hero", "stats"] {
            b.insert(id, SectionContent::default());
        }
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, serde_json::to_string(&b).unwrap());
        assert!(json.starts_with(r#"{"contact":"#));
        assert_eq!(a.section_ids().collect::<Vec<_>>(), ["contact", "footer", "hero", "stats"]);
    }
}
