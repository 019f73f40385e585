//! New-element injection.
//!
//! `add_*` push placeholder items (`is_new`, synthetic `new-<ms>` path) into
//! the store. [`materialize`] later turns them into real nodes at the end of
//! the section's container, stamps them with the marker attribute pair and
//! swaps the synthetic path for a marker locator.

use std::fmt;

use super::item::{ContentItem, ImageItem, ItemKind, LinkItem, SectionContent, TextItem};
use super::locator::{Locator, MARKER_ATTR, MARKER_TIME_ATTR, is_marker};
use super::store::ContentStore;
use crate::dom::{Document, Dom, NodeId};
use crate::util::{is_css_identifier, iso_timestamp, now_millis};

pub const PLACEHOLDER_TEXT: &str = "New text content";
pub const PLACEHOLDER_IMAGE_SRC: &str = "https://via.placeholder.com/300x200?text=New+Image";
pub const PLACEHOLDER_IMAGE_ALT: &str = "New image";
pub const PLACEHOLDER_LINK_HREF: &str = "#";
pub const PLACEHOLDER_LINK_TEXT: &str = "New Link";

pub const TEXT_CLASS: &str = "admin-added-content";
pub const IMAGE_CLASS: &str = "admin-added-image";
pub const LINK_CLASS: &str = "admin-added-link";

/// Source of "now" in epoch milliseconds.
pub type Clock = fn() -> i64;

/// Creates placeholder items and notifies a listener so the editor can
/// refresh the section.
pub struct Injector {
    clock: Clock,
    listener: Option<Box<dyn FnMut(&str)>>,
}

impl Default for Injector {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector")
            .field("listener", &self.listener.is_some())
            .finish_non_exhaustive()
    }
}

impl Injector {
    pub fn new() -> Self {
        Self {
            clock: now_millis,
            listener: None,
        }
    }

    /// Use a fixed or simulated clock.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Call `listener` with the section id after every successful add.
    pub fn on_add(mut self, listener: impl FnMut(&str) + 'static) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Add a placeholder text item. `tag` is the element it will become.
    pub fn add_text(&mut self, store: &mut ContentStore, section: &str, tag: &str) -> Option<String> {
        self.add(store, section, ItemKind::Text, |id, path| {
            ContentItem::Text(TextItem {
                id,
                element: tag.to_string(),
                content: PLACEHOLDER_TEXT.into(),
                path,
                is_new: true,
                part: None,
                original_element: None,
            })
        })
    }

    pub fn add_image(&mut self, store: &mut ContentStore, section: &str) -> Option<String> {
        self.add(store, section, ItemKind::Image, |id, path| {
            ContentItem::Image(ImageItem {
                id,
                src: PLACEHOLDER_IMAGE_SRC.into(),
                alt: PLACEHOLDER_IMAGE_ALT.into(),
                path,
                is_new: true,
            })
        })
    }

    pub fn add_link(&mut self, store: &mut ContentStore, section: &str) -> Option<String> {
        self.add(store, section, ItemKind::Link, |id, path| {
            ContentItem::Link(LinkItem {
                id,
                href: PLACEHOLDER_LINK_HREF.into(),
                text: PLACEHOLDER_LINK_TEXT.into(),
                path,
                is_new: true,
            })
        })
    }

    fn add(
        &mut self,
        store: &mut ContentStore,
        section: &str,
        kind: ItemKind,
        build: impl FnOnce(String, String) -> ContentItem,
    ) -> Option<String> {
        let Some(content) = store.get(section) else {
            tracing::debug!(section, "cannot add to a section that is not loaded");
            return None;
        };

        let millis = (self.clock)();
        let id = unique_id(content, kind, millis);
        let item = build(id.clone(), format!("new-{millis}"));
        store.append_new(section, item);
        tracing::debug!(section, id = %id, "added placeholder item");

        if let Some(listener) = self.listener.as_mut() {
            listener(section);
        }
        Some(id)
    }

    /// Materialize pending items using this injector's clock.
    pub fn materialize(&self, doc: &mut Document, section_root: NodeId, content: &mut SectionContent) -> usize {
        materialize(doc, section_root, content, (self.clock)())
    }
}

fn unique_id(content: &SectionContent, kind: ItemKind, millis: i64) -> String {
    let base = format!("{}-{millis}", kind.prefix());
    if !content.contains_id(&base) {
        return base;
    }
    let mut n = 2;
    loop {
        let id = format!("{base}-{n}");
        if !content.contains_id(&id) {
            return id;
        }
        n += 1;
    }
}

/// Create nodes for every `is_new` item of a section and give them marker
/// locators. Returns how many were created.
///
/// Nodes are appended to the first `.container` inside the section, else to
/// the section root. Already materialized items are left alone, so calling
/// this twice adds nothing the second time.
pub fn materialize(doc: &mut Document, section_root: NodeId, content: &mut SectionContent, now_millis: i64) -> usize {
    let container = find_container(doc.dom(), section_root);
    let dom = doc.dom_mut();
    let mut millis = now_millis;
    let mut created = 0;

    for text in content.texts.iter_mut().filter(|t| t.is_new) {
        let tag = if is_text_tag_name(&text.element) {
            text.element.to_ascii_lowercase()
        } else {
            tracing::warn!(item = %text.id, tag = %text.element, "invalid tag for new text, using <p>");
            "p".to_string()
        };
        let node = dom.create_html_element(&tag);
        dom.set_attr(node, "class", TEXT_CLASS);
        let time = stamp(dom, node, &mut millis);
        dom.set_text_content(node, &text.content);
        dom.append(container, node);

        text.path = Locator::marker(time).to_string();
        text.is_new = false;
        created += 1;
    }

    for image in content.images.iter_mut().filter(|i| i.is_new) {
        let node = dom.create_html_element("img");
        dom.set_attr(node, "src", &image.src);
        dom.set_attr(node, "alt", &image.alt);
        dom.set_attr(node, "class", IMAGE_CLASS);
        let time = stamp(dom, node, &mut millis);
        dom.append(container, node);

        image.path = Locator::marker(time).to_string();
        image.is_new = false;
        created += 1;
    }

    for link in content.links.iter_mut().filter(|l| l.is_new) {
        let node = dom.create_html_element("a");
        dom.set_attr(node, "href", &link.href);
        dom.set_attr(node, "class", LINK_CLASS);
        let time = stamp(dom, node, &mut millis);
        dom.set_text_content(node, &link.text);
        dom.append(container, node);

        link.path = Locator::marker(time).to_string();
        link.is_new = false;
        created += 1;
    }

    created
}

fn find_container(dom: &Dom, root: NodeId) -> NodeId {
    dom.descendants(root)
        .find(|&id| dom.element_classes(id).iter().any(|c| c == "container"))
        .unwrap_or(root)
}

/// Set the marker pair on `node`, advancing the clock one millisecond at a
/// time until no other node in the document carries the same timestamp.
fn stamp(dom: &mut Dom, node: NodeId, millis: &mut i64) -> String {
    let mut time = iso_timestamp(*millis);
    while marker_exists(dom, &time) {
        *millis += 1;
        time = iso_timestamp(*millis);
    }
    dom.set_attr(node, MARKER_ATTR, "true");
    dom.set_attr(node, MARKER_TIME_ATTR, &time);
    time
}

fn marker_exists(dom: &Dom, time: &str) -> bool {
    dom.descendants(dom.document())
        .any(|id| is_marker(dom, id, time))
}

/// Elements that cannot hold a text child.
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

fn is_text_tag_name(tag: &str) -> bool {
    tag.starts_with(|c: char| c.is_ascii_alphabetic())
        && is_css_identifier(tag)
        && !VOID_TAGS.contains(&tag.to_ascii_lowercase().as_str())
}
