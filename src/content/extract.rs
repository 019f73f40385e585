//! Content extraction.
//!
//! Text is extracted in two passes. Composite labels (a bare text run plus one
//! styled inline child, like `Social<span>Spark</span>`) are split into two
//! fields first and their subtrees marked processed; the generic pass then
//! walks every text-bearing tag in document order, skipping containers,
//! controls, decorations, rich links and duplicates. Images and links are a
//! single flat pass each.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::item::{ImageItem, LinkItem, SectionContent, TextItem, TextPart};
use super::locator::{Locator, Segment};
use super::store::ContentStore;
use crate::dom::{Document, Dom, NodeId, SelectorSet};
use crate::error::Result;
use crate::section::SectionMap;

/// Selector lists that drive extraction. Defaults match the stock page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractRules {
    /// Nodes always treated as composite labels.
    pub composite: Vec<String>,
    /// Tags the generic pass considers.
    pub text_tags: Vec<String>,
    /// A node containing any of these is a container and is skipped.
    pub container_tags: Vec<String>,
    /// Containers that are extracted whole anyway.
    pub leaf_aggregates: Vec<String>,
    pub form_controls: Vec<String>,
    /// Anything inside these is decoration, not copy.
    pub decorations: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ExtractRules {
    fn default() -> Self {
        Self {
            composite: strings(&[".logo-text", ".footer-logo h2"]),
            text_tags: strings(&[
                "h1", "h2", "h3", "h4", "h5", "h6", "p", "span", "div", "li", "a", "label",
                "button", "figcaption", "blockquote", "cite", "strong", "em", "small", "time",
                "address",
            ]),
            container_tags: strings(&[
                "h1", "h2", "h3", "h4", "h5", "h6", "p", "span", "a", "strong", "em", "small",
            ]),
            leaf_aggregates: strings(&[".testimonial-text", ".testimonial-author"]),
            form_controls: strings(&["button", "label", "input", "textarea", "select", "option"]),
            decorations: strings(&[".service-icon", ".portfolio-overlay", ".social-icon"]),
        }
    }
}

impl ExtractRules {
    pub fn compile(&self) -> Result<CompiledRules> {
        Ok(CompiledRules {
            composite: SelectorSet::from_list(&self.composite)?,
            text_tags: SelectorSet::from_list(&self.text_tags)?,
            containers: SelectorSet::from_list(&self.container_tags)?,
            leaf_aggregates: SelectorSet::from_list(&self.leaf_aggregates)?,
            form_controls: SelectorSet::from_list(&self.form_controls)?,
            decorations: SelectorSet::from_list(&self.decorations)?,
        })
    }
}

/// [`ExtractRules`] with every list compiled to a selector set.
#[derive(Debug, Clone)]
pub struct CompiledRules {
    composite: SelectorSet,
    text_tags: SelectorSet,
    containers: SelectorSet,
    leaf_aggregates: SelectorSet,
    form_controls: SelectorSet,
    decorations: SelectorSet,
}

impl Default for CompiledRules {
    fn default() -> Self {
        match ExtractRules::default().compile() {
            Ok(rules) => rules,
            Err(e) => {
                tracing::error!(error = %e, "default extraction rules failed to compile");
                Self {
                    composite: SelectorSet::empty(),
                    text_tags: SelectorSet::empty(),
                    containers: SelectorSet::empty(),
                    leaf_aggregates: SelectorSet::empty(),
                    form_controls: SelectorSet::empty(),
                    decorations: SelectorSet::empty(),
                }
            }
        }
    }
}

impl CompiledRules {
    fn is_composite(&self, dom: &Dom, id: NodeId) -> bool {
        self.composite.matches(dom, id)
            || (self.text_tags.matches(dom, id) && has_composite_shape(dom, id))
    }

    fn is_container(&self, dom: &Dom, id: NodeId) -> bool {
        self.containers.query_first(dom, id).is_some()
    }
}

/// One or more non-blank direct text runs plus exactly one element child,
/// a `<span>` with no element children of its own.
fn has_composite_shape(dom: &Dom, id: NodeId) -> bool {
    let mut elements = dom.element_children(id);
    let (Some(only), None) = (elements.next(), elements.next()) else {
        return false;
    };
    dom.is_tag(only, "span") && !dom.has_element_children(only) && !direct_text_runs(dom, id).is_empty()
}

/// Trimmed, non-blank direct text children.
pub(crate) fn direct_text_runs(dom: &Dom, id: NodeId) -> Vec<String> {
    dom.children(id)
        .filter_map(|c| dom.text(c))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// The composite main value: direct text runs joined by one space.
pub(crate) fn composite_main(dom: &Dom, id: NodeId) -> String {
    direct_text_runs(dom, id).join(" ")
}

/// The first `<span>` child, which holds the composite accent.
pub(crate) fn composite_span(dom: &Dom, id: NodeId) -> Option<NodeId> {
    dom.element_children(id).find(|&c| dom.is_tag(c, "span"))
}

/// Extract the editable content of one section.
pub fn extract(doc: &Document, root: NodeId, rules: &CompiledRules) -> SectionContent {
    let dom = doc.dom();
    let mut processed: HashSet<NodeId> = HashSet::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut texts = Vec::new();

    let composites: Vec<NodeId> = dom
        .descendants(root)
        .filter(|&id| dom.is_element(id) && rules.is_composite(dom, id))
        .collect();

    for (index, node) in composites.into_iter().enumerate() {
        if processed.contains(&node) {
            continue;
        }
        let Some([main, span]) = composite_items(doc, node, root, index) else {
            continue;
        };
        // Halves may repeat each other, but a half already emitted elsewhere
        // sends the whole node to the generic pass.
        if seen.contains(&main.content) || seen.contains(&span.content) {
            tracing::debug!(node = %main.path, "composite repeats earlier text, not split");
            continue;
        }
        processed.insert(node);
        processed.extend(dom.descendants(node));
        seen.insert(main.content.clone());
        seen.insert(span.content.clone());
        texts.push(main);
        texts.push(span);
    }
    let split = processed.clone();

    let candidates = rules.text_tags.query_all(dom, root);
    let eligible: HashMap<NodeId, String> = candidates
        .iter()
        .filter(|&&node| !processed.contains(&node))
        .filter_map(|&node| candidate_text(doc, rules, node).map(|text| (node, text)))
        .collect();

    for (index, &node) in candidates.iter().enumerate() {
        if processed.contains(&node) {
            continue;
        }
        let Some(content) = eligible.get(&node) else {
            continue;
        };
        let leaf = rules.leaf_aggregates.matches(dom, node);
        // A node that wraps another extracted node is a container too, or its
        // combined text would go stale once the inner node is edited.
        let wraps_extracted = || {
            dom.descendants(node)
                .any(|d| eligible.contains_key(&d) || split.contains(&d))
        };
        if !leaf && (rules.is_container(dom, node) || wraps_extracted()) {
            continue;
        }
        if seen.contains(content) {
            continue;
        }

        seen.insert(content.clone());
        processed.insert(node);
        if leaf {
            processed.extend(dom.descendants(node));
        }

        texts.push(TextItem {
            id: format!("text-{index}"),
            element: dom.tag(node).unwrap_or_default().to_string(),
            content: content.clone(),
            path: Locator::compute(dom, node, root).to_string(),
            is_new: false,
            part: None,
            original_element: None,
        });
    }

    let images = dom
        .descendants(root)
        .filter(|&id| dom.is_tag(id, "img"))
        .enumerate()
        .map(|(index, node)| ImageItem {
            id: format!("image-{index}"),
            src: dom.get_attr(node, "src").unwrap_or_default().to_string(),
            alt: dom.get_attr(node, "alt").unwrap_or_default().to_string(),
            path: Locator::compute(dom, node, root).to_string(),
            is_new: false,
        })
        .collect();

    let links = dom
        .descendants(root)
        .filter(|&id| dom.is_tag(id, "a"))
        .enumerate()
        .map(|(index, node)| LinkItem {
            id: format!("link-{index}"),
            href: dom.get_attr(node, "href").unwrap_or_default().to_string(),
            text: dom.collect_text(node).trim().to_string(),
            path: Locator::compute(dom, node, root).to_string(),
            is_new: false,
        })
        .collect();

    SectionContent {
        texts,
        images,
        links,
    }
}

/// Split a composite node into its main and span items. `None` unless both
/// halves have text.
fn composite_items(doc: &Document, node: NodeId, root: NodeId, index: usize) -> Option<[TextItem; 2]> {
    let dom = doc.dom();
    let main = composite_main(dom, node);
    let span = dom.collect_text(composite_span(dom, node)?).trim().to_string();
    if main.is_empty() || span.is_empty() {
        return None;
    }

    let locator = Locator::compute(dom, node, root);
    let original = doc.outer_html(node);

    Some([
        TextItem {
            id: format!("text-main-{index}"),
            element: dom.tag(node).unwrap_or_default().to_string(),
            content: main,
            path: locator.to_string(),
            is_new: false,
            part: Some(TextPart::Main),
            original_element: Some(original.clone()),
        },
        TextItem {
            id: format!("text-span-{index}"),
            element: "span".into(),
            content: span,
            path: locator.child(Segment::tag("span")).to_string(),
            is_new: false,
            part: Some(TextPart::Span),
            original_element: Some(original),
        },
    ])
}

/// Trimmed text of a node the generic pass may emit, ignoring dedup and
/// container checks.
fn candidate_text(doc: &Document, rules: &CompiledRules, node: NodeId) -> Option<String> {
    let dom = doc.dom();
    let content = dom.collect_text(node).trim().to_string();
    let skip = content.is_empty()
        || rules.form_controls.matches(dom, node)
        || rules.decorations.closest(dom, node).is_some()
        || (dom.is_tag(node, "a") && !is_plain_text(dom, node, &content));
    (!skip).then_some(content)
}

/// Whether an element's inner HTML is nothing but its escaped text: text
/// children only, with no no-break space (serialized as `&nbsp;`) among the
/// trimmed-off edges.
fn is_plain_text(dom: &Dom, node: NodeId, trimmed_text: &str) -> bool {
    dom.children(node).all(|c| dom.is_text(c))
        && dom
            .collect_text(node)
            .trim_matches(|c: char| c.is_whitespace() && c != '\u{a0}')
            == trimmed_text
}

/// Extract every section of the map that is present in the document.
///
/// Sections whose selector matches nothing are logged and left out of the
/// store.
pub fn extract_all(doc: &Document, sections: &SectionMap, rules: &CompiledRules) -> ContentStore {
    let mut store = ContentStore::new();
    for section in sections.iter() {
        match sections.resolve(doc, &section.id) {
            Some(root) => {
                let content = extract(doc, root, rules);
                tracing::debug!(
                    section = %section.id,
                    texts = content.texts.len(),
                    images = content.images.len(),
                    links = content.links.len(),
                    "extracted section"
                );
                store.insert(section.id.clone(), content);
            }
            None => {
                tracing::warn!(section = %section.id, selector = %section.selector, "section not found in document");
            }
        }
    }
    store
}
