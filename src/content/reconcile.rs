//! Reconciliation: re-apply the content store onto a fresh parse of the page.
//!
//! Every item is re-located by its locator and only the fields its kind owns
//! are written, and only when the stored value differs from the live one.
//! Anything that no longer lines up (a locator that drifted, a tag that
//! changed, a target inside a protected region) is logged and skipped; the
//! rest of the batch always goes through.
//!
//! Order within one run is fixed: updates for existing items in every section,
//! then materialization of new items, then the freshness marker, then
//! serialization.

use super::extract::{composite_main, composite_span};
use super::inject::{Clock, materialize};
use super::item::{ImageItem, LinkItem, SectionContent, TextItem, TextPart};
use super::locator::{Locator, resolve_path};
use super::store::ContentStore;
use crate::config::{BuiltConfig, DEFAULT_PROTECTED, Freshness};
use crate::dom::{Document, Dom, NodeData, NodeId, SelectorSet};
use crate::error::Result;
use crate::section::SectionMap;
use crate::util::{iso_timestamp, now_millis};

/// Text the freshness comment starts with.
pub const FRESHNESS_PREFIX: &str = "Last updated:";

/// What a reconciliation run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Fields written (a composite counts each half).
    pub written: usize,
    /// Items skipped because their locator or tag no longer matched.
    pub skipped: usize,
    /// Items refused because they sit inside a protected region.
    pub protected: usize,
    /// Sections with stored content whose selector matched nothing.
    pub missing_sections: Vec<String>,
    /// New items turned into nodes.
    pub materialized: usize,
}

/// Applies a [`ContentStore`] to a document.
#[derive(Debug, Clone)]
pub struct Reconciler<'a> {
    sections: &'a SectionMap,
    protected: SelectorSet,
    freshness: Freshness,
    clock: Clock,
}

impl<'a> Reconciler<'a> {
    pub fn new(sections: &'a SectionMap, protected: SelectorSet) -> Self {
        Self {
            sections,
            protected,
            freshness: Freshness::default(),
            clock: now_millis,
        }
    }

    pub fn from_config(config: &'a BuiltConfig) -> Self {
        Self::new(&config.sections, config.protected.clone()).with_freshness(config.freshness.clone())
    }

    pub fn with_freshness(mut self, freshness: Freshness) -> Self {
        self.freshness = freshness;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Reconcile `original_html` with the store.
    ///
    /// The document is parsed fresh on every call. New items in the store are
    /// materialized and updated in place (real locator, `is_new` cleared).
    /// Only a parse failure is an error.
    pub fn run(&self, original_html: &str, store: &mut ContentStore) -> Result<(String, ReconcileReport)> {
        let mut doc = Document::parse(original_html)?;
        let mut report = ReconcileReport::default();

        for id in store.section_ids() {
            if !self.sections.contains(id) {
                tracing::warn!(section = id, "stored content for unknown section ignored");
            }
        }

        let mut roots = Vec::new();
        for section in self.sections.iter() {
            let Some(content) = store.get_mut(&section.id) else {
                continue;
            };
            let Some(root) = self.sections.resolve(&doc, &section.id) else {
                tracing::warn!(
                    section = %section.id,
                    selector = %section.selector,
                    "section not found in document, skipping its edits"
                );
                report.missing_sections.push(section.id.clone());
                continue;
            };

            SectionPass {
                dom: doc.dom_mut(),
                root,
                section: &section.id,
                protected: &self.protected,
                report: &mut report,
                text_written: Vec::new(),
                link_written: Vec::new(),
            }
            .apply(content);
            roots.push((section.id.clone(), root));
        }

        let now = (self.clock)();
        for (id, root) in &roots {
            if let Some(content) = store.get_mut(id) {
                report.materialized += materialize(&mut doc, *root, content, now);
            }
        }

        self.mark_fresh(&mut doc, now);

        tracing::info!(
            written = report.written,
            skipped = report.skipped,
            protected = report.protected,
            materialized = report.materialized,
            missing_sections = report.missing_sections.len(),
            "reconciled document"
        );
        Ok((doc.to_html(), report))
    }

    fn mark_fresh(&self, doc: &mut Document, now: i64) {
        if self.freshness.cache_meta {
            add_cache_meta(doc);
        }
        if !self.freshness.comment {
            return;
        }
        let Some(body) = doc.body() else {
            return;
        };

        let dom = doc.dom_mut();
        let stale: Vec<NodeId> = dom
            .children(body)
            .filter(|&c| is_freshness_comment(dom, c))
            .collect();
        for node in stale {
            dom.detach(node);
        }
        let comment = dom.create_comment(format!("{FRESHNESS_PREFIX} {}", iso_timestamp(now)));
        dom.append(body, comment);
    }
}

/// Reconcile with the default protected regions and freshness marker.
pub fn reconcile(original_html: &str, store: &mut ContentStore, sections: &SectionMap) -> Result<String> {
    let protected = SelectorSet::from_list(DEFAULT_PROTECTED)?;
    let (html, _) = Reconciler::new(sections, protected).run(original_html, store)?;
    Ok(html)
}

fn is_freshness_comment(dom: &Dom, id: NodeId) -> bool {
    matches!(
        dom.get(id).map(|n| &n.data),
        Some(NodeData::Comment(text)) if text.trim_start().starts_with(FRESHNESS_PREFIX)
    )
}

fn add_cache_meta(doc: &mut Document) {
    let Some(head) = doc.head() else {
        return;
    };
    let dom = doc.dom_mut();
    let present = dom.descendants(head).any(|n| {
        dom.get_attr(n, "http-equiv")
            .is_some_and(|v| v.eq_ignore_ascii_case("cache-control"))
    });
    if present {
        return;
    }

    for (equiv, content) in [
        ("Cache-Control", "no-cache, no-store, must-revalidate"),
        ("Pragma", "no-cache"),
        ("Expires", "0"),
    ] {
        let meta = dom.create_html_element("meta");
        dom.set_attr(meta, "http-equiv", equiv);
        dom.set_attr(meta, "content", content);
        dom.append(head, meta);
    }
}

/// Both halves of one composite node, located through one container path.
struct CompositeGroup<'c> {
    original: &'c str,
    container: String,
    main: Option<&'c TextItem>,
    span: Option<&'c TextItem>,
}

/// Applies one section's content to its subtree.
struct SectionPass<'d, 'r> {
    dom: &'d mut Dom,
    root: NodeId,
    section: &'r str,
    protected: &'r SelectorSet,
    report: &'r mut ReconcileReport,
    /// Nodes a text item wrote into during this pass.
    text_written: Vec<NodeId>,
    /// Anchors whose text a link item rewrote during this pass.
    link_written: Vec<NodeId>,
}

impl SectionPass<'_, '_> {
    fn apply(&mut self, content: &mut SectionContent) {
        self.apply_composites(&content.texts);

        for text in content.texts.iter().filter(|t| !t.is_new && t.part.is_none()) {
            self.apply_text(text);
        }
        for image in content.images.iter().filter(|i| !i.is_new) {
            self.apply_image(image);
        }
        for link in content.links.iter_mut().filter(|l| !l.is_new) {
            self.apply_link(link);
        }

        if !self.link_written.is_empty() {
            for text in content.texts.iter_mut().filter(|t| !t.is_new) {
                self.follow_link_write(text);
            }
        }
    }

    fn locate(&mut self, item: &str, path: &str) -> Option<NodeId> {
        let node = resolve_path(self.dom, path, self.root);
        if node.is_none() {
            tracing::warn!(section = self.section, item, path, "locator no longer resolves, skipping");
            self.report.skipped += 1;
        }
        node
    }

    fn refuse_protected(&mut self, node: NodeId, item: &str, path: &str) -> bool {
        let Some(region) = self.protected.closest(self.dom, node) else {
            return false;
        };
        tracing::warn!(
            section = self.section,
            item,
            path,
            region = self.dom.tag(region).unwrap_or_default(),
            "target is inside a protected region, skipping"
        );
        self.report.protected += 1;
        true
    }

    fn skip(&mut self, item: &str, path: &str, reason: &str) {
        tracing::warn!(section = self.section, item, path, reason, "skipping item");
        self.report.skipped += 1;
    }

    fn apply_composites(&mut self, texts: &[TextItem]) {
        let mut groups: Vec<CompositeGroup<'_>> = Vec::new();

        for text in texts.iter().filter(|t| !t.is_new) {
            let Some(part) = text.part else {
                continue;
            };
            let container = text.path.parse::<Locator>().ok().and_then(|l| match part {
                TextPart::Main => Some(l),
                TextPart::Span => l.parent(),
            });
            let Some(container) = container.map(|l| l.to_string()) else {
                self.skip(&text.id, &text.path, "composite locator has no container");
                continue;
            };
            let original = text.original_element.as_deref().unwrap_or_default();

            let index = match groups
                .iter()
                .position(|g| g.original == original && g.container == container)
            {
                Some(index) => index,
                None => {
                    groups.push(CompositeGroup {
                        original,
                        container,
                        main: None,
                        span: None,
                    });
                    groups.len() - 1
                }
            };
            match part {
                TextPart::Main => groups[index].main = Some(text),
                TextPart::Span => groups[index].span = Some(text),
            }
        }

        for group in groups {
            self.apply_composite(&group);
        }
    }

    fn apply_composite(&mut self, group: &CompositeGroup<'_>) {
        let label = group.main.or(group.span).map(|t| t.id.as_str()).unwrap_or_default();
        let Some(container) = self.locate(label, &group.container) else {
            return;
        };
        if self.refuse_protected(container, label, &group.container) {
            return;
        }

        let mut wrote = false;
        if let Some(main) = group.main
            && composite_main(self.dom, container) != main.content
        {
            if write_direct_text(self.dom, container, &main.content) {
                self.report.written += 1;
                wrote = true;
            } else {
                self.skip(&main.id, &main.path, "composite has no text run to write");
            }
        }

        if let Some(span) = group.span {
            match composite_span(self.dom, container) {
                Some(node) => {
                    if self.dom.collect_text(node).trim() != span.content {
                        self.dom.set_text_content(node, &span.content);
                        self.report.written += 1;
                        wrote = true;
                    }
                }
                None => self.skip(&span.id, &span.path, "composite has no <span>"),
            }
        }

        if wrote {
            self.text_written.push(container);
        }
    }

    fn apply_text(&mut self, text: &TextItem) {
        let Some(node) = self.locate(&text.id, &text.path) else {
            return;
        };
        if self.refuse_protected(node, &text.id, &text.path) {
            return;
        }
        if self.dom.collect_text(node).trim() == text.content {
            return;
        }

        if write_text(self.dom, node, &text.content) {
            self.report.written += 1;
            self.text_written.push(node);
        } else {
            self.skip(&text.id, &text.path, "no text node to write into");
        }
    }

    fn apply_image(&mut self, image: &ImageItem) {
        let Some(node) = self.locate(&image.id, &image.path) else {
            return;
        };
        if !self.dom.is_tag(node, "img") {
            let found = self.dom.tag(node).unwrap_or_default().to_string();
            self.skip(&image.id, &image.path, &format!("expected <img>, found <{found}>"));
            return;
        }
        if self.refuse_protected(node, &image.id, &image.path) {
            return;
        }

        let src = set_attr_if_changed(self.dom, node, "src", &image.src);
        let alt = set_attr_if_changed(self.dom, node, "alt", &image.alt);
        self.report.written += usize::from(src) + usize::from(alt);
    }

    fn apply_link(&mut self, link: &mut LinkItem) {
        let Some(node) = self.locate(&link.id, &link.path) else {
            return;
        };
        if !self.dom.is_tag(node, "a") {
            let found = self.dom.tag(node).unwrap_or_default().to_string();
            self.skip(&link.id, &link.path, &format!("expected <a>, found <{found}>"));
            return;
        }
        if self.refuse_protected(node, &link.id, &link.path) {
            return;
        }

        if set_attr_if_changed(self.dom, node, "href", &link.href) {
            self.report.written += 1;
        }

        let live = self.dom.collect_text(node).trim().to_string();
        if live == link.text {
            return;
        }
        // A text item already wrote inside this anchor; its edit wins and the
        // link follows the document.
        if self
            .text_written
            .iter()
            .any(|&w| self.dom.is_inclusive_descendant(w, node))
        {
            tracing::debug!(section = self.section, item = %link.id, "link text taken from text edit");
            link.text = live;
            return;
        }
        let rich = self.dom.descendants(node).any(|d| {
            self.dom
                .tag(d)
                .is_some_and(|t| matches!(t, "img" | "button" | "input"))
        });
        if rich {
            tracing::debug!(section = self.section, item = %link.id, "anchor has rich children, text left as is");
            return;
        }
        if write_text(self.dom, node, &link.text) {
            self.report.written += 1;
            self.link_written.push(node);
        }
    }

    /// Bring a text item in line with an anchor a link item rewrote, so the
    /// next save does not write the old text back.
    fn follow_link_write(&mut self, text: &mut TextItem) {
        let Some(node) = resolve_path(self.dom, &text.path, self.root) else {
            return;
        };
        if !self
            .link_written
            .iter()
            .any(|&a| self.dom.is_inclusive_descendant(node, a))
        {
            return;
        }
        let live = match text.part {
            Some(TextPart::Main) => composite_main(self.dom, node),
            _ => self.dom.collect_text(node).trim().to_string(),
        };
        if live != text.content {
            tracing::debug!(section = self.section, item = %text.id, "text taken from link edit");
            text.content = live;
        }
    }
}

/// Write `value` as the text of `node`, keeping element children.
///
/// A node without element children gets its whole content replaced. A node
/// with element children has `value` written into its first non-blank direct
/// text node; if it has none but exactly one child element carries text, the
/// write goes there instead. Returns `false` when there is nowhere to write.
fn write_text(dom: &mut Dom, node: NodeId, value: &str) -> bool {
    if !dom.has_element_children(node) {
        dom.set_text_content(node, value);
        return true;
    }
    if write_direct_text(dom, node, value) {
        return true;
    }

    let carriers: Vec<NodeId> = dom
        .element_children(node)
        .filter(|&c| !dom.collect_text(c).trim().is_empty())
        .collect();
    match carriers.as_slice() {
        [only] => write_text(dom, *only, value),
        _ => false,
    }
}

/// Replace the first non-blank direct text node (keeping its surrounding
/// whitespace) and drop the other non-blank ones. Element children are never
/// touched.
fn write_direct_text(dom: &mut Dom, node: NodeId, value: &str) -> bool {
    let runs: Vec<NodeId> = dom
        .children(node)
        .filter(|&c| dom.text(c).is_some_and(|t| !t.trim().is_empty()))
        .collect();
    let Some((&first, rest)) = runs.split_first() else {
        return false;
    };

    let replaced = {
        let original = dom.text(first).unwrap_or_default();
        let leading = &original[..original.len() - original.trim_start().len()];
        let trailing = &original[original.trim_end().len()..];
        format!("{leading}{value}{trailing}")
    };
    dom.set_text(first, &replaced);
    for &run in rest {
        dom.detach(run);
    }
    true
}

/// Set an attribute when its current value (absent counts as empty) differs.
fn set_attr_if_changed(dom: &mut Dom, node: NodeId, name: &str, value: &str) -> bool {
    if dom.get_attr(node, name).unwrap_or_default() == value {
        return false;
    }
    dom.set_attr(node, name, value);
    true
}
