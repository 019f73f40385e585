//! Builds a [`Dom`] from html5ever's tree-construction callbacks.
//!
//! The parser drives everything through `&self`, so the arena sits in a
//! single `RefCell` together with the recoverable-error tally. No borrow is
//! held across a callback.

use std::borrow::Cow;
use std::cell::{Ref, RefCell};

use html5ever::tendril::StrTendril;
use html5ever::tree_builder::{ElementFlags, NodeOrText, QuirksMode, TreeSink};
use html5ever::{Attribute as ParsedAttribute, QualName, local_name, ns};

use super::arena::{Attribute, Dom, NodeData, NodeId};

/// Name reported for anything that is not an element.
static NO_NAME: QualName = QualName {
    prefix: None,
    ns: ns!(),
    local: local_name!(""),
};

struct PageState {
    dom: Dom,
    errors: usize,
}

/// Receives a page from html5ever and keeps it as an arena.
pub struct PageSink {
    state: RefCell<PageState>,
}

impl PageSink {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(PageState {
                dom: Dom::new(),
                errors: 0,
            }),
        }
    }

    pub fn into_dom(self) -> Dom {
        self.state.into_inner().dom
    }

    /// Markup errors the parser recovered from. Pages are still usable; this
    /// only feeds the trace log.
    pub fn error_count(&self) -> usize {
        self.state.borrow().errors
    }

    fn with_dom<R>(&self, f: impl FnOnce(&mut Dom) -> R) -> R {
        f(&mut self.state.borrow_mut().dom)
    }
}

impl Default for PageSink {
    fn default() -> Self {
        Self::new()
    }
}

fn owned_attrs(attrs: Vec<ParsedAttribute>) -> Vec<Attribute> {
    attrs
        .into_iter()
        .map(|attr| Attribute {
            name: attr.name,
            value: attr.value.to_string(),
        })
        .collect()
}

impl TreeSink for PageSink {
    type Handle = NodeId;
    type Output = Self;
    type ElemName<'a>
        = Ref<'a, QualName>
    where
        Self: 'a;

    fn finish(self) -> Self {
        self
    }

    fn parse_error(&self, msg: Cow<'static, str>) {
        tracing::trace!(%msg, "recovered from markup error");
        self.state.borrow_mut().errors += 1;
    }

    fn get_document(&self) -> NodeId {
        self.state.borrow().dom.document()
    }

    fn elem_name<'a>(&'a self, target: &NodeId) -> Ref<'a, QualName> {
        Ref::map(self.state.borrow(), |state| {
            match state.dom.get(*target).map(|node| &node.data) {
                Some(NodeData::Element { name, .. }) => name,
                _ => &NO_NAME,
            }
        })
    }

    fn create_element(&self, name: QualName, attrs: Vec<ParsedAttribute>, _: ElementFlags) -> NodeId {
        let attrs = owned_attrs(attrs);
        self.with_dom(|dom| dom.create_element(name, attrs))
    }

    fn create_comment(&self, text: StrTendril) -> NodeId {
        self.with_dom(|dom| dom.create_comment(text.to_string()))
    }

    /// HTML documents never produce real processing instructions; keep the
    /// payload as a comment like the browser's bogus-comment state does.
    fn create_pi(&self, _target: StrTendril, data: StrTendril) -> NodeId {
        self.create_comment(data)
    }

    fn append(&self, parent: &NodeId, child: NodeOrText<NodeId>) {
        self.with_dom(|dom| match child {
            NodeOrText::AppendNode(node) => dom.append(*parent, node),
            NodeOrText::AppendText(text) => dom.append_text(*parent, &text),
        });
    }

    fn append_based_on_parent_node(
        &self,
        element: &NodeId,
        prev_element: &NodeId,
        child: NodeOrText<NodeId>,
    ) {
        let attached = self.state.borrow().dom.parent(*element).is_some();
        if attached {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(&self, name: StrTendril, public_id: StrTendril, system_id: StrTendril) {
        self.with_dom(|dom| {
            let doctype = dom.create_doctype(name.to_string(), public_id.to_string(), system_id.to_string());
            let document = dom.document();
            dom.append(document, doctype);
        });
    }

    // <template> children are kept inline so they serialize in place.
    fn get_template_contents(&self, target: &NodeId) -> NodeId {
        *target
    }

    fn same_node(&self, x: &NodeId, y: &NodeId) -> bool {
        x == y
    }

    // Serialization is the same in every mode.
    fn set_quirks_mode(&self, _mode: QuirksMode) {}

    fn append_before_sibling(&self, sibling: &NodeId, new_node: NodeOrText<NodeId>) {
        self.with_dom(|dom| match new_node {
            NodeOrText::AppendNode(node) => {
                dom.detach(node);
                dom.insert_before(*sibling, node);
            }
            NodeOrText::AppendText(text) => {
                // Foster-parented text joins an adjacent text node.
                let prev = dom.get(*sibling).map_or(NodeId::NONE, |n| n.prev_sibling);
                match dom.text(prev).map(|existing| format!("{existing}{text}")) {
                    Some(joined) => dom.set_text(prev, &joined),
                    None => {
                        let node = dom.create_text(text.to_string());
                        dom.insert_before(*sibling, node);
                    }
                }
            }
        });
    }

    fn add_attrs_if_missing(&self, target: &NodeId, attrs: Vec<ParsedAttribute>) {
        self.with_dom(|dom| {
            for attr in attrs {
                if dom.get_attr(*target, &attr.name.local).is_none() {
                    dom.set_attr(*target, &attr.name.local, &attr.value);
                }
            }
        });
    }

    fn remove_from_parent(&self, target: &NodeId) {
        self.with_dom(|dom| dom.detach(*target));
    }

    fn reparent_children(&self, node: &NodeId, new_parent: &NodeId) {
        self.with_dom(|dom| {
            let moved: Vec<NodeId> = dom.children(*node).collect();
            for child in moved {
                dom.detach(child);
                dom.append(*new_parent, child);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use html5ever::driver::ParseOpts;
    use html5ever::parse_document;
    use html5ever::tendril::TendrilSink;

    use super::*;

    fn build(html: &str) -> (Dom, usize) {
        let sink = parse_document(PageSink::new(), ParseOpts::default()).one(html);
        let errors = sink.error_count();
        (sink.into_dom(), errors)
    }

    #[test]
    fn test_section_markup_lands_in_body() {
        let (dom, _) = build(r#"<section id="home" class="hero"><h1>Grow <span>Smart</span></h1></section>"#);

        let section = dom.find_by_tag("section").unwrap();
        assert_eq!(dom.element_id(section), Some("home"));
        assert_eq!(dom.element_classes(section), ["hero".to_string()]);
        assert_eq!(dom.collect_text(section), "Grow Smart");

        let body = dom.find_by_tag("body").unwrap();
        assert_eq!(dom.parent(section), Some(body));
    }

    #[test]
    fn test_doctype_becomes_first_document_child() {
        let (dom, errors) = build("<!DOCTYPE html><title>t</title>");
        let first = dom.children(dom.document()).next().unwrap();
        assert!(matches!(
            dom.get(first).map(|n| &n.data),
            Some(NodeData::Doctype { name, .. }) if name == "html"
        ));
        assert_eq!(errors, 0);
    }

    #[test]
    fn test_stray_table_text_is_moved_before_table() {
        let (dom, errors) = build("<body><table>stats<tr><td>120+</td></tr></table></body>");
        let body = dom.find_by_tag("body").unwrap();
        let first = dom.children(body).next().unwrap();
        assert_eq!(dom.text(first), Some("stats"));
        assert!(errors > 0);
    }

    #[test]
    fn test_duplicate_body_attrs_merge_without_overwriting() {
        let (dom, _) = build(r#"<body class="site"><p>x</p><body class="other" data-theme="dark">"#);
        let body = dom.find_by_tag("body").unwrap();
        assert_eq!(dom.get_attr(body, "class"), Some("site"));
        assert_eq!(dom.get_attr(body, "data-theme"), Some("dark"));
    }
}
