//! HTML serialization of the arena DOM through html5ever's serializer.
//!
//! The serializer applies the fragment serialization algorithm browsers use
//! for `outerHTML` (void elements, raw-text children, entity escaping), so a
//! parse and serialize cycle writes markup the way a browser-based editor
//! would have.

use std::io;

use html5ever::serialize::{Serialize, SerializeOpts, Serializer, TraversalScope, serialize};

use super::arena::{Dom, NodeData, NodeId};

/// A subtree of a [`Dom`] in the shape html5ever serializes.
#[derive(Clone, Copy)]
pub struct SerializableNode<'a> {
    dom: &'a Dom,
    id: NodeId,
}

impl<'a> SerializableNode<'a> {
    pub fn new(dom: &'a Dom, id: NodeId) -> Self {
        Self { dom, id }
    }
}

impl Serialize for SerializableNode<'_> {
    fn serialize<S>(&self, serializer: &mut S, traversal_scope: TraversalScope) -> io::Result<()>
    where
        S: Serializer,
    {
        match traversal_scope {
            TraversalScope::IncludeNode => write_node(self.dom, self.id, serializer),
            TraversalScope::ChildrenOnly(_) => write_children(self.dom, self.id, serializer),
        }
    }
}

fn write_children<S: Serializer>(dom: &Dom, id: NodeId, serializer: &mut S) -> io::Result<()> {
    for child in dom.children(id) {
        write_node(dom, child, serializer)?;
    }
    Ok(())
}

fn write_node<S: Serializer>(dom: &Dom, id: NodeId, serializer: &mut S) -> io::Result<()> {
    let Some(node) = dom.get(id) else {
        return Ok(());
    };
    match &node.data {
        NodeData::Document => write_children(dom, id, serializer),
        NodeData::Element { name, attrs, .. } => {
            serializer.start_elem(
                name.clone(),
                attrs.iter().map(|attr| (&attr.name, attr.value.as_str())),
            )?;
            write_children(dom, id, serializer)?;
            serializer.end_elem(name.clone())
        }
        NodeData::Text(text) => serializer.write_text(text),
        NodeData::Comment(text) => serializer.write_comment(text),
        NodeData::Doctype { name, .. } => serializer.write_doctype(name),
    }
}

fn serialize_with(dom: &Dom, id: NodeId, traversal_scope: TraversalScope) -> String {
    let mut bytes = Vec::new();
    let opts = SerializeOpts {
        traversal_scope,
        ..Default::default()
    };
    if let Err(e) = serialize(&mut bytes, &SerializableNode::new(dom, id), opts) {
        tracing::error!(error = %e, node = id.0, "serialization failed");
    }
    String::from_utf8(bytes).unwrap_or_default()
}

/// Serialize a node including its own tags (`outerHTML`).
pub fn outer_html(dom: &Dom, id: NodeId) -> String {
    serialize_with(dom, id, TraversalScope::IncludeNode)
}

/// Serialize the children of a node (`innerHTML`).
///
/// The node's own name is passed along so the children of `<script>` or
/// `<style>` come out unescaped.
pub fn inner_html(dom: &Dom, id: NodeId) -> String {
    let parent = match dom.get(id).map(|n| &n.data) {
        Some(NodeData::Element { name, .. }) => Some(name.clone()),
        _ => None,
    };
    serialize_with(dom, id, TraversalScope::ChildrenOnly(parent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;

    fn body_html(html: &str) -> String {
        let doc = Document::parse(html).unwrap();
        let body = doc.body().unwrap();
        inner_html(doc.dom(), body)
    }

    #[test]
    fn test_void_elements_have_no_end_tag() {
        assert_eq!(
            body_html(r#"<p>a<br>b<img src="x.png" alt=""></p>"#),
            r#"<p>a<br>b<img src="x.png" alt=""></p>"#
        );
    }

    #[test]
    fn test_text_and_attribute_escaping() {
        assert_eq!(
            body_html("<p title='say \"hi\" &amp; go'>1 &lt; 2 &amp;&nbsp;3</p>"),
            "<p title=\"say &quot;hi&quot; &amp; go\">1 &lt; 2 &amp;&nbsp;3</p>"
        );
    }

    #[test]
    fn test_script_body_is_not_escaped() {
        let script = "<script>if (a < b && c) {}</script>";
        let inner = format!("<div class=\"analytics\">{script}</div>");
        assert_eq!(body_html(&format!("<body>{inner}</body>")), inner);

        let doc = Document::parse(&format!("<body>{inner}</body>")).unwrap();
        let node = doc.dom().find_by_tag("script").unwrap();
        assert_eq!(doc.inner_html(node), "if (a < b && c) {}");
    }

    #[test]
    fn test_comments_round_trip() {
        let html = "<div><!-- keep me --><p>x</p></div>";
        assert_eq!(body_html(html), html);
    }

    #[test]
    fn test_outer_html_includes_own_tags() {
        let doc = Document::parse(r#"<h1 class="logo-text">Social<span>Spark</span></h1>"#).unwrap();
        let h1 = doc.dom().find_by_tag("h1").unwrap();
        assert_eq!(
            outer_html(doc.dom(), h1),
            r#"<h1 class="logo-text">Social<span>Spark</span></h1>"#
        );
        assert_eq!(inner_html(doc.dom(), h1), "Social<span>Spark</span>");
    }

    #[test]
    fn test_detached_children_are_not_written() {
        let mut doc = Document::parse("<ul><li>one</li><li>two</li></ul>").unwrap();
        let first = doc.dom().find_by_tag("li").unwrap();
        doc.dom_mut().detach(first);
        let ul = doc.dom().find_by_tag("ul").unwrap();
        assert_eq!(doc.outer_html(ul), "<ul><li>two</li></ul>");
    }
}
