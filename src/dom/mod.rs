//! Arena-backed HTML document model.
//!
//! Pages are parsed with html5ever into a flat [`Dom`] arena, queried with CSS
//! selectors through the `selectors` crate, and serialized back the way a
//! browser's `outerHTML` would. Nothing here depends on a browser, so the
//! extract and reconcile passes run the same natively and under WASM.
//!
//! # Example
//!
//! ```
//! use sitepatch::dom::{Document, SelectorSet};
//!
//! let doc = Document::parse("<!DOCTYPE html><section id='home'><h1>Hi</h1></section>").unwrap();
//! let home = SelectorSet::parse("#home").unwrap();
//! let root = home.query_first(doc.dom(), doc.dom().document()).unwrap();
//! assert_eq!(doc.inner_html(root), "<h1>Hi</h1>");
//! ```

mod arena;
mod element_ref;
mod select;
mod serialize;
mod tree_sink;

pub use arena::{Attribute, ChildrenIter, Descendants, Dom, Node, NodeData, NodeId};
pub use element_ref::{ElementRef, SiteSelectors};
pub use select::SelectorSet;
pub use serialize::{SerializableNode, inner_html, outer_html};

use html5ever::driver::ParseOpts;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;

use crate::error::{Error, Result};
use tree_sink::PageSink;

/// Doctype written when the source had none.
pub const DEFAULT_DOCTYPE: &str = "<!DOCTYPE html>";

/// A parsed page plus the bits of source text the parser does not keep.
#[derive(Debug, Clone)]
pub struct Document {
    dom: Dom,
    doctype: Option<String>,
}

impl Document {
    /// Parse a complete HTML document.
    ///
    /// HTML parsing never fails on malformed markup (the parser recovers the
    /// way browsers do), so only input with no markup at all is rejected.
    pub fn parse(html: &str) -> Result<Self> {
        if html.trim().is_empty() {
            return Err(Error::Parse("document is empty".into()));
        }
        if memchr::memchr(b'<', html.as_bytes()).is_none() {
            return Err(Error::Parse("document contains no markup".into()));
        }

        let sink = PageSink::new();
        let sink = parse_document(sink, ParseOpts::default())
            .from_utf8()
            .one(html.as_bytes());
        tracing::trace!(errors = sink.error_count(), "parsed document");

        Ok(Self {
            dom: sink.into_dom(),
            doctype: crate::util::doctype_prefix(html).map(str::to_string),
        })
    }

    /// Parse HTML bytes, detecting the encoding from a `<meta charset>` when
    /// the bytes are not valid UTF-8.
    pub fn parse_bytes(html: &[u8]) -> Result<Self> {
        Self::parse(&crate::util::decode_html(html))
    }

    pub fn dom(&self) -> &Dom {
        &self.dom
    }

    pub fn dom_mut(&mut self) -> &mut Dom {
        &mut self.dom
    }

    /// The doctype declaration as written in the source, if there was one.
    pub fn doctype(&self) -> Option<&str> {
        self.doctype.as_deref()
    }

    /// The `<html>` element.
    pub fn root_element(&self) -> Option<NodeId> {
        self.dom.element_children(self.dom.document()).next()
    }

    /// The `<head>` element.
    pub fn head(&self) -> Option<NodeId> {
        let root = self.root_element()?;
        self.dom
            .element_children(root)
            .find(|&id| self.dom.is_tag(id, "head"))
    }

    /// The `<body>` element.
    pub fn body(&self) -> Option<NodeId> {
        let root = self.root_element()?;
        self.dom
            .element_children(root)
            .find(|&id| self.dom.is_tag(id, "body"))
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        serialize::outer_html(&self.dom, id)
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        serialize::inner_html(&self.dom, id)
    }

    /// Serialize the whole document.
    ///
    /// The source doctype (or `<!DOCTYPE html>`) comes first on its own line,
    /// followed by every other top-level node.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        out.push_str(self.doctype.as_deref().unwrap_or(DEFAULT_DOCTYPE));
        out.push('\n');

        for child in self.dom.children(self.dom.document()) {
            if matches!(
                self.dom.get(child).map(|n| &n.data),
                Some(NodeData::Doctype { .. })
            ) {
                continue;
            }
            out.push_str(&serialize::outer_html(&self.dom, child));
        }
        out
    }
}
