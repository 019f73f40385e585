//! Editable content: what is pulled out of a page, how it is stored while the
//! admin edits it, and how it is written back.
//!
//! The flow is [`extract_all`] on load, [`ContentStore::update_field`] and the
//! [`Injector`] while editing, and [`Reconciler::run`] on save. Items are tied
//! to their nodes by a [`Locator`], a CSS child-combinator chain relative to
//! the section root.

mod extract;
mod inject;
mod item;
mod locator;
mod reconcile;
mod store;

pub use extract::{CompiledRules, ExtractRules, extract, extract_all};
pub use inject::{
    Clock, IMAGE_CLASS, Injector, LINK_CLASS, PLACEHOLDER_IMAGE_ALT, PLACEHOLDER_IMAGE_SRC,
    PLACEHOLDER_LINK_HREF, PLACEHOLDER_LINK_TEXT, PLACEHOLDER_TEXT, TEXT_CLASS, materialize,
};
pub use item::{ContentItem, Field, ImageItem, ItemKind, LinkItem, SectionContent, TextItem, TextPart};
pub use locator::{Anchor, Locator, MARKER_ATTR, MARKER_TIME_ATTR, Segment, compute_path, resolve_path};
pub use reconcile::{FRESHNESS_PREFIX, ReconcileReport, Reconciler, reconcile};
pub use store::ContentStore;
