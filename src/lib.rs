//! # sitepatch
//!
//! Content extraction and write-back for hand-written static pages.
//!
//! A page is split into named sections. Each section's visible copy, images
//! and links are extracted into a [`ContentStore`] that an editor can change
//! freely; saving re-parses the original page and writes only the edited
//! fields back, leaving markup, scripts and styling byte-for-byte where they
//! were. New elements can be injected and are tagged so they can be found
//! again on the next save.
//!
//! ## Quick Start
//!
//! ```
//! use sitepatch::{ContentStore, Field, SectionMap, extract_all, reconcile};
//! use sitepatch::content::CompiledRules;
//! use sitepatch::dom::Document;
//!
//! let html = r#"<!DOCTYPE html><section id="home"><h1>Hello</h1></section>"#;
//! let sections = SectionMap::default();
//!
//! let doc = Document::parse(html).unwrap();
//! let mut store: ContentStore = extract_all(&doc, &sections, &CompiledRules::default());
//!
//! let id = store.get("hero").unwrap().texts[0].id.clone();
//! store.update_field("hero", &id, Field::Content, "Welcome");
//!
//! let saved = reconcile(html, &mut store, &sections).unwrap();
//! assert!(saved.contains("<h1>Welcome</h1>"));
//! ```
//!
//! ## Working with a Session
//!
//! [`Session`] wraps the whole load, edit, save and deploy cycle:
//!
//! ```
//! use sitepatch::{Field, Publisher, RecordingSink, Session, SiteConfig};
//!
//! let config = SiteConfig::default().build().unwrap();
//! let mut session = Session::load("<footer><p>Old</p></footer>", config).unwrap();
//!
//! let id = session.select_section("footer").unwrap().texts[0].id.clone();
//! session.update_field("footer", &id, Field::Content, "New");
//! session.save().unwrap();
//!
//! let publisher = Publisher::new(session.config().publish.clone());
//! let mut sink = RecordingSink::default();
//! let request = session.deploy(&publisher, &mut sink).unwrap().unwrap();
//! assert!(request.decoded().unwrap().contains("<p>New</p>"));
//! ```

pub mod config;
pub mod content;
pub mod dom;
pub mod error;
pub mod publish;
pub mod section;
pub mod session;
pub mod util;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use config::{BuiltConfig, Freshness, PublishTarget, SiteConfig};
pub use content::{
    ContentItem, ContentStore, Field, ImageItem, Injector, LinkItem, Locator, ReconcileReport, Reconciler,
    SectionContent, TextItem, extract, extract_all, reconcile,
};
pub use error::{Error, Result};
pub use publish::{ContentSink, FileSink, PublishRequest, Publisher, RecordingSink};
pub use section::{Section, SectionMap};
pub use session::Session;
