//! The editing workflow: load a page, edit its content, save, deploy.
//!
//! A [`Session`] keeps two versions of the page. The *original* is what was
//! last deployed; the *working* text is what the last save produced. Saving
//! always reconciles against the working text so successive saves build on
//! each other.

use crate::config::BuiltConfig;
use crate::content::{
    Clock, ContentStore, Field, Injector, ReconcileReport, Reconciler, SectionContent, extract_all,
};
use crate::dom::Document;
use crate::error::Result;
use crate::publish::{ContentSink, PublishRequest, Publisher};
use crate::section::SectionMap;
use crate::util::now_millis;

#[derive(Debug)]
pub struct Session {
    config: BuiltConfig,
    injector: Injector,
    clock: Clock,
    store: ContentStore,
    original: String,
    working: String,
    current: Option<String>,
    unsaved: bool,
    saved: bool,
    last_report: Option<ReconcileReport>,
}

impl Session {
    /// Parse `html` and extract every section the config names.
    ///
    /// A parse failure is fatal and leaves no partial store behind. Sections
    /// that are absent from the page are logged and left out of the store.
    pub fn load(html: impl Into<String>, config: BuiltConfig) -> Result<Self> {
        let html = html.into();
        let store = Self::extract(&html, &config)?;
        tracing::info!(sections = store.len(), "loaded content");

        Ok(Self {
            config,
            injector: Injector::new(),
            clock: now_millis,
            store,
            working: html.clone(),
            original: html,
            current: None,
            unsaved: false,
            saved: false,
            last_report: None,
        })
    }

    fn extract(html: &str, config: &BuiltConfig) -> Result<ContentStore> {
        let doc = Document::parse(html)?;
        Ok(extract_all(&doc, &config.sections, &config.rules))
    }

    /// Use `clock` for new-item ids, markers and the freshness stamp.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self.injector = Injector::new().with_clock(clock);
        self
    }

    pub fn config(&self) -> &BuiltConfig {
        &self.config
    }

    pub fn sections(&self) -> &SectionMap {
        &self.config.sections
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    /// The last deployed page.
    pub fn original(&self) -> &str {
        &self.original
    }

    /// The page as of the last save.
    pub fn working(&self) -> &str {
        &self.working
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved
    }

    /// Whether there is a save that has not been deployed yet.
    pub fn is_saved(&self) -> bool {
        self.saved
    }

    pub fn last_report(&self) -> Option<&ReconcileReport> {
        self.last_report.as_ref()
    }

    pub fn current_section(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Make `id` the section being edited. `None` means there is nothing to
    /// edit there (unknown section or not found on the page).
    pub fn select_section(&mut self, id: &str) -> Option<&SectionContent> {
        if !self.config.sections.contains(id) {
            tracing::debug!(section = id, "unknown section selected");
            self.current = None;
            return None;
        }
        self.current = Some(id.to_string());
        self.store.get(id)
    }

    pub fn update_field(&mut self, section: &str, item: &str, field: Field, value: &str) -> bool {
        let applied = self.store.update_field(section, item, field, value);
        self.unsaved |= applied;
        applied
    }

    pub fn add_text(&mut self, section: &str, tag: &str) -> Option<String> {
        let id = self.injector.add_text(&mut self.store, section, tag);
        self.unsaved |= id.is_some();
        id
    }

    pub fn add_image(&mut self, section: &str) -> Option<String> {
        let id = self.injector.add_image(&mut self.store, section);
        self.unsaved |= id.is_some();
        id
    }

    pub fn add_link(&mut self, section: &str) -> Option<String> {
        let id = self.injector.add_link(&mut self.store, section);
        self.unsaved |= id.is_some();
        id
    }

    /// Reconcile the working page with the store.
    ///
    /// Returns `false` without touching anything when there are no unsaved
    /// changes.
    pub fn save(&mut self) -> Result<bool> {
        if !self.unsaved {
            tracing::debug!("nothing to save");
            return Ok(false);
        }

        let (html, report) = Reconciler::from_config(&self.config)
            .with_clock(self.clock)
            .run(&self.working, &mut self.store)?;
        self.working = html;
        self.unsaved = false;
        self.saved = true;
        self.last_report = Some(report);
        Ok(true)
    }

    /// Publish the working page.
    ///
    /// Returns `Ok(None)` when there is no save to deploy. On success the
    /// working page becomes the new original.
    pub fn deploy(&mut self, publisher: &Publisher, sink: &mut dyn ContentSink) -> Result<Option<PublishRequest>> {
        if !self.saved {
            tracing::warn!("deploy requested without a saved change");
            return Ok(None);
        }

        let request = publisher.publish(&self.working, sink)?;
        self.original.clone_from(&self.working);
        self.saved = false;
        tracing::info!(path = %request.path, branch = %request.branch, "deployed");
        Ok(Some(request))
    }

    /// Drop every item and extract again from the working page.
    pub fn reload(&mut self) -> Result<()> {
        self.store = Self::extract(&self.working, &self.config)?;
        self.unsaved = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::error::Error;
    use crate::publish::RecordingSink;

    const NOW: i64 = 1_714_564_800_000;

    fn fixed() -> i64 {
        NOW
    }

    const PAGE: &str = r##"<!DOCTYPE html>
<html><head><title>T</title></head><body>
<section id="home"><div class="container"><h1>Grow <span>Smart</span></h1><p>Intro</p></div></section>
<section id="contact"><div class="container"><p>Call us</p></div></section>
</body></html>"##;

    fn session() -> Session {
        Session::load(PAGE, SiteConfig::default().build().unwrap())
            .unwrap()
            .with_clock(fixed)
    }

    #[test]
    fn test_load_skips_missing_sections() {
        let session = session();
        assert!(session.store().contains("hero"));
        assert!(session.store().contains("contact"));
        assert!(!session.store().contains("portfolio"));
        assert!(!session.has_unsaved_changes());
    }

    #[test]
    fn test_load_rejects_empty_page() {
        let err = Session::load("", SiteConfig::default().build().unwrap()).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_select_section() {
        let mut session = session();
        assert!(session.select_section("hero").is_some());
        assert_eq!(session.current_section(), Some("hero"));
        assert!(session.select_section("portfolio").is_none());
        assert!(session.select_section("nope").is_none());
        assert_eq!(session.current_section(), None);
    }

    #[test]
    fn test_save_without_changes_is_noop() {
        let mut session = session();
        assert!(!session.save().unwrap());
        assert_eq!(session.working(), PAGE);
        assert!(!session.is_saved());
    }

    #[test]
    fn test_edit_save_deploy() {
        let mut session = session();
        let intro = session
            .select_section("hero")
            .unwrap()
            .texts
            .iter()
            .find(|t| t.content == "Intro")
            .unwrap()
            .id
            .clone();
        assert!(session.update_field("hero", &intro, Field::Content, "Welcome"));
        assert!(session.has_unsaved_changes());

        // Nothing saved yet, so nothing to deploy.
        let publisher = Publisher::new(session.config().publish.clone());
        let mut sink = RecordingSink::default();
        assert!(session.deploy(&publisher, &mut sink).unwrap().is_none());

        assert!(session.save().unwrap());
        assert!(session.working().contains("<p>Welcome</p>"));
        assert!(session.working().contains("<!--Last updated: 2024-05-01T12:00:00.000Z-->"));
        assert_eq!(session.original(), PAGE);
        assert_eq!(session.last_report().unwrap().written, 1);

        let request = session.deploy(&publisher, &mut sink).unwrap().unwrap();
        assert_eq!(request.decoded().unwrap(), session.working());
        assert_eq!(session.original(), session.working());
        assert!(!session.is_saved());
        assert_eq!(sink.requests.len(), 1);
    }

    #[test]
    fn test_add_then_save_materializes() {
        let mut session = session();
        let id = session.add_link("contact").unwrap();
        assert_eq!(id, format!("link-{NOW}"));
        assert!(session.add_image("portfolio").is_none());

        session.save().unwrap();
        assert!(session.working().contains(
            r##"<a href="#" class="admin-added-link" data-admin-added="true" data-admin-added-time="2024-05-01T12:00:00.000Z">New Link</a></div></section>"##
        ));
        let link = &session.store().get("contact").unwrap().links[0];
        assert!(!link.is_new);
        assert!(link.path.starts_with("[data-admin-added"));
    }

    #[test]
    fn test_reload_discards_unsaved_edits() {
        let mut session = session();
        session.add_text("hero", "p").unwrap();
        assert!(session.has_unsaved_changes());
        session.reload().unwrap();
        assert!(!session.has_unsaved_changes());
        assert!(session.store().get("hero").unwrap().texts.iter().all(|t| !t.is_new));
    }
}
