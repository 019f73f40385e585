//! End-to-end extract, edit and reconcile tests.
//!
//! The fixture is a copy of the stock agency landing page: nine sections,
//! composite logos, a contact form, decorative icons and an inline script.

use sitepatch::content::{CompiledRules, FRESHNESS_PREFIX, Reconciler, resolve_path};
use sitepatch::dom::{Document, SelectorSet};
use sitepatch::{
    ContentStore, Field, FileSink, Freshness, Injector, Publisher, PublishTarget, SectionMap, Session, SiteConfig,
    TextItem, extract_all, reconcile,
};

const FIXTURES_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures");

const NOW: i64 = 1_714_564_800_000;
const STAMP: &str = "2024-05-01T12:00:00.000Z";

fn fixed() -> i64 {
    NOW
}

fn fixture() -> String {
    std::fs::read_to_string(format!("{FIXTURES_DIR}/site.html")).expect("Failed to read fixture")
}

fn load(html: &str) -> (SectionMap, ContentStore) {
    let sections = SectionMap::default();
    let doc = Document::parse(html).unwrap();
    let store = extract_all(&doc, &sections, &CompiledRules::default());
    (sections, store)
}

fn protected() -> SelectorSet {
    SelectorSet::from_list(&SiteConfig::default().protected).unwrap()
}

fn text<'a>(store: &'a ContentStore, section: &str, content: &str) -> &'a TextItem {
    store
        .get(section)
        .unwrap()
        .texts
        .iter()
        .find(|t| t.content == content)
        .unwrap_or_else(|| panic!("no text {content:?} in {section}"))
}

fn without_freshness(html: &str) -> String {
    html.replace(&format!("<!--{FRESHNESS_PREFIX} {STAMP}-->"), "")
}

// ============================================================================
// Extraction
// ============================================================================

#[test]
fn test_extract_finds_every_section() {
    let (_, store) = load(&fixture());
    assert_eq!(store.len(), 9);

    let hero = store.get("hero").unwrap();
    assert_eq!(hero.images.len(), 1);
    assert!(hero.links.iter().any(|l| l.href == "#contact" && l.text == "Get started"));

    let header = store.get("header").unwrap();
    assert_eq!(header.links.len(), 4);
    assert_eq!(text(&store, "header", "Social").part, Some(sitepatch::content::TextPart::Main));
    assert_eq!(text(&store, "header", "Spark").part, Some(sitepatch::content::TextPart::Span));
}

#[test]
fn test_extract_skips_controls_and_decorations() {
    let (_, store) = load(&fixture());
    let contact = store.get("contact").unwrap();
    assert!(contact.texts.iter().all(|t| t.content != "Name" && t.content != "Send"));

    let portfolio = store.get("portfolio").unwrap();
    assert!(portfolio.texts.iter().all(|t| t.content != "Bakery launch"));
    assert!(portfolio.texts.iter().any(|t| t.content == "Recent Work"));
}

#[test]
fn test_hero_composite_extraction() {
    let (_, store) = load(&fixture());
    let main = text(&store, "hero", "Grow");
    let span = text(&store, "hero", "Smart");

    assert_eq!(main.original_element, span.original_element);
    assert_eq!(
        main.original_element.as_deref(),
        Some("<h1>Grow <span>Smart</span></h1>")
    );
}

#[test]
fn test_duplicate_learn_more_extracted_once() {
    let (_, store) = load(&fixture());
    let section = store.get("this-and-that").unwrap();
    let count = section
        .texts
        .iter()
        .filter(|t| t.content == "Learn more")
        .count();
    assert_eq!(count, 1);
}

// ============================================================================
// Reconciliation
// ============================================================================

#[test]
fn test_round_trip_is_stable() {
    let html = fixture();
    let (sections, mut store) = load(&html);
    let (out, report) = Reconciler::new(&sections, protected())
        .with_clock(fixed)
        .run(&html, &mut store)
        .unwrap();

    let expected = Document::parse(&html).unwrap().to_html();
    assert_eq!(without_freshness(&out), expected);
    assert_eq!(report.written, 0);
    assert_eq!(report.skipped, 0);
    assert!(out.starts_with("<!DOCTYPE html>\n<html lang=\"en\">"));
    assert!(out.contains("if (window.innerWidth < 600 && document.body)"));
}

#[test]
fn test_hero_composite_span_edit() {
    let html = fixture();
    let (sections, mut store) = load(&html);
    let span = text(&store, "hero", "Smart").id.clone();
    assert!(store.update_field("hero", &span, Field::Content, "Fast"));

    let out = reconcile(&html, &mut store, &sections).unwrap();
    assert!(out.contains("<h1>Grow <span>Fast</span></h1>"));
    assert!(out.contains(r#"<h1 class="logo-text">Social<span>Spark</span></h1>"#));
}

#[test]
fn test_image_replaced_by_picture_is_skipped() {
    let html = fixture();
    let (sections, mut store) = load(&html);

    let image = store
        .get("this-and-that")
        .unwrap()
        .images
        .iter()
        .find(|i| i.src == "images/that.jpg")
        .unwrap()
        .id
        .clone();
    store.update_field("this-and-that", &image, Field::Src, "images/that-2.jpg");
    let copy = text(&store, "this-and-that", "Campaigns that ship on time.").id.clone();
    store.update_field("this-and-that", &copy, Field::Content, "Campaigns that ship early.");

    let edited = html.replace(
        r#"<img src="images/that.jpg" alt="A team at work">"#,
        r#"<picture><source srcset="images/that.webp"><img src="images/that.jpg" alt="A team at work"></picture>"#,
    );
    let (out, report) = Reconciler::new(&sections, protected())
        .with_clock(fixed)
        .run(&edited, &mut store)
        .unwrap();

    assert_eq!(report.skipped, 1);
    assert!(!out.contains("that-2.jpg"));
    assert!(out.contains("<p>Campaigns that ship early.</p>"));
}

#[test]
fn test_injected_link_materializes() {
    let html = fixture();
    let (sections, mut store) = load(&html);

    let id = Injector::new()
        .with_clock(fixed)
        .add_link(&mut store, "contact")
        .unwrap();
    let pending = store.get("contact").unwrap().links.iter().find(|l| l.id == id).unwrap();
    assert!(pending.is_new);
    assert_eq!(pending.path, format!("new-{NOW}"));

    let (out, report) = Reconciler::new(&sections, protected())
        .with_clock(fixed)
        .run(&html, &mut store)
        .unwrap();
    assert_eq!(report.materialized, 1);

    let link = store.get("contact").unwrap().links.iter().find(|l| l.id == id).unwrap();
    assert!(!link.is_new);
    assert_eq!(
        link.path,
        format!(r#"[data-admin-added="true"][data-admin-added-time="{STAMP}"]"#)
    );

    let doc = Document::parse(&out).unwrap();
    let dom = doc.dom();
    let root = SelectorSet::parse("#contact").unwrap().query_first(dom, dom.document()).unwrap();
    let node = resolve_path(dom, &link.path, root).unwrap();
    assert!(dom.is_tag(node, "a"));
    assert_eq!(dom.get_attr(node, "href"), Some("#"));
    assert_eq!(dom.collect_text(node), "New Link");

    let container = SelectorSet::parse("#contact > .container").unwrap().query_first(dom, dom.document()).unwrap();
    assert_eq!(dom.parent(node), Some(container));
}

#[test]
fn test_protected_regions_are_inviolable() {
    let html = fixture();
    let (sections, mut store) = load(&html);
    let regions = protected();

    let ids: Vec<(String, Vec<String>, Vec<String>, Vec<String>)> = sections
        .iter()
        .filter_map(|s| store.get(&s.id).map(|c| (s.id.clone(), c)))
        .map(|(section, c)| {
            (
                section,
                c.texts.iter().map(|t| t.id.clone()).collect(),
                c.images.iter().map(|i| i.id.clone()).collect(),
                c.links.iter().map(|l| l.id.clone()).collect(),
            )
        })
        .collect();
    for (section, texts, images, links) in &ids {
        for id in texts {
            store.update_field(section, id, Field::Content, "Overwritten");
        }
        for id in images {
            store.update_field(section, id, Field::Src, "overwritten.png");
            store.update_field(section, id, Field::Alt, "Overwritten");
        }
        for id in links {
            store.update_field(section, id, Field::Href, "#overwritten");
            store.update_field(section, id, Field::Text, "Overwritten");
        }
    }

    let (out, report) = Reconciler::new(&sections, regions.clone())
        .with_clock(fixed)
        .run(&html, &mut store)
        .unwrap();
    assert!(report.protected > 0);

    let before = Document::parse(&html).unwrap();
    let after = Document::parse(&out).unwrap();
    let snapshot = |doc: &Document| -> Vec<String> {
        regions
            .query_all(doc.dom(), doc.dom().document())
            .into_iter()
            .map(|n| doc.outer_html(n))
            .collect()
    };
    let regions_before = snapshot(&before);
    assert!(regions_before.len() >= 7);
    assert_eq!(regions_before, snapshot(&after));
    assert!(out.contains("<p>We reply within a day.</p>"));
}

#[test]
fn test_reconcile_is_idempotent() {
    let html = fixture();
    let (sections, mut store) = load(&html);

    let span = text(&store, "hero", "Smart").id.clone();
    store.update_field("hero", &span, Field::Content, "Fast");
    let title = text(&store, "services", "Our Services").id.clone();
    store.update_field("services", &title, Field::Content, "What we do");
    let mut injector = Injector::new().with_clock(fixed);
    injector.add_text(&mut store, "services", "h4").unwrap();
    injector.add_image(&mut store, "stats").unwrap();

    let reconciler = Reconciler::new(&sections, protected()).with_clock(fixed);
    let (once, first) = reconciler.run(&html, &mut store).unwrap();
    let (twice, second) = reconciler.run(&once, &mut store).unwrap();

    assert_eq!(once, twice);
    assert_eq!(first.materialized, 2);
    assert_eq!(second.materialized, 0);
    assert_eq!(second.written, 0);
    assert_eq!(once.matches(FRESHNESS_PREFIX).count(), 1);
}

#[test]
fn test_missing_section_keeps_other_edits() {
    let html = fixture();
    let (sections, mut store) = load(&html);
    let awards = text(&store, "stats", "Awards").id.clone();
    store.update_field("stats", &awards, Field::Content, "Prizes");
    let title = text(&store, "portfolio", "Recent Work").id.clone();
    store.update_field("portfolio", &title, Field::Content, "Selected Work");

    let edited = html.replace(r#"<section id="stats">"#, r#"<section id="numbers">"#);
    let (out, report) = Reconciler::new(&sections, protected())
        .with_clock(fixed)
        .run(&edited, &mut store)
        .unwrap();

    assert_eq!(report.missing_sections, ["stats"]);
    assert!(out.contains("<p>Awards</p>"));
    assert!(out.contains("<h2>Selected Work</h2>"));
}

#[test]
fn test_cache_meta_from_config() {
    let html = fixture();
    let mut config = SiteConfig::default();
    config.freshness = Freshness {
        comment: true,
        cache_meta: true,
    };
    let built = config.build().unwrap();
    let mut store = extract_all(&Document::parse(&html).unwrap(), &built.sections, &built.rules);

    let (out, _) = Reconciler::from_config(&built)
        .with_clock(fixed)
        .run(&html, &mut store)
        .unwrap();
    assert!(out.contains(r#"<meta http-equiv="Cache-Control" content="no-cache, no-store, must-revalidate">"#));
    assert!(out.contains(r#"<meta http-equiv="Expires" content="0">"#));
}

#[test]
fn test_empty_document_is_an_error() {
    let mut store = ContentStore::new();
    assert!(reconcile("", &mut store, &SectionMap::default()).is_err());
}

// ============================================================================
// Session
// ============================================================================

#[test]
fn test_session_deploys_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = SiteConfig::default().build().unwrap();
    let mut session = Session::load(fixture(), config).unwrap().with_clock(fixed);

    let id = text(session.store(), "footer", "© 2024 SocialSpark. All rights reserved.").id.clone();
    session.update_field("footer", &id, Field::Content, "© 2025 SocialSpark");
    session.add_text("footer", "p").unwrap();
    assert!(session.save().unwrap());

    let publisher = Publisher::new(PublishTarget {
        path: "public/index.html".into(),
        ..PublishTarget::default()
    });
    let mut sink = FileSink::new(dir.path());
    session.deploy(&publisher, &mut sink).unwrap().unwrap();

    let written = std::fs::read_to_string(dir.path().join("public/index.html")).unwrap();
    assert_eq!(written, session.original());
    assert!(written.contains("<p>© 2025 SocialSpark</p>"));
    assert!(written.contains(&format!(
        r#"<p class="admin-added-content" data-admin-added="true" data-admin-added-time="{STAMP}">New text content</p>"#
    )));
}
