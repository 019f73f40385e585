//! WASM bindings for the browser-side admin panel.
//!
//! Stores and configs cross the boundary as JSON strings so the panel can keep
//! them in `localStorage` as-is.

use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::config::{BuiltConfig, SiteConfig};
use crate::content::{ContentStore, Reconciler, extract_all};
use crate::dom::Document;
use crate::publish::Publisher;

/// Initialize panic hook for better error messages in the browser console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "wasm")]
    console_error_panic_hook::set_once();
}

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// An empty string selects the default config.
fn build_config(config_json: &str) -> Result<BuiltConfig, JsValue> {
    let config = if config_json.trim().is_empty() {
        SiteConfig::default()
    } else {
        SiteConfig::from_json_str(config_json).map_err(js_err)?
    };
    config.build().map_err(js_err)
}

/// Extract the editable content of a page.
///
/// Returns the content store as JSON.
#[wasm_bindgen]
pub fn extract_content(html: &str, config_json: &str) -> Result<String, JsValue> {
    let config = build_config(config_json)?;
    let doc = Document::parse(html).map_err(js_err)?;
    let store = extract_all(&doc, &config.sections, &config.rules);
    serde_json::to_string(&store).map_err(js_err)
}

#[derive(Serialize)]
struct Reconciled {
    html: String,
    store: ContentStore,
}

/// Write an edited store back into a page.
///
/// Returns `{ "html": ..., "store": ... }` as JSON; the returned store has
/// real locators for any items that were added since the last save.
#[wasm_bindgen]
pub fn reconcile_content(html: &str, store_json: &str, config_json: &str) -> Result<String, JsValue> {
    let config = build_config(config_json)?;
    let mut store: ContentStore = serde_json::from_str(store_json).map_err(js_err)?;
    let (html, _) = Reconciler::from_config(&config)
        .run(html, &mut store)
        .map_err(js_err)?;
    serde_json::to_string(&Reconciled { html, store }).map_err(js_err)
}

/// Build the contents-API request body for a page.
#[wasm_bindgen]
pub fn publish_request(html: &str, config_json: &str, sha: Option<String>) -> Result<String, JsValue> {
    let config = build_config(config_json)?;
    let mut publisher = Publisher::new(config.publish);
    if let Some(sha) = sha {
        publisher = publisher.with_sha(sha);
    }
    serde_json::to_string(&publisher.prepare(html)).map_err(js_err)
}

/// Build the contents-API request body that uploads an image file.
#[wasm_bindgen]
pub fn image_upload_request(name: &str, bytes: &[u8], config_json: &str) -> Result<String, JsValue> {
    let config = build_config(config_json)?;
    let request = Publisher::new(config.publish).prepare_image(name, bytes, crate::util::now_millis());
    serde_json::to_string(&request).map_err(js_err)
}
