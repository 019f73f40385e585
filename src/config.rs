//! Site configuration.
//!
//! Everything the engine needs to know about a particular page layout lives
//! here: the section list, the extraction heuristics, the protected-region
//! denylist, the freshness marker and the publish target. Each field defaults
//! to the values of the stock marketing page, so a config file only has to
//! name what differs.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::content::ExtractRules;
use crate::dom::SelectorSet;
use crate::error::Result;
use crate::section::{Section, SectionMap, default_sections};

/// Regions the reconciler never writes into.
pub const DEFAULT_PROTECTED: &[&str] = &[
    "form",
    ".contact-form",
    ".hero-image",
    ".polaroid",
    ".phone-mockup",
    ".portfolio-item",
    ".service-icon",
    ".portfolio-overlay",
    ".social-icon",
    ".hero-sticker",
];

/// Site configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteConfig {
    pub sections: Vec<Section>,
    pub extract: ExtractRules,
    pub protected: Vec<String>,
    pub freshness: Freshness,
    pub publish: PublishTarget,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            sections: default_sections(),
            extract: ExtractRules::default(),
            protected: DEFAULT_PROTECTED.iter().map(|s| s.to_string()).collect(),
            freshness: Freshness::default(),
            publish: PublishTarget::default(),
        }
    }
}

/// How a reconciled document is marked as fresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Freshness {
    /// Append a `<!--Last updated: ...-->` comment to `<body>`.
    pub comment: bool,
    /// Add `Cache-Control`/`Pragma`/`Expires` meta tags to `<head>`.
    pub cache_meta: bool,
}

impl Default for Freshness {
    fn default() -> Self {
        Self {
            comment: true,
            cache_meta: false,
        }
    }
}

/// Where the published document goes in the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PublishTarget {
    pub owner: String,
    pub repo: String,
    pub path: String,
    pub branch: String,
    pub message: String,
}

impl Default for PublishTarget {
    fn default() -> Self {
        Self {
            owner: "siwesz".into(),
            repo: "smm".into(),
            path: "index.html".into(),
            branch: "main".into(),
            message: "Update website content via admin panel".into(),
        }
    }
}

/// A config with every selector compiled.
#[derive(Debug, Clone)]
pub struct BuiltConfig {
    pub sections: SectionMap,
    pub rules: crate::content::CompiledRules,
    pub protected: SelectorSet,
    pub freshness: Freshness,
    pub publish: PublishTarget,
}

impl SiteConfig {
    /// Parse a (possibly partial) JSON config on top of the defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Compile selectors. Any invalid selector is reported here rather than
    /// during a save.
    pub fn build(&self) -> Result<BuiltConfig> {
        if let Some(dup) = first_duplicate(self.sections.iter().map(|s| s.id.as_str())) {
            return Err(crate::Error::Config(format!("duplicate section id `{dup}`")));
        }

        Ok(BuiltConfig {
            sections: SectionMap::new(self.sections.clone())?,
            rules: self.extract.compile()?,
            protected: SelectorSet::from_list(&self.protected)?,
            freshness: self.freshness.clone(),
            publish: self.publish.clone(),
        })
    }
}

fn first_duplicate<'a>(ids: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().find(|id| !seen.insert(*id))
}
