//! Error types for sitepatch operations.

use thiserror::Error;

/// Errors that can occur while loading, reconciling or publishing a page.
///
/// Per-item problems during reconciliation (a locator that no longer resolves,
/// a protected target) are not errors: they are logged and skipped.
#[derive(Error, Debug)]
pub enum Error {
    #[error("HTML parse error: {0}")]
    Parse(String),

    #[error("Invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Invalid locator: {0}")]
    InvalidLocator(String),

    #[error("Unknown content field `{0}`")]
    InvalidField(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Publish error: {0}")]
    Publish(String),
}

pub type Result<T> = std::result::Result<T, Error>;
