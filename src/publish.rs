//! Publishing a reconciled document.
//!
//! The document is encoded the way the GitHub contents API expects it
//! (standard base64 of the UTF-8 bytes) and handed to a [`ContentSink`]. The
//! sink is the only part that talks to the outside world, so the crate itself
//! never does network I/O.

use std::fs;
use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::config::PublishTarget;
use crate::error::{Error, Result};

/// Body of a contents-API `PUT` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRequest {
    /// Repository-relative path of the file.
    pub path: String,
    /// Commit message.
    pub message: String,
    /// Base64 of the document bytes.
    pub content: String,
    /// Blob sha of the version being replaced, if known.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sha: Option<String>,
    pub branch: String,
}

impl PublishRequest {
    /// Decode `content` back into the file bytes.
    pub fn decoded_bytes(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(&self.content)
            .map_err(|e| Error::Publish(format!("invalid base64 content: {e}")))
    }

    /// Decode `content` back into the document text.
    pub fn decoded(&self) -> Result<String> {
        String::from_utf8(self.decoded_bytes()?)
            .map_err(|e| Error::Publish(format!("content is not UTF-8: {e}")))
    }
}

/// Repository directory uploaded images are committed to.
pub const IMAGE_DIR: &str = "images";

/// Replace everything outside `[A-Za-z0-9.-]` with `_`, one per UTF-16 unit
/// so names match what a browser-side upload would produce.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .flat_map(|c| {
            let keep = c.is_ascii_alphanumeric() || c == '.' || c == '-';
            let (ch, count) = if keep { (c, 1) } else { ('_', c.len_utf16()) };
            std::iter::repeat_n(ch, count)
        })
        .collect()
}

/// Where a [`PublishRequest`] goes.
pub trait ContentSink {
    fn put(&mut self, request: &PublishRequest) -> Result<()>;
}

/// Writes the decoded document to `root/<request.path>`.
#[derive(Debug, Clone)]
pub struct FileSink {
    root: PathBuf,
}

impl FileSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ContentSink for FileSink {
    fn put(&mut self, request: &PublishRequest) -> Result<()> {
        let target = self.root.join(&request.path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, request.decoded_bytes()?)?;
        tracing::info!(path = %target.display(), branch = %request.branch, "published file");
        Ok(())
    }
}

/// Keeps every request it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub requests: Vec<PublishRequest>,
}

impl ContentSink for RecordingSink {
    fn put(&mut self, request: &PublishRequest) -> Result<()> {
        self.requests.push(request.clone());
        Ok(())
    }
}

/// Builds publish requests for one target file.
#[derive(Debug, Clone)]
pub struct Publisher {
    target: PublishTarget,
    sha: Option<String>,
}

impl Publisher {
    pub fn new(target: PublishTarget) -> Self {
        Self { target, sha: None }
    }

    /// Set the blob sha of the file being replaced.
    pub fn with_sha(mut self, sha: impl Into<String>) -> Self {
        self.sha = Some(sha.into());
        self
    }

    pub fn target(&self) -> &PublishTarget {
        &self.target
    }

    /// The contents-API URL for the target file.
    pub fn endpoint(&self) -> String {
        self.endpoint_for(&self.target.path)
    }

    /// The contents-API URL for any repository path.
    pub fn endpoint_for(&self, path: &str) -> String {
        format!(
            "https://api.github.com/repos/{}/{}/contents/{}",
            self.target.owner, self.target.repo, path
        )
    }

    pub fn prepare(&self, html: &str) -> PublishRequest {
        PublishRequest {
            path: self.target.path.clone(),
            message: self.target.message.clone(),
            content: STANDARD.encode(html.as_bytes()),
            sha: self.sha.clone(),
            branch: self.target.branch.clone(),
        }
    }

    /// Prepare the upload of an image file picked in the editor.
    ///
    /// The file lands in `images/<now_millis>-<sanitized name>` on the target
    /// branch. A fresh name never replaces anything, so no sha is sent.
    pub fn prepare_image(&self, name: &str, bytes: &[u8], now_millis: i64) -> PublishRequest {
        let file_name = format!("{now_millis}-{}", sanitize_file_name(name));
        PublishRequest {
            path: format!("{IMAGE_DIR}/{file_name}"),
            message: format!("Upload image: {file_name}"),
            content: STANDARD.encode(bytes),
            sha: None,
            branch: self.target.branch.clone(),
        }
    }

    /// Prepare an image upload and hand it to `sink`.
    pub fn upload_image(
        &self,
        name: &str,
        bytes: &[u8],
        now_millis: i64,
        sink: &mut dyn ContentSink,
    ) -> Result<PublishRequest> {
        if bytes.is_empty() {
            return Err(Error::Publish(format!("image `{name}` is empty")));
        }
        let request = self.prepare_image(name, bytes, now_millis);
        sink.put(&request)?;
        tracing::debug!(endpoint = %self.endpoint_for(&request.path), bytes = bytes.len(), "image upload accepted");
        Ok(request)
    }

    /// Prepare a request for `html` and hand it to `sink`.
    pub fn publish(&self, html: &str, sink: &mut dyn ContentSink) -> Result<PublishRequest> {
        let request = self.prepare(html);
        sink.put(&request)?;
        tracing::debug!(endpoint = %self.endpoint(), bytes = html.len(), "publish request accepted");
        Ok(request)
    }
}
