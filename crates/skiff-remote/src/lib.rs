//! Remote blob stores holding container image layers.
//!
//! This crate provides the [`ImageId`] identifier type, the [`Remote`]
//! capability that the sync pipeline depends on, the parent-chain walker
//! ([`walk_images`]), and layout-based backends for a plain directory
//! ([`fs::FsStore`]) and an HTTP object store ([`http::HttpStore`]).

pub mod config;
pub mod fs;
pub mod http;
pub mod id;
pub mod layout;
pub mod metadata;
pub mod reference;
pub mod walk;

pub use config::{open_remote, RemoteConfig, RemoteKind};
pub use id::ImageId;
pub use layout::{parse_image_path, BlobStore, LayoutRemote};
pub use metadata::{ImageMetadata, PushResult, RemoteImage, Repositories};
pub use reference::{normalise_image_name, DEFAULT_TAG};
pub use walk::{walk_images, Visit};

use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("ambiguous image id prefix '{prefix}': matches {count} images")]
    Ambiguous { prefix: String, count: usize },
    #[error("remote config error: {0}")]
    Config(String),
    #[error("parent chain loops back to {0}")]
    ParentCycle(String),
    #[error("integrity failure for '{key}': expected {expected}, got {actual}")]
    IntegrityFailure {
        key: String,
        expected: String,
        actual: String,
    },
}

impl From<serde_json::Error> for RemoteError {
    fn from(e: serde_json::Error) -> Self {
        RemoteError::Serialization(e.to_string())
    }
}

/// A storage backend that image layers can be pushed to and pulled from.
pub trait Remote: Send + Sync {
    /// Human-readable description of the remote, for logs and `check`.
    fn desc(&self) -> String;

    /// Check that the remote is reachable and laid out as expected.
    fn validate(&self) -> Result<(), RemoteError>;

    /// Upload the exported image tree at `image_root` and record its tags.
    fn push(&self, image: &str, image_root: &Path) -> Result<PushResult, RemoteError>;

    /// Fetch one layer's metadata and compressed payload into `dst`.
    fn pull_image_id(&self, id: &ImageId, dst: &Path) -> Result<(), RemoteError>;

    /// Look up the id recorded for `repo:tag`. `None` when there is no record.
    fn parse_tag(&self, repo: &str, tag: &str) -> Result<Option<ImageId>, RemoteError>;

    /// Expand an id or unique id prefix to the full id stored on the remote.
    fn image_full_id(&self, id: &ImageId) -> Result<ImageId, RemoteError>;

    fn image_metadata(&self, id: &ImageId) -> Result<ImageMetadata, RemoteError>;

    /// Every tag record on the remote.
    fn list(&self) -> Result<Vec<RemoteImage>, RemoteError>;

    /// Resolve `IMAGE[:TAG]`, or a bare id / id prefix, to a full id.
    fn resolve_image_name_to_id(&self, image: &str) -> Result<ImageId, RemoteError> {
        let (repo, tag) = normalise_image_name(image);
        if let Some(id) = self.parse_tag(&repo, &tag)? {
            debug!("resolved {repo}:{tag} via tag record");
            return Ok(id);
        }

        match self.image_full_id(&ImageId::new(image)) {
            Ok(id) => Ok(id),
            Err(RemoteError::NotFound(_)) => Err(RemoteError::NotFound(format!(
                "image '{image}' has no tag record or matching id on {}",
                self.desc()
            ))),
            Err(e) => Err(e),
        }
    }

    /// Split a remote tag-record path into `(repo, tag)`.
    fn parse_image_path(&self, path: &str, prefix: &str) -> (String, String) {
        parse_image_path(path, prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_display_not_found() {
        let e = RemoteError::NotFound("busybox".to_owned());
        assert_eq!(e.to_string(), "not found: busybox");
    }

    #[test]
    fn remote_error_display_ambiguous() {
        let e = RemoteError::Ambiguous {
            prefix: "ab".to_owned(),
            count: 3,
        };
        let msg = e.to_string();
        assert!(msg.contains("ab"));
        assert!(msg.contains('3'));
    }

    #[test]
    fn serde_error_converts_to_serialization() {
        let err = serde_json::from_str::<ImageMetadata>("{").unwrap_err();
        assert!(matches!(RemoteError::from(err), RemoteError::Serialization(_)));
    }
}
