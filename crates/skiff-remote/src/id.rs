//! Content identifiers for images and layers.
//!
//! An [`ImageId`] is the normalized content hash of a layer. Older producers
//! wrote bare hex digests while newer ones prefix the algorithm name
//! (`sha256:...`); normalizing on construction makes both forms compare equal.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

const HASH_PREFIX: &str = "sha256:";
const SHORT_LEN: usize = 12;

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ImageId(String);

impl ImageId {
    /// Build an id from a raw hash, stripping one `sha256:` prefix if present.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        match raw.strip_prefix(HASH_PREFIX) {
            Some(stripped) => Self(stripped.to_owned()),
            None => Self(raw),
        }
    }

    /// The first 12 characters of the id, or the whole id when shorter.
    #[must_use]
    pub fn short(&self) -> ImageId {
        Self(self.0.chars().take(SHORT_LEN).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the id can name a single directory or key segment: non-empty,
    /// not `.` or `..`, and free of path separators and NUL.
    pub fn is_valid_component(&self) -> bool {
        !matches!(self.0.as_str(), "" | "." | "..")
            && !self.0.contains(['/', '\\', '\0'])
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Deref for ImageId {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ImageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<std::path::Path> for ImageId {
    fn as_ref(&self) -> &std::path::Path {
        std::path::Path::new(&self.0)
    }
}

impl PartialEq<str> for ImageId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ImageId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl From<String> for ImageId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for ImageId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<ImageId> for String {
    fn from(id: ImageId) -> Self {
        id.0
    }
}
