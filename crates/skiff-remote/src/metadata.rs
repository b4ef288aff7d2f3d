use crate::ImageId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// The `repositories` document: repository name to tag to id.
pub type Repositories = BTreeMap<String, BTreeMap<String, String>>;

/// One node of the remote layer graph, read from a layer's `json` document.
///
/// Only the fields the walker and the CLI need are typed; everything else in
/// the document is kept verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub id: ImageId,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent: Option<ImageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(rename = "Size", default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ImageMetadata {
    pub fn new(id: impl Into<ImageId>, parent: Option<ImageId>) -> Self {
        Self {
            id: id.into(),
            parent,
            created: None,
            size: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<ImageId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty()).map(ImageId::new))
}

/// A tag record found on a remote.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RemoteImage {
    pub repo: String,
    pub tag: String,
    pub id: ImageId,
}

/// Result of a push operation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PushResult {
    pub layers_pushed: usize,
    pub layers_skipped: usize,
    pub tags_written: Vec<(String, String)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_legacy_layer_json() {
        let doc = r#"{
            "id": "sha256:aaaa",
            "parent": "bbbb",
            "created": "2014-10-01T20:46:07.263351912Z",
            "container_config": {"Cmd": ["/bin/sh"]},
            "Size": 2433303
        }"#;
        let meta: ImageMetadata = serde_json::from_str(doc).unwrap();
        assert_eq!(meta.id, "aaaa");
        assert_eq!(meta.parent, Some(ImageId::new("bbbb")));
        assert_eq!(meta.size, Some(2_433_303));
        assert!(meta.created.is_some());
        assert!(meta.extra.contains_key("container_config"));
    }

    #[test]
    fn empty_parent_means_root() {
        let meta: ImageMetadata = serde_json::from_str(r#"{"id":"aaaa","parent":""}"#).unwrap();
        assert!(meta.is_root());
        let meta: ImageMetadata = serde_json::from_str(r#"{"id":"aaaa"}"#).unwrap();
        assert!(meta.is_root());
    }

    #[test]
    fn extra_fields_survive_reserialization() {
        let doc = r#"{"id":"aaaa","architecture":"amd64"}"#;
        let meta: ImageMetadata = serde_json::from_str(doc).unwrap();
        let back = serde_json::to_value(&meta).unwrap();
        assert_eq!(back["architecture"], "amd64");
        assert!(back.get("parent").is_none());
    }
}
