//! Key layout shared by every remote backend.
//!
//! ```text
//! images/<id>/json                  layer metadata (written last on push)
//! images/<id>/layer.tar.lz4         compressed layer payload
//! images/<id>/layer.tar.lz4.blake3  hex digest of the payload
//! images/<id>/VERSION               optional format marker
//! repositories/<repo>/<tag>         tag record, content is the id
//! ```

use crate::metadata::Repositories;
use crate::{
    normalise_image_name, ImageId, ImageMetadata, PushResult, Remote, RemoteError, RemoteImage,
};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, info};

pub const IMAGES_PREFIX: &str = "images";
pub const REPOSITORIES_PREFIX: &str = "repositories";
pub const METADATA_FILE: &str = "json";
pub const LAYER_FILE: &str = "layer.tar.lz4";
pub const CHECKSUM_FILE: &str = "layer.tar.lz4.blake3";
pub const VERSION_FILE: &str = "VERSION";

/// Raw key/value access to a remote. Keys are `/`-separated relative paths.
pub trait BlobStore: Send + Sync {
    fn describe(&self) -> String;

    /// Check that the store is reachable.
    fn check(&self) -> Result<(), RemoteError>;

    fn get(&self, key: &str) -> Result<Vec<u8>, RemoteError>;

    /// Stream a blob into a local file. Returns the number of bytes written.
    fn get_to_file(&self, key: &str, dst: &Path) -> Result<u64, RemoteError>;

    fn put(&self, key: &str, data: &[u8]) -> Result<(), RemoteError>;

    /// Stream a local file into a blob. Returns the number of bytes sent.
    fn put_file(&self, key: &str, src: &Path) -> Result<u64, RemoteError>;

    fn exists(&self, key: &str) -> Result<bool, RemoteError>;

    /// Every key below `prefix/`, at any depth.
    fn list(&self, prefix: &str) -> Result<Vec<String>, RemoteError>;
}

pub fn image_key(id: &ImageId, file: &str) -> String {
    format!("{IMAGES_PREFIX}/{id}/{file}")
}

pub fn tag_key(repo: &str, tag: &str) -> String {
    format!("{REPOSITORIES_PREFIX}/{repo}/{tag}")
}

/// Split a tag-record key such as `repositories/acme/web/v2` into
/// `("acme/web", "v2")`. Returns empty strings when `path` is not below
/// `prefix` or has no tag component.
pub fn parse_image_path(path: &str, prefix: &str) -> (String, String) {
    let prefix = prefix.trim_matches('/');
    let rest = if prefix.is_empty() {
        Some(path.trim_start_matches('/'))
    } else {
        path.trim_start_matches('/')
            .strip_prefix(prefix)
            .and_then(|r| r.strip_prefix('/'))
    };

    match rest.and_then(|r| r.rsplit_once('/')) {
        Some((repo, tag)) if !repo.is_empty() && !tag.is_empty() => {
            (repo.to_owned(), tag.to_owned())
        }
        _ => (String::new(), String::new()),
    }
}

/// Hex blake3 digest of a file, streamed.
pub fn file_digest(path: &Path) -> Result<String, RemoteError> {
    let mut file = fs::File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize().to_hex().to_string())
}

/// A [`Remote`] implemented over any [`BlobStore`] using the layout above.
pub struct LayoutRemote<S> {
    store: S,
}

impl<S: BlobStore> LayoutRemote<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn verify_layer(&self, id: &ImageId, layer_path: &Path) -> Result<(), RemoteError> {
        let key = image_key(id, CHECKSUM_FILE);
        let expected = match self.store.get(&key) {
            Ok(data) => String::from_utf8_lossy(&data).trim().to_owned(),
            Err(RemoteError::NotFound(_)) => {
                debug!("no digest stored for {}, skipping verification", id.short());
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let actual = file_digest(layer_path)?;
        if actual != expected {
            return Err(RemoteError::IntegrityFailure {
                key: image_key(id, LAYER_FILE),
                expected,
                actual,
            });
        }
        Ok(())
    }

    fn push_layer(&self, id: &ImageId, dir: &Path) -> Result<(), RemoteError> {
        let layer = dir.join(LAYER_FILE);
        let sent = self.store.put_file(&image_key(id, LAYER_FILE), &layer)?;
        let digest = file_digest(&layer)?;
        self.store
            .put(&image_key(id, CHECKSUM_FILE), digest.as_bytes())?;

        let version = dir.join(VERSION_FILE);
        if version.exists() {
            self.store.put_file(&image_key(id, VERSION_FILE), &version)?;
        }

        // The metadata document marks the layer as complete, so it goes last.
        self.store
            .put_file(&image_key(id, METADATA_FILE), &dir.join(METADATA_FILE))?;
        debug!("pushed layer {} ({sent} bytes)", id.short());
        Ok(())
    }
}

impl<S: BlobStore> Remote for LayoutRemote<S> {
    fn desc(&self) -> String {
        self.store.describe()
    }

    fn validate(&self) -> Result<(), RemoteError> {
        self.store.check()
    }

    fn push(&self, image: &str, image_root: &Path) -> Result<PushResult, RemoteError> {
        let images_dir = image_root.join(IMAGES_PREFIX);
        let mut result = PushResult::default();

        let mut ids = Vec::new();
        if images_dir.exists() {
            for entry in fs::read_dir(&images_dir)? {
                let entry = entry?;
                if entry.file_type()?.is_dir() {
                    ids.push(ImageId::new(entry.file_name().to_string_lossy()));
                }
            }
        }
        ids.sort();

        for id in &ids {
            if self.store.exists(&image_key(id, METADATA_FILE))? {
                debug!("remote already has layer {}", id.short());
                result.layers_skipped += 1;
                continue;
            }
            self.push_layer(id, &images_dir.join(id))?;
            result.layers_pushed += 1;
        }

        let repos_path = image_root.join(REPOSITORIES_PREFIX);
        if repos_path.is_file() {
            let (wanted_repo, _) = normalise_image_name(image);
            let repositories: Repositories = serde_json::from_slice(&fs::read(&repos_path)?)?;
            for (repo, tags) in &repositories {
                if *repo != wanted_repo {
                    continue;
                }
                for (tag, id) in tags {
                    let id = ImageId::new(id.as_str());
                    self.store.put(&tag_key(repo, tag), id.as_bytes())?;
                    info!("tagged {repo}:{tag} as {}", id.short());
                    result.tags_written.push((repo.clone(), tag.clone()));
                }
            }
        }

        Ok(result)
    }

    fn pull_image_id(&self, id: &ImageId, dst: &Path) -> Result<(), RemoteError> {
        if !id.is_valid_component() {
            return Err(RemoteError::NotFound(format!("image id '{id}'")));
        }
        fs::create_dir_all(dst)?;

        self.store
            .get_to_file(&image_key(id, METADATA_FILE), &dst.join(METADATA_FILE))?;

        let layer_path = dst.join(LAYER_FILE);
        let bytes = self
            .store
            .get_to_file(&image_key(id, LAYER_FILE), &layer_path)?;
        self.verify_layer(id, &layer_path)?;

        match self
            .store
            .get_to_file(&image_key(id, VERSION_FILE), &dst.join(VERSION_FILE))
        {
            Ok(_) | Err(RemoteError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        debug!("fetched layer {} ({bytes} bytes)", id.short());
        Ok(())
    }

    fn parse_tag(&self, repo: &str, tag: &str) -> Result<Option<ImageId>, RemoteError> {
        match self.store.get(&tag_key(repo, tag)) {
            Ok(data) => {
                let raw = String::from_utf8_lossy(&data);
                let raw = raw.trim();
                if raw.is_empty() {
                    return Ok(None);
                }
                let id = ImageId::new(raw);
                if !id.is_valid_component() {
                    return Err(RemoteError::Serialization(format!(
                        "tag record {repo}:{tag} holds invalid image id '{id}'"
                    )));
                }
                Ok(Some(id))
            }
            Err(RemoteError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn image_full_id(&self, id: &ImageId) -> Result<ImageId, RemoteError> {
        if !id.is_valid_component() {
            return Err(RemoteError::NotFound(format!("image id '{id}'")));
        }
        if self.store.exists(&image_key(id, METADATA_FILE))? {
            return Ok(id.clone());
        }

        let matches: BTreeSet<ImageId> = self
            .store
            .list(IMAGES_PREFIX)?
            .iter()
            .filter_map(|key| {
                key.strip_prefix(IMAGES_PREFIX)?
                    .strip_prefix('/')?
                    .split('/')
                    .next()
            })
            .filter(|candidate| candidate.starts_with(id.as_str()))
            .map(ImageId::new)
            .collect();

        let mut iter = matches.iter();
        match (iter.next(), matches.len()) {
            (Some(full), 1) => Ok(full.clone()),
            (None, _) => Err(RemoteError::NotFound(format!("image id '{id}'"))),
            (_, count) => Err(RemoteError::Ambiguous {
                prefix: id.to_string(),
                count,
            }),
        }
    }

    fn image_metadata(&self, id: &ImageId) -> Result<ImageMetadata, RemoteError> {
        let data = self.store.get(&image_key(id, METADATA_FILE))?;
        let meta = serde_json::from_slice(&data)
            .map_err(|e| RemoteError::Serialization(format!("invalid metadata for {id}: {e}")))?;
        Ok(meta)
    }

    fn list(&self) -> Result<Vec<RemoteImage>, RemoteError> {
        let mut images = Vec::new();
        for key in self.store.list(REPOSITORIES_PREFIX)? {
            let (repo, tag) = self.parse_image_path(&key, REPOSITORIES_PREFIX);
            if repo.is_empty() {
                continue;
            }
            if let Some(id) = self.parse_tag(&repo, &tag)? {
                images.push(RemoteImage { repo, tag, id });
            }
        }
        images.sort();
        Ok(images)
    }
}
