use crate::{Compressor, CoreError};
use skiff_engine::ImageEngine;
use skiff_remote::layout::LAYER_FILE;
use skiff_remote::{walk_images, ImageId, Remote, Visit};
use std::path::Path;
use tracing::{debug, info};

/// Stages the layers of an image that the local engine is missing.
pub struct Puller<'a> {
    remote: &'a dyn Remote,
    engine: &'a dyn ImageEngine,
    compressor: &'a dyn Compressor,
}

impl<'a> Puller<'a> {
    pub fn new(
        remote: &'a dyn Remote,
        engine: &'a dyn ImageEngine,
        compressor: &'a dyn Compressor,
    ) -> Self {
        Self {
            remote,
            engine,
            compressor,
        }
    }

    /// Walk from `from` towards the root, fetching and decompressing every
    /// layer into `image_root/<id>/` until one is found locally.
    ///
    /// A layer present in the engine is taken to mean its ancestors are too,
    /// so the walk stops there. Returns the fetched ids in walk order. Any
    /// metadata, engine or fetch error aborts the walk.
    pub fn prepare_pull_image(
        &self,
        from: &ImageId,
        image_root: &Path,
    ) -> Result<Vec<ImageId>, CoreError> {
        let mut fetched = Vec::new();

        walk_images(self.remote, from, |id, meta| {
            if let Err(e) = meta {
                return Visit::Fail(CoreError::from(e));
            }

            match self.engine.has_image(id.as_str()) {
                Ok(true) => {
                    debug!("{} already present locally", id.short());
                    return Visit::Break;
                }
                Ok(false) => {}
                Err(e) => return Visit::Fail(CoreError::from(e)),
            }

            match self.fetch(id, image_root) {
                Ok(()) => {
                    fetched.push(id.clone());
                    Visit::Continue
                }
                Err(e) => Visit::Fail(e),
            }
        })?;

        Ok(fetched)
    }

    fn fetch(&self, id: &ImageId, image_root: &Path) -> Result<(), CoreError> {
        info!("pulling layer {}", id.short());
        let dst = image_root.join(id.as_str());
        self.remote.pull_image_id(id, &dst)?;
        self.compressor.decompress(&dst.join(LAYER_FILE))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{chain_remote, seed_layer, Passthrough};
    use skiff_engine::MockEngine;
    use skiff_remote::fs::FsStore;
    use skiff_remote::{LayoutRemote, RemoteError};
    use std::fs;

    fn ids(raw: &[&str]) -> Vec<ImageId> {
        raw.iter().map(|s| ImageId::new(*s)).collect()
    }

    #[test]
    fn fetches_whole_chain_when_nothing_is_local() {
        let remote_dir = tempfile::tempdir().unwrap();
        let remote = chain_remote(remote_dir.path());
        let engine = MockEngine::new();
        let staging = tempfile::tempdir().unwrap();

        let fetched = Puller::new(&remote, &engine, &Passthrough)
            .prepare_pull_image(&ImageId::new("A"), staging.path())
            .unwrap();

        assert_eq!(fetched, ids(&["A", "B", "C"]));
        assert_eq!(engine.inspected(), vec!["A", "B", "C"]);
        for id in ["A", "B", "C"] {
            let dir = staging.path().join(id);
            assert_eq!(
                fs::read_to_string(dir.join("layer.tar")).unwrap(),
                format!("layer-{id}")
            );
            assert!(!dir.join("layer.tar.lz4").exists());
            assert!(dir.join("json").exists());
        }
    }

    #[test]
    fn present_target_fetches_nothing() {
        let remote_dir = tempfile::tempdir().unwrap();
        let remote = chain_remote(remote_dir.path());
        let engine = MockEngine::new().with_image("A");
        let staging = tempfile::tempdir().unwrap();

        let fetched = Puller::new(&remote, &engine, &Passthrough)
            .prepare_pull_image(&ImageId::new("A"), staging.path())
            .unwrap();

        assert!(fetched.is_empty());
        assert_eq!(engine.inspected(), vec!["A"]);
        assert_eq!(fs::read_dir(staging.path()).unwrap().count(), 0);
    }

    #[test]
    fn stops_at_first_local_ancestor() {
        let remote_dir = tempfile::tempdir().unwrap();
        let remote = chain_remote(remote_dir.path());
        let engine = MockEngine::new().with_image("B");
        let staging = tempfile::tempdir().unwrap();

        let fetched = Puller::new(&remote, &engine, &Passthrough)
            .prepare_pull_image(&ImageId::new("A"), staging.path())
            .unwrap();

        assert_eq!(fetched, ids(&["A"]));
        assert!(!staging.path().join("B").exists());
        assert!(!staging.path().join("C").exists());
    }

    #[test]
    fn fetch_failure_aborts_walk() {
        let remote_dir = tempfile::tempdir().unwrap();
        let remote = chain_remote(remote_dir.path());
        fs::remove_file(remote_dir.path().join("images/B/layer.tar.lz4")).unwrap();
        let engine = MockEngine::new();
        let staging = tempfile::tempdir().unwrap();

        let err = Puller::new(&remote, &engine, &Passthrough)
            .prepare_pull_image(&ImageId::new("A"), staging.path())
            .unwrap_err();

        assert!(matches!(err, CoreError::Remote(_)));
        assert_eq!(engine.inspected(), vec!["A", "B"]);
        assert!(!staging.path().join("C").exists());
    }

    #[test]
    fn missing_parent_metadata_is_fatal() {
        let remote_dir = tempfile::tempdir().unwrap();
        seed_layer(remote_dir.path(), "A", Some("Z"));
        let remote = LayoutRemote::new(FsStore::new(remote_dir.path()));
        let engine = MockEngine::new();
        let staging = tempfile::tempdir().unwrap();

        let err = Puller::new(&remote, &engine, &Passthrough)
            .prepare_pull_image(&ImageId::new("A"), staging.path())
            .unwrap_err();

        assert!(matches!(
            err,
            CoreError::Remote(RemoteError::NotFound(_) | RemoteError::Io(_))
        ));
        assert!(staging.path().join("A/layer.tar").exists());
    }

    #[test]
    fn engine_failure_is_fatal() {
        let remote_dir = tempfile::tempdir().unwrap();
        let remote = chain_remote(remote_dir.path());
        let engine = MockEngine::new().with_inspect_failure("daemon unreachable");
        let staging = tempfile::tempdir().unwrap();

        let err = Puller::new(&remote, &engine, &Passthrough)
            .prepare_pull_image(&ImageId::new("A"), staging.path())
            .unwrap_err();

        assert!(matches!(err, CoreError::Engine(_)));
        assert_eq!(fs::read_dir(staging.path()).unwrap().count(), 0);
    }

    #[test]
    fn parent_outside_staging_tree_is_never_fetched() {
        let remote_dir = tempfile::tempdir().unwrap();
        let remote_root = remote_dir.path().join("remote");
        seed_layer(&remote_root, "A", Some("../escaped"));
        // A layer the bad pointer would resolve to if it were followed.
        seed_layer(&remote_root, "escaped", None);
        fs::rename(
            remote_root.join("images/escaped"),
            remote_root.join("escaped"),
        )
        .unwrap();
        let remote = LayoutRemote::new(FsStore::new(&remote_root));
        let engine = MockEngine::new();
        let work = tempfile::tempdir().unwrap();
        let staging = work.path().join("a/b");

        let err = Puller::new(&remote, &engine, &Passthrough)
            .prepare_pull_image(&ImageId::new("A"), &staging)
            .unwrap_err();

        assert!(matches!(
            err,
            CoreError::Remote(RemoteError::Serialization(_))
        ));
        assert_eq!(engine.inspected(), vec!["A"]);
        assert!(staging.join("A/layer.tar").exists());
        assert!(!work.path().join("a/escaped").exists());
        assert_eq!(fs::read_dir(&staging).unwrap().count(), 1);
    }

    #[test]
    fn parent_cycle_is_fatal() {
        let remote_dir = tempfile::tempdir().unwrap();
        seed_layer(remote_dir.path(), "A", Some("B"));
        seed_layer(remote_dir.path(), "B", Some("A"));
        let remote = LayoutRemote::new(FsStore::new(remote_dir.path()));
        let engine = MockEngine::new();
        let staging = tempfile::tempdir().unwrap();

        let err = Puller::new(&remote, &engine, &Passthrough)
            .prepare_pull_image(&ImageId::new("A"), staging.path())
            .unwrap_err();

        assert!(matches!(err, CoreError::Remote(RemoteError::ParentCycle(_))));
    }
}
