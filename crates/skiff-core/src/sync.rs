use crate::{
    prepare_push_image, prepare_repositories, send_tar, Compressor, CoreError, Lz4Command,
    Puller, Settings, TransferReport,
};
use skiff_engine::ImageEngine;
use skiff_remote::{ImageId, PushResult, Remote};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use tracing::{debug, info};

/// Result of a completed pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullResult {
    pub id: ImageId,
    /// Layers fetched from the remote, child first.
    pub fetched: Vec<ImageId>,
    /// Whether a `repositories` record was written for the reference.
    pub tagged: bool,
    pub transfer: TransferReport,
    /// Staging tree left on disk when `keep_staging` is set.
    pub staging: Option<PathBuf>,
}

/// Moves images between a remote and the local engine.
///
/// Holds the engine, compressor and archiver chosen by [`Settings`]; remotes
/// are passed per call since one process may talk to several.
pub struct Syncer {
    settings: Settings,
    engine: Box<dyn ImageEngine>,
    compressor: Box<dyn Compressor>,
}

impl Syncer {
    pub fn new(settings: Settings) -> Self {
        let engine = skiff_engine::connect(&settings.engine);
        let compressor = Box::new(Lz4Command::new(&settings.compressor.binary));
        Self::with_parts(settings, engine, compressor)
    }

    pub fn with_parts(
        settings: Settings,
        engine: Box<dyn ImageEngine>,
        compressor: Box<dyn Compressor>,
    ) -> Self {
        Self {
            settings,
            engine,
            compressor,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn engine(&self) -> &dyn ImageEngine {
        self.engine.as_ref()
    }

    /// Open a remote definition with the configured credentials.
    pub fn open_remote(&self, def: &str) -> Result<Box<dyn Remote>, CoreError> {
        let remote = skiff_remote::open_remote(def, self.settings.remote.auth_token.as_deref())?;
        debug!("opened {}", remote.desc());
        Ok(remote)
    }

    pub fn resolve(&self, remote: &dyn Remote, image: &str) -> Result<ImageId, CoreError> {
        let id = remote.resolve_image_name_to_id(image)?;
        info!("{image} resolves to {}", id.short());
        Ok(id)
    }

    /// Resolve `image` on the remote and pull it. Callers that need to
    /// serialise pulls should resolve first, take a
    /// [`PullLock`](crate::PullLock) on the id, then use [`Self::pull_resolved`].
    pub fn pull(&self, remote: &dyn Remote, image: &str) -> Result<PullResult, CoreError> {
        let id = self.resolve(remote, image)?;
        self.pull_resolved(remote, image, &id)
    }

    pub fn pull_resolved(
        &self,
        remote: &dyn Remote,
        image: &str,
        id: &ImageId,
    ) -> Result<PullResult, CoreError> {
        info!("pulling {image} from {}", remote.desc());
        let staging = self.staging("pull-")?;
        let root = staging.path();

        let fetched = Puller::new(remote, self.engine(), self.compressor.as_ref())
            .prepare_pull_image(id, root)?;
        let tagged = prepare_repositories(remote, image, root)?.is_some();
        let transfer = send_tar(self.engine(), &self.settings.archiver, root)?;

        Ok(PullResult {
            id: id.clone(),
            fetched,
            tagged,
            transfer,
            staging: self.kept(&staging),
        })
    }

    /// Export `image` from the engine and upload the layers the remote lacks.
    pub fn push(&self, remote: &dyn Remote, image: &str) -> Result<PushResult, CoreError> {
        info!("pushing {image} to {}", remote.desc());
        let staging = self.staging("push-")?;
        let exported =
            prepare_push_image(self.engine(), self.compressor.as_ref(), image, staging.path())?;
        debug!("exported {} layers", exported.layers.len());
        let result = remote.push(image, &exported.root)?;
        if let Some(path) = self.kept(&staging) {
            info!("staging kept at {}", path.display());
        }
        Ok(result)
    }

    fn staging(&self, prefix: &str) -> Result<TempDir, CoreError> {
        fs::create_dir_all(&self.settings.work_dir)?;
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .keep(self.settings.keep_staging)
            .tempdir_in(&self.settings.work_dir)?;
        debug!("staging in {}", dir.path().display());
        Ok(dir)
    }

    fn kept(&self, staging: &TempDir) -> Option<PathBuf> {
        self.settings
            .keep_staging
            .then(|| staging.path().to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{chain_remote, save_archive, Passthrough};
    use skiff_engine::MockEngine;
    use skiff_remote::fs::FsStore;
    use skiff_remote::LayoutRemote;
    use std::path::Path;
    use std::sync::Arc;

    /// Lets a test keep inspecting the engine after handing it to the syncer.
    struct Shared(Arc<MockEngine>);

    impl ImageEngine for Shared {
        fn describe(&self) -> String {
            self.0.describe()
        }
        fn inspect_image(
            &self,
            id: &str,
        ) -> Result<skiff_engine::EngineImage, skiff_engine::EngineError> {
            self.0.inspect_image(id)
        }
        fn import_archive(
            &self,
            archive: &mut dyn std::io::Read,
        ) -> Result<(), skiff_engine::EngineError> {
            self.0.import_archive(archive)
        }
        fn export_image(
            &self,
            name: &str,
            out: &mut dyn std::io::Write,
        ) -> Result<(), skiff_engine::EngineError> {
            self.0.export_image(name, out)
        }
    }

    fn syncer(work: &Path, engine: &Arc<MockEngine>, keep: bool) -> Syncer {
        let settings = Settings {
            work_dir: work.to_path_buf(),
            keep_staging: keep,
            ..Settings::default()
        };
        Syncer::with_parts(
            settings,
            Box::new(Shared(Arc::clone(engine))),
            Box::new(Passthrough),
        )
    }

    fn staging_dirs(work: &Path) -> Vec<PathBuf> {
        fs::read_dir(work)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| {
                p.file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with("pull-"))
            })
            .collect()
    }

    #[test]
    fn pull_fetches_tags_and_imports() {
        let remote_dir = tempfile::tempdir().unwrap();
        let remote = chain_remote(remote_dir.path());
        let work = tempfile::tempdir().unwrap();
        let engine = Arc::new(MockEngine::new());

        let result = syncer(work.path(), &engine, false)
            .pull(&remote, "busybox")
            .unwrap();

        assert_eq!(result.id, ImageId::new("A"));
        assert_eq!(
            result.fetched,
            vec![ImageId::new("A"), ImageId::new("B"), ImageId::new("C")]
        );
        assert!(result.tagged);
        assert!(result.transfer.sent);
        assert!(result.staging.is_none());
        assert_eq!(engine.imports().len(), 1);
        assert!(staging_dirs(work.path()).is_empty());
    }

    #[test]
    fn pull_of_present_image_fetches_nothing() {
        let remote_dir = tempfile::tempdir().unwrap();
        let remote = chain_remote(remote_dir.path());
        let work = tempfile::tempdir().unwrap();
        let engine = Arc::new(MockEngine::new().with_image("A"));

        let result = syncer(work.path(), &engine, false)
            .pull(&remote, "busybox:latest")
            .unwrap();

        assert!(result.fetched.is_empty());
        assert_eq!(engine.inspected(), vec!["A"]);
    }

    #[test]
    fn failed_fetch_leaves_no_repositories_and_imports_nothing() {
        let remote_dir = tempfile::tempdir().unwrap();
        let remote = chain_remote(remote_dir.path());
        fs::remove_file(remote_dir.path().join("images/B/layer.tar.lz4")).unwrap();
        let work = tempfile::tempdir().unwrap();
        let engine = Arc::new(MockEngine::new());

        let err = syncer(work.path(), &engine, true)
            .pull(&remote, "busybox")
            .unwrap_err();

        assert!(matches!(err, CoreError::Remote(_)));
        assert!(engine.imports().is_empty());
        let kept = staging_dirs(work.path());
        assert_eq!(kept.len(), 1);
        assert!(kept[0].join("A").exists());
        assert!(!kept[0].join("repositories").exists());
    }

    #[test]
    fn pull_by_id_prefix_is_untagged() {
        let remote_dir = tempfile::tempdir().unwrap();
        let remote = chain_remote(remote_dir.path());
        let work = tempfile::tempdir().unwrap();
        let engine = Arc::new(MockEngine::new().with_image("B"));

        let result = syncer(work.path(), &engine, false).pull(&remote, "A").unwrap();
        assert!(!result.tagged);
        assert_eq!(result.fetched, vec![ImageId::new("A")]);
    }

    #[test]
    fn keep_staging_reports_path() {
        let remote_dir = tempfile::tempdir().unwrap();
        let remote = chain_remote(remote_dir.path());
        let work = tempfile::tempdir().unwrap();
        let engine = Arc::new(MockEngine::new());

        let result = syncer(work.path(), &engine, true)
            .pull(&remote, "busybox")
            .unwrap();
        let staging = result.staging.unwrap();
        assert!(staging.join("repositories").is_file());
        assert!(staging.join("C/layer.tar").is_file());
    }

    #[test]
    fn unknown_image_is_not_found() {
        let remote_dir = tempfile::tempdir().unwrap();
        let remote = chain_remote(remote_dir.path());
        let work = tempfile::tempdir().unwrap();
        let engine = Arc::new(MockEngine::new());

        let err = syncer(work.path(), &engine, false)
            .pull(&remote, "alpine")
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
        assert!(engine.inspected().is_empty());
    }

    #[test]
    fn push_then_pull_through_directory_remote() {
        let remote_dir = tempfile::tempdir().unwrap();
        let remote = LayoutRemote::new(FsStore::new(remote_dir.path()));
        let work = tempfile::tempdir().unwrap();

        let source = Arc::new(MockEngine::new().with_export_data(save_archive()));
        let pushed = syncer(work.path(), &source, false)
            .push(&remote, "app:v1")
            .unwrap();
        assert_eq!(pushed.layers_pushed, 2);
        assert_eq!(pushed.tags_written, vec![("app".to_owned(), "v1".to_owned())]);

        let again = syncer(work.path(), &source, false)
            .push(&remote, "app:v1")
            .unwrap();
        assert_eq!(again.layers_pushed, 0);
        assert_eq!(again.layers_skipped, 2);

        let target = Arc::new(MockEngine::new());
        let pulled = syncer(work.path(), &target, false)
            .pull(&remote, "app:v1")
            .unwrap();
        assert_eq!(
            pulled.fetched,
            vec![ImageId::new("aaa1"), ImageId::new("bbb2")]
        );
        assert!(pulled.tagged);
    }

    #[test]
    fn open_remote_rejects_unknown_scheme() {
        let work = tempfile::tempdir().unwrap();
        let engine = Arc::new(MockEngine::new());
        let syncer = syncer(work.path(), &engine, false);
        assert!(matches!(
            syncer.open_remote("s3://bucket"),
            Err(CoreError::Remote(_))
        ));
    }
}
