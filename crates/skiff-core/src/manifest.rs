use crate::CoreError;
use skiff_remote::{normalise_image_name, Remote, Repositories};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the tag record `docker load` reads at the archive root.
pub const REPOSITORIES_FILE: &str = "repositories";

/// Write the tag record for `image` into the staging tree.
///
/// Returns the path written, or `None` when the remote has no tag record for
/// the reference (a pull by bare id), in which case nothing is written.
pub fn prepare_repositories(
    remote: &dyn Remote,
    image: &str,
    image_root: &Path,
) -> Result<Option<PathBuf>, CoreError> {
    let (repo, tag) = normalise_image_name(image);
    let Some(id) = remote.parse_tag(&repo, &tag)? else {
        debug!("no tag record for {repo}:{tag}, skipping repositories file");
        return Ok(None);
    };

    let mut repositories = Repositories::new();
    repositories.insert(repo.clone(), BTreeMap::from([(tag.clone(), id.to_string())]));

    let path = image_root.join(REPOSITORIES_FILE);
    fs::write(&path, serde_json::to_vec(&repositories)?)?;
    info!("tagging {repo}:{tag} as {}", id.short());
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{chain_remote, seed_layer, seed_tag};
    use skiff_remote::fs::FsStore;
    use skiff_remote::LayoutRemote;

    #[test]
    fn writes_record_for_tagged_image() {
        let remote_dir = tempfile::tempdir().unwrap();
        let remote = chain_remote(remote_dir.path());
        let staging = tempfile::tempdir().unwrap();

        let path = prepare_repositories(&remote, "busybox", staging.path())
            .unwrap()
            .unwrap();
        assert_eq!(path, staging.path().join("repositories"));
        let doc: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(doc, serde_json::json!({"busybox": {"latest": "A"}}));
    }

    #[test]
    fn untagged_reference_writes_nothing() {
        let remote_dir = tempfile::tempdir().unwrap();
        let remote = chain_remote(remote_dir.path());
        let staging = tempfile::tempdir().unwrap();

        assert!(prepare_repositories(&remote, "A", staging.path())
            .unwrap()
            .is_none());
        assert!(!staging.path().join("repositories").exists());
    }

    #[test]
    fn registry_port_is_not_a_tag() {
        let remote_dir = tempfile::tempdir().unwrap();
        seed_layer(remote_dir.path(), "f00d", None);
        seed_tag(remote_dir.path(), "registry.local:5000/app", "latest", "f00d");
        let remote = LayoutRemote::new(FsStore::new(remote_dir.path()));
        let staging = tempfile::tempdir().unwrap();

        let path = prepare_repositories(&remote, "registry.local:5000/app", staging.path())
            .unwrap()
            .unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&fs::read(path).unwrap()).unwrap();
        assert_eq!(
            doc,
            serde_json::json!({"registry.local:5000/app": {"latest": "f00d"}})
        );
    }

    #[test]
    fn existing_file_is_truncated() {
        let remote_dir = tempfile::tempdir().unwrap();
        let remote = chain_remote(remote_dir.path());
        let staging = tempfile::tempdir().unwrap();
        fs::write(staging.path().join("repositories"), "x".repeat(4096)).unwrap();

        prepare_repositories(&remote, "busybox:latest", staging.path()).unwrap();
        let text = fs::read_to_string(staging.path().join("repositories")).unwrap();
        assert_eq!(text, r#"{"busybox":{"latest":"A"}}"#);
    }

    #[test]
    fn unwritable_root_is_fatal() {
        let remote_dir = tempfile::tempdir().unwrap();
        let remote = chain_remote(remote_dir.path());
        let staging = tempfile::tempdir().unwrap();
        let missing = staging.path().join("gone");
        assert!(matches!(
            prepare_repositories(&remote, "busybox", &missing),
            Err(CoreError::Io(_))
        ));
    }
}
