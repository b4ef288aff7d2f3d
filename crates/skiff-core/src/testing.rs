//! Shared fixtures for the pipeline tests.

use crate::{Compressor, CoreError};
use skiff_remote::fs::FsStore;
use skiff_remote::LayoutRemote;
use std::fs;
use std::path::{Path, PathBuf};

/// Compressor that only renames files, so tests need no `lz4` binary.
pub(crate) struct Passthrough;

impl Compressor for Passthrough {
    fn decompress(&self, path: &Path) -> Result<PathBuf, CoreError> {
        let out = path.with_extension("");
        fs::rename(path, &out)?;
        Ok(out)
    }

    fn compress(&self, path: &Path) -> Result<PathBuf, CoreError> {
        let mut name = path.as_os_str().to_owned();
        name.push(".lz4");
        let out = PathBuf::from(name);
        fs::rename(path, &out)?;
        Ok(out)
    }
}

/// Write one layer in remote layout under a directory remote at `root`.
pub(crate) fn seed_layer(root: &Path, id: &str, parent: Option<&str>) {
    let dir = root.join("images").join(id);
    fs::create_dir_all(&dir).unwrap();
    let json = match parent {
        Some(p) => format!(r#"{{"id":"{id}","parent":"{p}"}}"#),
        None => format!(r#"{{"id":"{id}"}}"#),
    };
    fs::write(dir.join("json"), json).unwrap();
    fs::write(dir.join("layer.tar.lz4"), format!("layer-{id}")).unwrap();
}

pub(crate) fn seed_tag(root: &Path, repo: &str, tag: &str, id: &str) {
    let dir = root.join("repositories").join(repo);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(tag), id).unwrap();
}

/// Directory remote holding the chain `A -> B -> C` with `busybox:latest`
/// pointing at `A`.
pub(crate) fn chain_remote(root: &Path) -> LayoutRemote<FsStore> {
    seed_layer(root, "A", Some("B"));
    seed_layer(root, "B", Some("C"));
    seed_layer(root, "C", None);
    seed_tag(root, "busybox", "latest", "A");
    LayoutRemote::new(FsStore::new(root))
}

pub(crate) fn append_entry(builder: &mut tar::Builder<Vec<u8>>, path: &str, data: &[u8]) {
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    builder.append_data(&mut header, path, data).unwrap();
}

/// A legacy `docker save` archive with layers `aaa1 -> bbb2`, tagged `app:v1`.
pub(crate) fn save_archive() -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (id, parent) in [("aaa1", Some("bbb2")), ("bbb2", None)] {
        let json = match parent {
            Some(p) => format!(r#"{{"id":"{id}","parent":"{p}"}}"#),
            None => format!(r#"{{"id":"{id}"}}"#),
        };
        append_entry(&mut builder, &format!("{id}/json"), json.as_bytes());
        append_entry(&mut builder, &format!("{id}/layer.tar"), format!("raw-{id}").as_bytes());
        append_entry(&mut builder, &format!("{id}/VERSION"), b"1.0");
    }
    append_entry(&mut builder, "repositories", br#"{"app":{"v1":"aaa1"}}"#);
    append_entry(&mut builder, "manifest.json", b"[]");
    builder.into_inner().unwrap()
}
