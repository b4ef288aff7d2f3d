use crate::{BlobStore, RemoteError};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Directory-backed blob store. Works for local disks and for anything
/// mounted into the filesystem (NFS, FUSE object-store mounts).
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn not_found(key: &str, e: io::Error) -> RemoteError {
        if e.kind() == io::ErrorKind::NotFound {
            RemoteError::NotFound(key.to_owned())
        } else {
            RemoteError::Io(e)
        }
    }

    /// Temp file next to the destination so the final rename stays on one filesystem.
    fn staging_file(&self, key: &str) -> Result<(PathBuf, NamedTempFile), RemoteError> {
        let dest = self.path(key);
        let dir = dest
            .parent()
            .map_or_else(|| self.root.clone(), Path::to_path_buf);
        fs::create_dir_all(&dir)?;
        let tmp = tempfile::Builder::new().prefix(".tmp-").tempfile_in(&dir)?;
        Ok((dest, tmp))
    }

    fn collect_keys(&self, dir: &Path, keys: &mut Vec<String>) -> Result<(), RemoteError> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if name.to_string_lossy().starts_with('.') {
                continue;
            }
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                self.collect_keys(&path, keys)?;
            } else if let Ok(rel) = path.strip_prefix(&self.root) {
                let key: Vec<_> = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                keys.push(key.join("/"));
            }
        }
        Ok(())
    }
}

impl BlobStore for FsStore {
    fn describe(&self) -> String {
        format!("directory remote at {}", self.root.display())
    }

    fn check(&self) -> Result<(), RemoteError> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(RemoteError::Config(format!(
                "remote directory {} does not exist",
                self.root.display()
            )))
        }
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, RemoteError> {
        fs::read(self.path(key)).map_err(|e| Self::not_found(key, e))
    }

    fn get_to_file(&self, key: &str, dst: &Path) -> Result<u64, RemoteError> {
        debug!("copy {key} -> {}", dst.display());
        fs::copy(self.path(key), dst).map_err(|e| Self::not_found(key, e))
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<(), RemoteError> {
        let (dest, mut tmp) = self.staging_file(key)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&dest).map_err(|e| RemoteError::Io(e.error))?;
        Ok(())
    }

    fn put_file(&self, key: &str, src: &Path) -> Result<u64, RemoteError> {
        let (dest, mut tmp) = self.staging_file(key)?;
        let mut source = fs::File::open(src)?;
        let copied = io::copy(&mut source, &mut tmp)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&dest).map_err(|e| RemoteError::Io(e.error))?;
        debug!("stored {key} ({copied} bytes)");
        Ok(copied)
    }

    fn exists(&self, key: &str) -> Result<bool, RemoteError> {
        Ok(self.path(key).is_file())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, RemoteError> {
        let dir = self.path(prefix);
        let mut keys = Vec::new();
        if dir.is_dir() {
            self.collect_keys(&dir, &mut keys)?;
        }
        keys.sort();
        Ok(keys)
    }
}
