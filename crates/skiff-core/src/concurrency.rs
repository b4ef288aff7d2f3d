//! Per-image pull locks.
//!
//! Two pulls of the same image id would stage and import the same layers
//! twice, so callers hold a [`PullLock`] on the resolved id for the length of
//! a pull. The lock is an fs2 advisory lock on `<work_dir>/locks/<id>.lock`;
//! pulls of different ids never contend.

use crate::{CoreError, Settings};
use fs2::FileExt;
use skiff_remote::ImageId;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Exclusive hold on one image id. Released when dropped.
pub struct PullLock {
    id: ImageId,
    path: PathBuf,
    file: File,
}

impl PullLock {
    /// Block until no other process is pulling `id`.
    pub fn acquire(settings: &Settings, id: &ImageId) -> Result<Self, CoreError> {
        let (path, file) = open_lock_file(settings, id)?;
        file.lock_exclusive()?;
        debug!("holding pull lock {}", path.display());
        Ok(Self {
            id: id.clone(),
            path,
            file,
        })
    }

    /// `None` when another process is already pulling `id`.
    pub fn try_acquire(settings: &Settings, id: &ImageId) -> Result<Option<Self>, CoreError> {
        let (path, file) = open_lock_file(settings, id)?;
        if file.try_lock_exclusive().is_err() {
            debug!("pull lock {} is busy", path.display());
            return Ok(None);
        }
        Ok(Some(Self {
            id: id.clone(),
            path,
            file,
        }))
    }

    /// Take the lock without blocking if possible, otherwise call `on_wait`
    /// once and block.
    pub fn acquire_or_wait(
        settings: &Settings,
        id: &ImageId,
        on_wait: impl FnOnce(&ImageId),
    ) -> Result<Self, CoreError> {
        match Self::try_acquire(settings, id)? {
            Some(lock) => Ok(lock),
            None => {
                on_wait(id);
                Self::acquire(settings, id)
            }
        }
    }

    pub fn id(&self) -> &ImageId {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PullLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn open_lock_file(settings: &Settings, id: &ImageId) -> Result<(PathBuf, File), CoreError> {
    if !id.is_valid_component() {
        return Err(CoreError::Config(format!(
            "cannot lock invalid image id '{id}'"
        )));
    }
    fs::create_dir_all(settings.locks_dir())?;
    let path = settings.lock_path(id);
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&path)?;
    Ok((path, file))
}
