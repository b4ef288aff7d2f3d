use crate::{Compressor, CoreError, REPOSITORIES_FILE};
use skiff_engine::ImageEngine;
use skiff_remote::layout::{IMAGES_PREFIX, METADATA_FILE};
use skiff_remote::ImageId;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const SAVE_ARCHIVE: &str = "save.tar";
const RAW_LAYER: &str = "layer.tar";

/// An image exported from the engine, laid out the way
/// [`skiff_remote::Remote::push`] expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedImage {
    /// Contains `images/<id>/` directories and the `repositories` record.
    pub root: PathBuf,
    pub layers: Vec<ImageId>,
}

/// Export `image` from the engine into `staging` and convert it for upload.
///
/// Reads the legacy `docker save` layout: one directory per layer holding
/// `json`, `layer.tar` and `VERSION`, plus a `repositories` file. Each layer
/// directory is moved under `images/` and its payload compressed.
pub fn prepare_push_image(
    engine: &dyn ImageEngine,
    compressor: &dyn Compressor,
    image: &str,
    staging: &Path,
) -> Result<ExportedImage, CoreError> {
    let archive_path = staging.join(SAVE_ARCHIVE);
    info!("exporting {image} from {}", engine.describe());
    {
        let mut out = BufWriter::new(fs::File::create(&archive_path)?);
        engine.export_image(image, &mut out)?;
        out.flush()?;
    }

    let unpacked = staging.join("save");
    fs::create_dir_all(&unpacked)?;
    tar::Archive::new(fs::File::open(&archive_path)?).unpack(&unpacked)?;
    fs::remove_file(&archive_path)?;

    let root = staging.join("image");
    let images_dir = root.join(IMAGES_PREFIX);
    fs::create_dir_all(&images_dir)?;

    let mut layers = Vec::new();
    for entry in fs::read_dir(&unpacked)? {
        let entry = entry?;
        let dir = entry.path();
        if !entry.file_type()?.is_dir()
            || !dir.join(METADATA_FILE).is_file()
            || !dir.join(RAW_LAYER).is_file()
        {
            continue;
        }
        let id = ImageId::new(entry.file_name().to_string_lossy());
        let dst = images_dir.join(id.as_str());
        fs::rename(&dir, &dst)?;
        compressor.compress(&dst.join(RAW_LAYER))?;
        debug!("staged layer {} for upload", id.short());
        layers.push(id);
    }

    if layers.is_empty() {
        return Err(CoreError::Export(format!(
            "archive for {image} has no layer directories (is it in the legacy save format?)"
        )));
    }
    layers.sort();

    let repositories = unpacked.join(REPOSITORIES_FILE);
    if repositories.is_file() {
        fs::rename(&repositories, root.join(REPOSITORIES_FILE))?;
    }

    Ok(ExportedImage { root, layers })
}
