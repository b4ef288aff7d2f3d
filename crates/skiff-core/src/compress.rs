use crate::CoreError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

const LZ4_EXT: &str = "lz4";

/// Layer payload codec. Both directions replace the input file with the output
/// file next to it.
pub trait Compressor: Send + Sync {
    /// `layer.tar.lz4` becomes `layer.tar`. Returns the decompressed path.
    fn decompress(&self, path: &Path) -> Result<PathBuf, CoreError>;

    /// `layer.tar` becomes `layer.tar.lz4`. Returns the compressed path.
    fn compress(&self, path: &Path) -> Result<PathBuf, CoreError>;
}

/// Runs the external `lz4` tool.
pub struct Lz4Command {
    binary: String,
}

impl Lz4Command {
    pub fn new(binary: &str) -> Self {
        Self {
            binary: binary.to_owned(),
        }
    }

    fn run(&self, mode: &str, src: &Path, dst: &Path) -> Result<(), CoreError> {
        debug!("{} {mode} {} -> {}", self.binary, src.display(), dst.display());
        let output = Command::new(&self.binary)
            .arg(mode)
            .args(["-f", "-q"])
            .arg(src)
            .arg(dst)
            .output()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => {
                    CoreError::Compression(format!("'{}' not found in PATH", self.binary))
                }
                _ => CoreError::Compression(format!("failed to run {}: {e}", self.binary)),
            })?;
        if !output.status.success() {
            return Err(CoreError::Compression(format!(
                "{} {mode} {}: {}",
                self.binary,
                src.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        fs::remove_file(src)?;
        Ok(())
    }
}

impl Compressor for Lz4Command {
    fn decompress(&self, path: &Path) -> Result<PathBuf, CoreError> {
        if path.extension().and_then(|e| e.to_str()) != Some(LZ4_EXT) {
            return Err(CoreError::Compression(format!(
                "{} does not end in .{LZ4_EXT}",
                path.display()
            )));
        }
        let out = path.with_extension("");
        self.run("-d", path, &out)?;
        Ok(out)
    }

    fn compress(&self, path: &Path) -> Result<PathBuf, CoreError> {
        let mut name = path.as_os_str().to_owned();
        name.push(".");
        name.push(LZ4_EXT);
        let out = PathBuf::from(name);
        self.run("-z", path, &out)?;
        Ok(out)
    }
}
