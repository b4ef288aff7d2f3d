use crate::CoreError;
use serde::{Deserialize, Serialize};
use skiff_engine::EngineConfig;
use skiff_remote::ImageId;
use std::fs;
use std::path::{Path, PathBuf};

fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("skiff")
}

/// Runtime settings, read from `~/.config/skiff/config.toml`.
///
/// ```toml
/// work_dir = "/var/tmp/skiff"
/// keep_staging = false
///
/// [engine]
/// host = "unix:///var/run/docker.sock"
/// binary = "docker"
///
/// [compressor]
/// binary = "lz4"
///
/// [archiver]
/// program = "tar"
/// args = ["cf", "-", "."]
///
/// [remote]
/// auth_token = "..."
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Parent directory of staging trees and pull locks.
    pub work_dir: PathBuf,
    /// Leave staging trees on disk after a pull or push.
    pub keep_staging: bool,
    pub engine: EngineConfig,
    pub compressor: CompressorConfig,
    pub archiver: ArchiverConfig,
    pub remote: RemoteSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            keep_staging: false,
            engine: EngineConfig::default(),
            compressor: CompressorConfig::default(),
            archiver: ArchiverConfig::default(),
            remote: RemoteSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressorConfig {
    pub binary: String,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            binary: "lz4".to_owned(),
        }
    }
}

/// The program that turns a staging tree into a tar stream on stdout. It runs
/// with the staging root as its working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiverConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for ArchiverConfig {
    fn default() -> Self {
        Self {
            program: "tar".to_owned(),
            args: vec!["cf".to_owned(), "-".to_owned(), ".".to_owned()],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    /// Bearer token sent to HTTP remotes.
    pub auth_token: Option<String>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| CoreError::Config(format!("invalid config {}: {e}", path.display())))
    }

    /// Load `~/.config/skiff/config.toml`, or defaults when it does not exist.
    pub fn load_default() -> Result<Self, CoreError> {
        match default_config_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// An explicit path must exist; without one the default location is optional.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, CoreError> {
        match explicit {
            Some(path) => Self::load(path),
            None => Self::load_default(),
        }
    }

    pub fn locks_dir(&self) -> PathBuf {
        self.work_dir.join("locks")
    }

    pub fn lock_path(&self, id: &ImageId) -> PathBuf {
        self.locks_dir().join(format!("{id}.lock"))
    }
}

fn default_config_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    Some(PathBuf::from(home).join(".config/skiff/config.toml"))
}
