//! Local image engine access for skiff.
//!
//! The sync pipeline only needs three things from the local engine: a presence
//! query, a streaming archive import, and a streaming image export. This crate
//! defines that contract as [`ImageEngine`] and provides a Docker CLI backend,
//! a Docker Engine API backend for TCP hosts, and an in-memory mock.

pub mod cli;
pub mod config;
pub mod http;
pub mod mock;

pub use cli::DockerCli;
pub use config::{connect, EngineConfig};
pub use http::DockerHttp;
pub use mock::MockEngine;

use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no such image: {0}")]
    NoSuchImage(String),
    #[error("engine I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("engine '{0}' is not available on this system")]
    Unavailable(String),
    #[error("engine command failed: {0}")]
    CommandFailed(String),
    #[error("engine HTTP error: {0}")]
    Http(String),
    #[error("invalid engine response: {0}")]
    Serialization(String),
}

/// The subset of `docker image inspect` output skiff cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EngineImage {
    pub id: String,
    #[serde(default)]
    pub parent: String,
    #[serde(default)]
    pub repo_tags: Option<Vec<String>>,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub size: i64,
}

/// A local image engine that layers can be checked against and imported into.
pub trait ImageEngine: Send + Sync {
    fn describe(&self) -> String;

    /// Inspect an image by id or name. A missing image is
    /// [`EngineError::NoSuchImage`]; anything else is a real failure.
    fn inspect_image(&self, id: &str) -> Result<EngineImage, EngineError>;

    /// Load a tar archive in `docker save` layout, reading it as a stream.
    fn import_archive(&self, archive: &mut dyn Read) -> Result<(), EngineError>;

    /// Write a `docker save` archive of `name` to `out`.
    fn export_image(&self, name: &str, out: &mut dyn Write) -> Result<(), EngineError>;

    fn has_image(&self, id: &str) -> Result<bool, EngineError> {
        match self.inspect_image(id) {
            Ok(_) => Ok(true),
            Err(EngineError::NoSuchImage(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
