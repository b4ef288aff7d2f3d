//! Sync orchestration for skiff.
//!
//! Ties a [`skiff_remote::Remote`] to a local [`skiff_engine::ImageEngine`]:
//! walking the remote layer graph for the layers missing locally, staging and
//! decompressing them, writing the `repositories` record, and streaming the
//! result into the engine as a tar archive. The reverse direction exports an
//! image from the engine and uploads its layers. [`Syncer`] is the entry point
//! the CLI uses.

pub mod compress;
pub mod concurrency;
pub mod config;
pub mod manifest;
pub mod pull;
pub mod push;
pub mod sync;
pub mod transfer;

#[cfg(test)]
pub(crate) mod testing;

pub use compress::{Compressor, Lz4Command};
pub use concurrency::PullLock;
pub use config::{ArchiverConfig, CompressorConfig, RemoteSettings, Settings};
pub use manifest::{prepare_repositories, REPOSITORIES_FILE};
pub use pull::Puller;
pub use push::{prepare_push_image, ExportedImage};
pub use sync::{PullResult, Syncer};
pub use transfer::{dir_not_exist_or_empty, send_tar, TransferReport};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("remote error: {0}")]
    Remote(#[from] skiff_remote::RemoteError),
    #[error("engine error: {0}")]
    Engine(#[from] skiff_engine::EngineError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("compression failed: {0}")]
    Compression(String),
    #[error("archiver failed: {0}")]
    Archiver(String),
    #[error("image import failed: {ingest} (archiver {archiver})")]
    Stream { ingest: String, archiver: String },
    #[error("export failed: {0}")]
    Export(String),
    #[error("config error: {0}")]
    Config(String),
}
