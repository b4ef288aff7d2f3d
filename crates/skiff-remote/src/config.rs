use crate::fs::FsStore;
use crate::http::HttpStore;
use crate::{LayoutRemote, Remote, RemoteError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Connection settings for an HTTP remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub url: String,
    #[serde(default)]
    pub auth_token: Option<String>,
}

impl RemoteConfig {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_owned(),
            auth_token: None,
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: &str) -> Self {
        self.auth_token = Some(token.to_owned());
        self
    }
}

/// Which backend a remote definition (the `REMOTE` CLI argument) points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteKind {
    Directory(PathBuf),
    Http(String),
}

impl RemoteKind {
    /// `http://` and `https://` URLs select the HTTP store, `file://` URLs and
    /// plain paths select a directory. Any other scheme is rejected.
    pub fn parse(def: &str) -> Result<Self, RemoteError> {
        let def = def.trim();
        if def.is_empty() {
            return Err(RemoteError::Config("empty remote definition".to_owned()));
        }
        if def.starts_with("http://") || def.starts_with("https://") {
            return Ok(Self::Http(def.trim_end_matches('/').to_owned()));
        }
        if let Some(path) = def.strip_prefix("file://") {
            return Ok(Self::Directory(PathBuf::from(path)));
        }
        if let Some((scheme, _)) = def.split_once("://") {
            return Err(RemoteError::Config(format!(
                "unsupported remote scheme '{scheme}' in '{def}'"
            )));
        }
        Ok(Self::Directory(PathBuf::from(def)))
    }
}

/// Open the remote described by `def`. `auth_token` only applies to HTTP remotes.
pub fn open_remote(def: &str, auth_token: Option<&str>) -> Result<Box<dyn Remote>, RemoteError> {
    match RemoteKind::parse(def)? {
        RemoteKind::Directory(root) => Ok(Box::new(LayoutRemote::new(FsStore::new(root)))),
        RemoteKind::Http(url) => {
            let mut config = RemoteConfig::new(&url);
            if let Some(token) = auth_token {
                config = config.with_token(token);
            }
            Ok(Box::new(LayoutRemote::new(HttpStore::new(config))))
        }
    }
}
