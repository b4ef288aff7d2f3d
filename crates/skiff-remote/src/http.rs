use crate::layout::REPOSITORIES_PREFIX;
use crate::{BlobStore, RemoteConfig, RemoteError};
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use ureq::http::Response;
use ureq::Body;

/// Blob store reached over plain HTTP.
///
/// Expects an object-store style API:
/// - `GET  /<key>`     download a blob (404 when missing)
/// - `PUT  /<key>`     upload a blob
/// - `HEAD /<key>`     existence check
/// - `GET  /<prefix>/` JSON array of every key below `prefix`
pub struct HttpStore {
    config: RemoteConfig,
    agent: ureq::Agent,
}

impl HttpStore {
    pub fn new(config: RemoteConfig) -> Self {
        let agent = ureq::Agent::new_with_defaults();
        Self { config, agent }
    }

    fn url(&self, key: &str) -> String {
        format!("{}/{}", self.config.url, key.trim_start_matches('/'))
    }

    fn bearer(&self) -> Option<String> {
        self.config
            .auth_token
            .as_ref()
            .map(|token| format!("Bearer {token}"))
    }

    fn map_error(url: &str, e: ureq::Error) -> RemoteError {
        match e {
            ureq::Error::StatusCode(404) => RemoteError::NotFound(url.to_owned()),
            ureq::Error::StatusCode(code) => RemoteError::Http(format!("HTTP {code} for {url}")),
            e => RemoteError::Http(e.to_string()),
        }
    }

    fn check_status(url: &str, code: u16) -> Result<(), RemoteError> {
        match code {
            404 => Err(RemoteError::NotFound(url.to_owned())),
            code if code >= 400 => Err(RemoteError::Http(format!("HTTP {code} for {url}"))),
            _ => Ok(()),
        }
    }

    fn do_get(&self, url: &str) -> Result<Response<Body>, RemoteError> {
        let mut req = self.agent.get(url);
        if let Some(auth) = self.bearer() {
            req = req.header("Authorization", &auth);
        }
        let resp = req.call().map_err(|e| Self::map_error(url, e))?;
        Self::check_status(url, resp.status().as_u16())?;
        Ok(resp)
    }

    fn do_put(
        &self,
        url: &str,
        content_type: &str,
        body: &mut dyn Read,
        len: u64,
    ) -> Result<(), RemoteError> {
        let mut req = self
            .agent
            .put(url)
            .header("Content-Type", content_type)
            .header("Content-Length", &len.to_string());
        if let Some(auth) = self.bearer() {
            req = req.header("Authorization", &auth);
        }
        let resp = req
            .send(ureq::SendBody::from_reader(body))
            .map_err(|e| Self::map_error(url, e))?;
        Self::check_status(url, resp.status().as_u16())
    }

    fn do_head(&self, url: &str) -> Result<u16, RemoteError> {
        let mut req = self.agent.head(url);
        if let Some(auth) = self.bearer() {
            req = req.header("Authorization", &auth);
        }
        match req.call() {
            Ok(resp) => Ok(resp.status().as_u16()),
            Err(ureq::Error::StatusCode(code)) => Ok(code),
            Err(e) => Err(RemoteError::Http(e.to_string())),
        }
    }
}

impl BlobStore for HttpStore {
    fn describe(&self) -> String {
        format!("http remote at {}", self.config.url)
    }

    fn check(&self) -> Result<(), RemoteError> {
        match self.list(REPOSITORIES_PREFIX) {
            Ok(_) | Err(RemoteError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, RemoteError> {
        let url = self.url(key);
        tracing::debug!("GET {url}");
        let resp = self.do_get(&url)?;
        let mut body = Vec::new();
        resp.into_body()
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|e| RemoteError::Http(e.to_string()))?;
        Ok(body)
    }

    fn get_to_file(&self, key: &str, dst: &Path) -> Result<u64, RemoteError> {
        let url = self.url(key);
        tracing::debug!("GET {url} -> {}", dst.display());
        let resp = self.do_get(&url)?;
        let mut reader = resp.into_body().into_reader();
        let mut file = fs::File::create(dst)?;
        let copied = io::copy(&mut reader, &mut file)?;
        file.sync_all()?;
        Ok(copied)
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<(), RemoteError> {
        let url = self.url(key);
        tracing::debug!("PUT {url} ({} bytes)", data.len());
        let mut body = data;
        self.do_put(&url, "application/octet-stream", &mut body, data.len() as u64)
    }

    fn put_file(&self, key: &str, src: &Path) -> Result<u64, RemoteError> {
        let url = self.url(key);
        let mut file = fs::File::open(src)?;
        let len = file.metadata()?.len();
        tracing::debug!("PUT {url} ({len} bytes from {})", src.display());
        self.do_put(&url, "application/octet-stream", &mut file, len)?;
        Ok(len)
    }

    fn exists(&self, key: &str) -> Result<bool, RemoteError> {
        let url = self.url(key);
        tracing::debug!("HEAD {url}");
        match self.do_head(&url)? {
            200 => Ok(true),
            404 => Ok(false),
            code => Err(RemoteError::Http(format!("HTTP {code} for HEAD {url}"))),
        }
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, RemoteError> {
        let listing = format!("{}/", prefix.trim_end_matches('/'));
        let body = self.get(&listing)?;
        let mut keys: Vec<String> = serde_json::from_slice(&body).map_err(|e| {
            RemoteError::Serialization(format!("invalid listing for {listing}: {e}"))
        })?;
        keys.sort();
        Ok(keys)
    }
}
