use crate::{EngineError, EngineImage, ImageEngine};
use std::io::{self, BufRead, BufReader, Read, Write};

/// Talks to the Docker Engine API over TCP.
///
/// Only the three image endpoints skiff needs are used:
/// - `GET  /images/{name}/json`   inspect
/// - `POST /images/load?quiet=1` import a `docker save` archive
/// - `GET  /images/{name}/get`   export a `docker save` archive
pub struct DockerHttp {
    base: String,
    agent: ureq::Agent,
}

impl DockerHttp {
    /// `host` is a `tcp://` or `http://` address as found in `DOCKER_HOST`.
    pub fn new(host: &str) -> Self {
        let base = match host.strip_prefix("tcp://") {
            Some(rest) => format!("http://{rest}"),
            None => host.to_owned(),
        };
        Self {
            base: base.trim_end_matches('/').to_owned(),
            agent: ureq::Agent::new_with_defaults(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    fn map_error(url: &str, e: ureq::Error) -> EngineError {
        match e {
            ureq::Error::StatusCode(code) => EngineError::Http(format!("HTTP {code} for {url}")),
            ureq::Error::Io(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                EngineError::Unavailable(url.to_owned())
            }
            e => EngineError::Http(e.to_string()),
        }
    }

    /// The load endpoint answers 200 even when the archive is rejected; errors
    /// arrive as `{"error": ...}` lines in the progress stream.
    fn check_load_stream(body: impl Read) -> Result<(), EngineError> {
        for line in BufReader::new(body).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let Ok(msg) = serde_json::from_str::<serde_json::Value>(&line) else {
                continue;
            };
            if let Some(err) = msg.get("error").and_then(serde_json::Value::as_str) {
                return Err(EngineError::CommandFailed(format!("image load: {err}")));
            }
            if let Some(stream) = msg.get("stream").and_then(serde_json::Value::as_str) {
                tracing::debug!("load: {}", stream.trim());
            }
        }
        Ok(())
    }
}

impl ImageEngine for DockerHttp {
    fn describe(&self) -> String {
        format!("docker api at {}", self.base)
    }

    fn inspect_image(&self, id: &str) -> Result<EngineImage, EngineError> {
        let url = self.url(&format!("/images/{id}/json"));
        tracing::debug!("GET {url}");
        let resp = match self.agent.get(&url).call() {
            Ok(resp) => resp,
            Err(ureq::Error::StatusCode(404)) => {
                return Err(EngineError::NoSuchImage(id.to_owned()))
            }
            Err(e) => return Err(Self::map_error(&url, e)),
        };
        let mut body = Vec::new();
        resp.into_body()
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|e| EngineError::Http(e.to_string()))?;
        serde_json::from_slice(&body).map_err(|e| {
            EngineError::Serialization(format!("failed to parse inspect response for {id}: {e}"))
        })
    }

    fn import_archive(&self, archive: &mut dyn Read) -> Result<(), EngineError> {
        let url = self.url("/images/load?quiet=1");
        tracing::debug!("POST {url}");
        let resp = self
            .agent
            .post(&url)
            .header("Content-Type", "application/x-tar")
            .send(ureq::SendBody::from_reader(archive))
            .map_err(|e| Self::map_error(&url, e))?;
        Self::check_load_stream(resp.into_body().into_reader())
    }

    fn export_image(&self, name: &str, out: &mut dyn Write) -> Result<(), EngineError> {
        let url = self.url(&format!("/images/{name}/get"));
        tracing::debug!("GET {url}");
        let resp = match self.agent.get(&url).call() {
            Ok(resp) => resp,
            Err(ureq::Error::StatusCode(404)) => {
                return Err(EngineError::NoSuchImage(name.to_owned()))
            }
            Err(e) => return Err(Self::map_error(&url, e)),
        };
        io::copy(&mut resp.into_body().into_reader(), out)?;
        Ok(())
    }
}
