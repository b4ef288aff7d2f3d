use crate::{DockerCli, DockerHttp, ImageEngine};
use serde::{Deserialize, Serialize};

fn default_binary() -> String {
    "docker".to_owned()
}

/// How to reach the local image engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Daemon address (`DOCKER_HOST` syntax). `None` uses the CLI default.
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_binary")]
    pub binary: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: None,
            binary: default_binary(),
        }
    }
}

/// TCP hosts are spoken to directly over the Engine API; everything else
/// (unix sockets, ssh, no host) goes through the docker CLI.
pub fn connect(config: &EngineConfig) -> Box<dyn ImageEngine> {
    match config.host.as_deref() {
        Some(host)
            if host.starts_with("tcp://")
                || host.starts_with("http://")
                || host.starts_with("https://") =>
        {
            Box::new(DockerHttp::new(host))
        }
        host => Box::new(DockerCli::new(&config.binary, host)),
    }
}
