use crate::{EngineError, EngineImage, ImageEngine};
use std::io::{self, Read, Write};
use std::process::{Command, Stdio};

/// Drives a local Docker daemon through the `docker` command line.
pub struct DockerCli {
    binary: String,
    host: Option<String>,
}

impl DockerCli {
    pub fn new(binary: &str, host: Option<&str>) -> Self {
        Self {
            binary: binary.to_owned(),
            host: host.map(str::to_owned),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        if let Some(host) = &self.host {
            cmd.args(["--host", host]);
        }
        cmd
    }

    fn spawn_error(&self, e: io::Error) -> EngineError {
        if e.kind() == io::ErrorKind::NotFound {
            EngineError::Unavailable(self.binary.clone())
        } else {
            EngineError::Io(e)
        }
    }

    fn is_missing_image(stderr: &str) -> bool {
        let msg = stderr.to_lowercase();
        msg.contains("no such image") || msg.contains("no such object")
    }
}

impl ImageEngine for DockerCli {
    fn describe(&self) -> String {
        match &self.host {
            Some(host) => format!("{} (host {host})", self.binary),
            None => self.binary.clone(),
        }
    }

    fn inspect_image(&self, id: &str) -> Result<EngineImage, EngineError> {
        tracing::debug!("{} image inspect {id}", self.binary);
        let output = self
            .command()
            .args(["image", "inspect", id])
            .output()
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if Self::is_missing_image(&stderr) {
                return Err(EngineError::NoSuchImage(id.to_owned()));
            }
            return Err(EngineError::CommandFailed(format!(
                "{} image inspect {id}: {}",
                self.binary,
                stderr.trim()
            )));
        }

        let images: Vec<EngineImage> = serde_json::from_slice(&output.stdout).map_err(|e| {
            EngineError::Serialization(format!("failed to parse inspect output for {id}: {e}"))
        })?;
        images
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::NoSuchImage(id.to_owned()))
    }

    fn import_archive(&self, archive: &mut dyn Read) -> Result<(), EngineError> {
        tracing::debug!("{} load", self.binary);
        let mut child = self
            .command()
            .arg("load")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let copied = match child.stdin.take() {
            Some(mut stdin) => io::copy(archive, &mut stdin),
            None => Err(io::Error::other("load stdin was not captured")),
        };
        let output = child.wait_with_output()?;

        if !output.status.success() {
            return Err(EngineError::CommandFailed(format!(
                "{} load exited with {}: {}",
                self.binary,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let copied = copied?;
        tracing::debug!("{} load accepted {copied} bytes", self.binary);
        Ok(())
    }

    fn export_image(&self, name: &str, out: &mut dyn Write) -> Result<(), EngineError> {
        tracing::debug!("{} save {name}", self.binary);
        let mut child = self
            .command()
            .args(["save", name])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let copied = match child.stdout.take() {
            Some(mut stdout) => io::copy(&mut stdout, out),
            None => Err(io::Error::other("save stdout was not captured")),
        };
        let output = child.wait_with_output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if Self::is_missing_image(&stderr) {
                return Err(EngineError::NoSuchImage(name.to_owned()));
            }
            return Err(EngineError::CommandFailed(format!(
                "{} save {name}: {}",
                self.binary,
                stderr.trim()
            )));
        }
        copied?;
        Ok(())
    }
}
