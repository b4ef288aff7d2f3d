use crate::{ArchiverConfig, CoreError};
use skiff_engine::{EngineError, ImageEngine};
use std::fs;
use std::io;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use tracing::{debug, info};

/// Outcome of [`send_tar`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    /// Whether an archive was streamed into the engine at all.
    pub sent: bool,
    /// Exit code of the archiver, when it ran and exited normally.
    pub archiver_status: Option<i32>,
}

/// True when `path` does not exist or is a directory with no entries.
pub fn dir_not_exist_or_empty(path: &Path) -> io::Result<bool> {
    match fs::read_dir(path) {
        Ok(mut entries) => Ok(entries.next().is_none()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(e),
    }
}

/// Stream the staging tree at `root` into the engine as a tar archive.
///
/// The archiver writes into a pipe that the engine import reads from directly;
/// nothing is buffered on disk. The archiver is always waited for, also when
/// the import fails halfway.
pub fn send_tar(
    engine: &dyn ImageEngine,
    archiver: &ArchiverConfig,
    root: &Path,
) -> Result<TransferReport, CoreError> {
    if dir_not_exist_or_empty(root)? {
        info!("nothing to import from {}", root.display());
        return Ok(TransferReport::default());
    }

    debug!(
        "{} {} in {}",
        archiver.program,
        archiver.args.join(" "),
        root.display()
    );
    let mut child = Command::new(&archiver.program)
        .args(&archiver.args)
        .current_dir(root)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .spawn()
        .map_err(|e| CoreError::Archiver(format!("failed to start {}: {e}", archiver.program)))?;

    // The read end is dropped at the end of this match, before `wait`, so an
    // archiver blocked on a full pipe gets EPIPE instead of hanging.
    let ingest = match child.stdout.take() {
        Some(mut stdout) => engine.import_archive(&mut stdout),
        None => Err(EngineError::Io(io::Error::other(
            "archiver stdout was not captured",
        ))),
    };

    let status = settle(&archiver.program, ingest, child.wait())?;
    debug!("{} finished with {status}", archiver.program);
    info!("imported {} into {}", root.display(), engine.describe());
    Ok(TransferReport {
        sent: true,
        archiver_status: status.code(),
    })
}

/// Combine the import result with the archiver's exit. An import failure
/// always wins, carrying whatever is known about the archiver alongside it.
fn settle(
    program: &str,
    ingest: Result<(), EngineError>,
    waited: io::Result<ExitStatus>,
) -> Result<ExitStatus, CoreError> {
    match (ingest, waited) {
        (Err(e), waited) => Err(CoreError::Stream {
            ingest: e.to_string(),
            archiver: match waited {
                Ok(status) => status.to_string(),
                Err(wait_err) => format!("failed to wait for {program}: {wait_err}"),
            },
        }),
        (Ok(()), Err(e)) => Err(CoreError::Archiver(format!(
            "failed to wait for {program}: {e}"
        ))),
        (Ok(()), Ok(status)) if !status.success() => {
            Err(CoreError::Archiver(format!("{program} {status}")))
        }
        (Ok(()), Ok(status)) => Ok(status),
    }
}
