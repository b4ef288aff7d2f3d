use crate::{EngineError, EngineImage, ImageEngine};
use std::collections::HashSet;
use std::io::{Read, Write};
use std::sync::Mutex;

/// In-memory engine for tests: a set of present image ids plus a record of
/// every inspect call and every imported archive.
#[derive(Default)]
pub struct MockEngine {
    present: Mutex<HashSet<String>>,
    inspected: Mutex<Vec<String>>,
    imports: Mutex<Vec<Vec<u8>>>,
    export_data: Vec<u8>,
    inspect_failure: Option<String>,
    reject_import_after: Option<usize>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_image(self, id: &str) -> Self {
        self.add_image(id);
        self
    }

    /// Every inspect call fails with a non-not-found error.
    #[must_use]
    pub fn with_inspect_failure(mut self, msg: &str) -> Self {
        self.inspect_failure = Some(msg.to_owned());
        self
    }

    /// Imports fail once more than `bytes` bytes have been read from the stream.
    #[must_use]
    pub fn rejecting_import_after(mut self, bytes: usize) -> Self {
        self.reject_import_after = Some(bytes);
        self
    }

    /// Bytes written by `export_image`.
    #[must_use]
    pub fn with_export_data(mut self, data: Vec<u8>) -> Self {
        self.export_data = data;
        self
    }

    pub fn add_image(&self, id: &str) {
        if let Ok(mut present) = self.present.lock() {
            present.insert(id.to_owned());
        }
    }

    pub fn inspected(&self) -> Vec<String> {
        self.inspected.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn imports(&self) -> Vec<Vec<u8>> {
        self.imports.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl ImageEngine for MockEngine {
    fn describe(&self) -> String {
        "mock engine".to_owned()
    }

    fn inspect_image(&self, id: &str) -> Result<EngineImage, EngineError> {
        self.inspected
            .lock()
            .map_err(|e| EngineError::CommandFailed(format!("mutex poisoned: {e}")))?
            .push(id.to_owned());

        if let Some(msg) = &self.inspect_failure {
            return Err(EngineError::CommandFailed(msg.clone()));
        }

        let present = self
            .present
            .lock()
            .map_err(|e| EngineError::CommandFailed(format!("mutex poisoned: {e}")))?;
        if present.contains(id) {
            Ok(EngineImage {
                id: id.to_owned(),
                ..EngineImage::default()
            })
        } else {
            Err(EngineError::NoSuchImage(id.to_owned()))
        }
    }

    fn import_archive(&self, archive: &mut dyn Read) -> Result<(), EngineError> {
        let mut data = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = archive.read(&mut buf)?;
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);
            if let Some(limit) = self.reject_import_after {
                if data.len() > limit {
                    return Err(EngineError::CommandFailed(format!(
                        "import rejected after {} bytes",
                        data.len()
                    )));
                }
            }
        }
        self.imports
            .lock()
            .map_err(|e| EngineError::CommandFailed(format!("mutex poisoned: {e}")))?
            .push(data);
        Ok(())
    }

    fn export_image(&self, name: &str, out: &mut dyn Write) -> Result<(), EngineError> {
        if self.export_data.is_empty() {
            return Err(EngineError::NoSuchImage(name.to_owned()));
        }
        out.write_all(&self.export_data)?;
        Ok(())
    }
}
