//! Test fixtures for packages, version oracles and progress stores.

use crate::core::OracleError;
use crate::update::oracle::CurrentVersionProvider;
use crate::update::progress::{ProgressRecord, ProgressStore};
use anyhow::Result;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::Mutex;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Builds a zip package in memory.
///
/// Entry names are written verbatim, so escaping names such as
/// `../evil.txt` can be produced for negative tests.
#[derive(Debug, Clone, Default)]
pub struct PackageBuilder {
    files: Vec<(String, Vec<u8>)>,
    dirs: Vec<String>,
}

impl PackageBuilder {
    /// Empty package.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file entry.
    pub fn file(mut self, name: &str, content: impl AsRef<[u8]>) -> Self {
        self.files.push((name.to_string(), content.as_ref().to_vec()));
        self
    }

    /// Add an explicit directory entry.
    pub fn dir(mut self, name: &str) -> Self {
        self.dirs.push(name.to_string());
        self
    }

    /// The archive bytes.
    pub fn build(self) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for dir in &self.dirs {
            writer.add_directory(dir.as_str(), options).unwrap();
        }
        for (name, content) in &self.files {
            writer.start_file(name.as_str(), options).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }
}

/// Version oracle returning fixed versions.
#[derive(Debug, Clone)]
pub struct StaticVersions {
    display: String,
    internal: String,
    active: bool,
}

impl StaticVersions {
    /// Active target with the given versions.
    pub fn new(display: &str, internal: &str) -> Self {
        Self {
            display: display.to_string(),
            internal: internal.to_string(),
            active: true,
        }
    }

    /// Target that reports itself inactive.
    pub fn inactive() -> Self {
        Self {
            active: false,
            ..Self::new("0", "0")
        }
    }
}

impl CurrentVersionProvider for StaticVersions {
    fn is_target_active(&self) -> bool {
        self.active
    }

    fn read_display_version(&self) -> Result<String, OracleError> {
        Ok(self.display.clone())
    }

    fn read_internal_version(&self) -> Result<String, OracleError> {
        Ok(self.internal.clone())
    }
}

#[derive(Debug, Default)]
struct Recorded {
    history: HashMap<String, Vec<ProgressRecord>>,
    statuses: HashMap<String, String>,
}

/// In-memory [`ProgressStore`] that keeps every record written.
#[derive(Debug, Default)]
pub struct RecordingProgressStore {
    inner: Mutex<Recorded>,
}

impl RecordingProgressStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record saved for `slug`, oldest first.
    pub fn history(&self, slug: &str) -> Vec<ProgressRecord> {
        self.inner.lock().unwrap().history.get(slug).cloned().unwrap_or_default()
    }
}

impl ProgressStore for RecordingProgressStore {
    fn load(&self, slug: &str) -> Result<Option<ProgressRecord>> {
        Ok(self.inner.lock().unwrap().history.get(slug).and_then(|h| h.last().cloned()))
    }

    fn save(&self, slug: &str, record: &ProgressRecord) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .history
            .entry(slug.to_string())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    fn load_status(&self, slug: &str) -> Result<Option<String>> {
        Ok(self.inner.lock().unwrap().statuses.get(slug).cloned())
    }

    fn save_status(&self, slug: &str, status: &str) -> Result<()> {
        self.inner.lock().unwrap().statuses.insert(slug.to_string(), status.to_string());
        Ok(())
    }

    fn clear(&self, slug: &str) -> Result<()> {
        self.inner.lock().unwrap().history.remove(slug);
        Ok(())
    }
}
