//! Atomic file write operations using temp-and-rename strategy.
//!
//! Progress records and the configuration file are written through here so a
//! poller never observes a half-written document.

use crate::utils::fs::dirs::ensure_dir;
use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Atomically writes bytes to a file using a write-then-rename strategy.
///
/// 1. Writes content to a sibling temporary file (`<name>.tmp`)
/// 2. Syncs the temporary file to disk
/// 3. Renames the temporary file over the target path
///
/// Parent directories are created when missing.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        ensure_dir(parent)?;
    }

    let file_name = path
        .file_name()
        .with_context(|| format!("Not a file path: {}", path.display()))?;
    let mut temp_name = file_name.to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    {
        let mut file = fs::File::create(&temp_path).with_context(|| {
            format!(
                "Failed to create temp file: {}\n\nCheck file permissions and that directory exists",
                temp_path.display()
            )
        })?;

        file.write_all(content)
            .with_context(|| format!("Failed to write to temp file: {}", temp_path.display()))?;

        file.sync_all().with_context(|| "Failed to sync file to disk")?;
    }

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename temp file to: {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_atomic_write_basic() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("test.txt");

        atomic_write(&file, b"test content").unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "test content");
    }

    #[test]
    fn test_atomic_write_overwrites() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("test.txt");

        atomic_write(&file, b"initial").unwrap();
        atomic_write(&file, b"updated").unwrap();

        assert_eq!(fs::read_to_string(&file).unwrap(), "updated");
        assert!(!temp.path().join("test.txt.tmp").exists());
    }

    #[test]
    fn test_temp_names_differ_per_file_name() {
        let temp = tempdir().unwrap();
        let record = temp.path().join("theme.json");
        let status = temp.path().join("theme.status");

        // a leftover temp file of one document must not clobber the other
        fs::write(temp.path().join("theme.json.tmp"), "stale").unwrap();
        atomic_write(&status, b"Update in progress").unwrap();
        atomic_write(&record, b"{}").unwrap();

        assert_eq!(fs::read_to_string(&status).unwrap(), "Update in progress");
        assert_eq!(fs::read_to_string(&record).unwrap(), "{}");
        assert!(!temp.path().join("theme.tmp").exists());
        assert!(!temp.path().join("theme.status.tmp").exists());
    }

    #[test]
    fn test_atomic_write_creates_parent() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("status").join("deep").join("progress.json");

        atomic_write(&file, b"{}").unwrap();
        assert!(file.exists());
    }
}
