//! File system access for the update stages.
//!
//! Every stage touches the disk through the [`Filesystem`] trait instead of
//! calling `std::fs` directly. Production code passes [`LocalFs`]; tests swap
//! in a fault-injecting wrapper to exercise rollback paths that a real disk
//! would rarely produce.
//!
//! # Examples
//!
//! ```rust,no_run
//! use seamless_update::utils::fs::{Filesystem, LocalFs};
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let fs = LocalFs;
//! fs.create_dir_all(Path::new("work/backups"))?;
//! fs.copy_dir(Path::new("site/theme"), Path::new("work/backups/theme-1700000000000"))?;
//! # Ok(())
//! # }
//! ```

pub mod atomic;
pub mod dirs;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub use atomic::atomic_write;
pub use dirs::{
    copy_dir, ensure_dir, ensure_parent_dir, list_files, move_path, remove_dir_all,
    remove_empty_dirs,
};

/// Blocking filesystem operations used by the update engine.
///
/// Implementations must be usable behind `Arc<dyn Filesystem>`. Removal
/// operations treat a missing path as success.
pub trait Filesystem: Send + Sync + std::fmt::Debug {
    /// Whether anything exists at `path` (a dangling symlink counts).
    fn exists(&self, path: &Path) -> bool;

    /// Whether `path` is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Create `path` and all missing parents.
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Recursively copy the directory `src` into `dst`.
    fn copy_dir(&self, src: &Path, dst: &Path) -> Result<()>;

    /// Recursively delete a directory, or delete a single file or link.
    fn remove_dir_all(&self, path: &Path) -> Result<()>;

    /// Move a file or directory. Atomic within one volume.
    fn rename(&self, src: &Path, dst: &Path) -> Result<()>;

    /// Names of the direct children of a directory, sorted.
    fn list_dir(&self, path: &Path) -> Result<Vec<String>>;

    /// Every file below `root`, relative to `root`, sorted.
    fn list_files(&self, root: &Path) -> Result<Vec<PathBuf>>;

    /// Remove directories below `root` that contain no files.
    fn remove_empty_dirs(&self, root: &Path) -> Result<usize>;

    /// Read a whole file.
    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Atomically replace the contents of a file.
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;
}

/// [`Filesystem`] backed by the local disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl Filesystem for LocalFs {
    fn exists(&self, path: &Path) -> bool {
        path.symlink_metadata().is_ok()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        ensure_dir(path)
    }

    fn copy_dir(&self, src: &Path, dst: &Path) -> Result<()> {
        copy_dir(src, dst)
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        remove_dir_all(path)
    }

    fn rename(&self, src: &Path, dst: &Path) -> Result<()> {
        move_path(src, dst)
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(path)
            .with_context(|| format!("Failed to read directory: {}", path.display()))?
        {
            let entry =
                entry.with_context(|| format!("Failed to read entry in: {}", path.display()))?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn list_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        list_files(root)
    }

    fn remove_empty_dirs(&self, root: &Path) -> Result<usize> {
        remove_empty_dirs(root)
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        atomic_write(path, contents)
    }
}
