//! Fault-injecting [`Filesystem`].

use crate::utils::{Filesystem, LocalFs};
use anyhow::{Result, bail};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Mutating operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsOp {
    /// [`Filesystem::create_dir_all`]
    CreateDirAll,
    /// [`Filesystem::copy_dir`]
    CopyDir,
    /// [`Filesystem::remove_dir_all`]
    RemoveDirAll,
    /// [`Filesystem::rename`]
    Rename,
    /// [`Filesystem::write`]
    Write,
}

/// [`LocalFs`] that fails chosen operations.
///
/// A fault matches when the operation's first path has a component starting
/// with the given fragment, so `fail_on(FsOp::Rename, "staging-")` fails the
/// switch but not the moves of package files into staging.
#[derive(Debug, Default)]
pub struct FaultyFs {
    inner: LocalFs,
    faults: Vec<(FsOp, String)>,
    calls: Mutex<HashMap<FsOp, usize>>,
}

impl FaultyFs {
    /// Wrapper with no faults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail `op` on paths with a component starting with `fragment`.
    #[must_use]
    pub fn fail_on(mut self, op: FsOp, fragment: &str) -> Self {
        self.faults.push((op, fragment.to_string()));
        self
    }

    /// How often `op` was called, failed calls included.
    pub fn calls(&self, op: FsOp) -> usize {
        self.calls.lock().unwrap().get(&op).copied().unwrap_or(0)
    }

    fn check(&self, op: FsOp, path: &Path) -> Result<()> {
        *self.calls.lock().unwrap().entry(op).or_default() += 1;

        let hit = self.faults.iter().any(|(fault_op, fragment)| {
            *fault_op == op
                && path
                    .components()
                    .any(|c| c.as_os_str().to_string_lossy().starts_with(fragment.as_str()))
        });
        if hit {
            bail!("injected {op:?} failure at {}", path.display());
        }
        Ok(())
    }
}

impl Filesystem for FaultyFs {
    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.inner.is_dir(path)
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.check(FsOp::CreateDirAll, path)?;
        self.inner.create_dir_all(path)
    }

    fn copy_dir(&self, src: &Path, dst: &Path) -> Result<()> {
        self.check(FsOp::CopyDir, src)?;
        self.inner.copy_dir(src, dst)
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        self.check(FsOp::RemoveDirAll, path)?;
        self.inner.remove_dir_all(path)
    }

    fn rename(&self, src: &Path, dst: &Path) -> Result<()> {
        self.check(FsOp::Rename, src)?;
        self.inner.rename(src, dst)
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>> {
        self.inner.list_dir(path)
    }

    fn list_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        self.inner.list_files(root)
    }

    fn remove_empty_dirs(&self, root: &Path) -> Result<usize> {
        self.inner.remove_empty_dirs(root)
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.inner.read(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.check(FsOp::Write, path)?;
        self.inner.write(path, contents)
    }
}
