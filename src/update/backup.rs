//! Backup creation and retention for the live tree.
//!
//! Backups are full recursive copies stored as
//! `<work_root>/backups/<slug>-<ts>`. A backup taken before staging is the
//! only recovery data the rollback controller has, so a failed copy aborts
//! the attempt before anything live is modified.

use crate::update::workspace::parse_timestamp;
use crate::utils::Filesystem;
use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One retained backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupInfo {
    /// Backup directory
    pub path: PathBuf,
    /// Embedded timestamp (Unix milliseconds)
    pub timestamp: i64,
}

/// Outcome of a retention pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PruneReport {
    /// Backups deleted
    pub removed: Vec<PathBuf>,
    /// Backups that could not be deleted
    pub failed: Vec<PathBuf>,
}

/// Manages the backups of one target.
pub struct BackupManager<'a> {
    fs: &'a dyn Filesystem,
    backups_dir: PathBuf,
    slug: &'a str,
}

impl<'a> BackupManager<'a> {
    /// Manager for `slug` backups below `backups_dir`.
    pub fn new(fs: &'a dyn Filesystem, backups_dir: PathBuf, slug: &'a str) -> Self {
        Self {
            fs,
            backups_dir,
            slug,
        }
    }

    /// Copy `live_root` into `dest`.
    ///
    /// A partially written backup is removed before the error is returned.
    pub fn create_backup(&self, live_root: &Path, dest: &Path) -> Result<PathBuf> {
        if !self.fs.is_dir(live_root) {
            bail!("Live root does not exist: {}", live_root.display());
        }
        if self.fs.exists(dest) {
            bail!("Backup directory already exists: {}", dest.display());
        }

        self.fs.create_dir_all(&self.backups_dir)?;

        info!("[{}] Creating backup at {}", self.slug, dest.display());
        if let Err(e) = self.fs.copy_dir(live_root, dest) {
            if let Err(cleanup) = self.fs.remove_dir_all(dest) {
                warn!("[{}] Failed to remove partial backup: {cleanup:#}", self.slug);
            }
            return Err(e).with_context(|| {
                format!("Failed to back up {} to {}", live_root.display(), dest.display())
            });
        }

        info!("[{}] Backup created successfully", self.slug);
        Ok(dest.to_path_buf())
    }

    /// Backups of this target, newest first.
    ///
    /// Directories whose timestamp does not parse are ignored.
    pub fn list_backups(&self) -> Result<Vec<BackupInfo>> {
        if !self.fs.is_dir(&self.backups_dir) {
            return Ok(Vec::new());
        }

        let mut backups: Vec<BackupInfo> = self
            .fs
            .list_dir(&self.backups_dir)?
            .into_iter()
            .filter_map(|name| {
                let timestamp = parse_timestamp(&name, "", self.slug)??;
                Some(BackupInfo {
                    path: self.backups_dir.join(&name),
                    timestamp,
                })
            })
            .filter(|backup| self.fs.is_dir(&backup.path))
            .collect();

        backups.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(backups)
    }

    /// Delete all but the `keep` newest backups.
    ///
    /// Deletion failures are logged and reported, never raised.
    pub fn prune(&self, keep: usize) -> PruneReport {
        let mut report = PruneReport::default();
        let backups = match self.list_backups() {
            Ok(backups) => backups,
            Err(e) => {
                warn!("[{}] Failed to list backups for pruning: {e:#}", self.slug);
                return report;
            }
        };

        for backup in backups.into_iter().skip(keep) {
            debug!("[{}] Pruning backup {}", self.slug, backup.path.display());
            match self.fs.remove_dir_all(&backup.path) {
                Ok(()) => report.removed.push(backup.path),
                Err(e) => {
                    warn!("[{}] Failed to prune backup {}: {e:#}", self.slug, backup.path.display());
                    report.failed.push(backup.path);
                }
            }
        }

        if !report.removed.is_empty() {
            info!("[{}] Pruned {} old backup(s)", self.slug, report.removed.len());
        }
        report
    }
}
