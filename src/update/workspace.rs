//! Per-attempt working directories and their garbage collection.
//!
//! Layout below the work root:
//!
//! ```text
//! <work_root>/tmp/<slug>-<ts>/package.zip
//! <work_root>/tmp/<slug>-<ts>/extracted/...
//! <work_root>/backups/<slug>-<ts>/...
//! <work_root>/staging-<slug>-<ts>/...
//! <work_root>/status/<slug>.json
//! ```
//!
//! `<ts>` is a Unix timestamp in milliseconds. All directories of one attempt
//! share the same timestamp.

use crate::constants::{
    BACKUP_DIR_NAME, EXTRACT_DIR_NAME, PACKAGE_FILE_NAME, STAGING_DIR_PREFIX, STATUS_DIR_NAME,
    TEMP_DIR_NAME,
};
use crate::utils::Filesystem;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Paths below the configured work root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkRoot {
    root: PathBuf,
}

impl WorkRoot {
    /// Wrap a work root path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
        }
    }

    /// The work root itself.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Parent of per-attempt temp directories.
    #[must_use]
    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join(TEMP_DIR_NAME)
    }

    /// Parent of backups.
    #[must_use]
    pub fn backups_dir(&self) -> PathBuf {
        self.root.join(BACKUP_DIR_NAME)
    }

    /// Directory of progress and status records.
    #[must_use]
    pub fn status_dir(&self) -> PathBuf {
        self.root.join(STATUS_DIR_NAME)
    }

    /// Staging directory for an attempt.
    #[must_use]
    pub fn staging_dir(&self, slug: &str, timestamp: i64) -> PathBuf {
        self.root.join(format!("{STAGING_DIR_PREFIX}{slug}-{timestamp}"))
    }
}

/// Parse the trailing timestamp of a `<prefix><slug>-<ts>` directory name.
///
/// Returns `None` when the name does not belong to `slug` at all, and
/// `Some(None)` when it belongs to `slug` but the timestamp overflows.
/// A name belongs to `slug` only when everything after `<prefix><slug>-` is
/// ASCII digits, which keeps `theme-2-…` and `theme-child-…` apart from
/// `theme-…`.
#[must_use]
pub fn parse_timestamp(name: &str, prefix: &str, slug: &str) -> Option<Option<i64>> {
    let rest = name.strip_prefix(prefix)?.strip_prefix(slug)?.strip_prefix('-')?;
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(rest.parse::<i64>().ok())
}

/// Directories used by one update attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingSet {
    /// Target slug
    pub slug: String,
    /// Shared timestamp (Unix milliseconds)
    pub timestamp: i64,
    /// Scratch directory of this attempt
    pub temp_dir: PathBuf,
    /// Downloaded archive inside `temp_dir`
    pub package_file: PathBuf,
    /// Unpacked payload inside `temp_dir`
    pub extract_dir: PathBuf,
    /// Staging copy of the live tree
    pub staging_dir: PathBuf,
    /// Where this attempt's backup goes, if one is taken
    pub backup_dir: PathBuf,
}

impl WorkingSet {
    fn at(work_root: &WorkRoot, slug: &str, timestamp: i64) -> Self {
        let temp_dir = work_root.tmp_dir().join(format!("{slug}-{timestamp}"));
        Self {
            slug: slug.to_string(),
            timestamp,
            package_file: temp_dir.join(PACKAGE_FILE_NAME),
            extract_dir: temp_dir.join(EXTRACT_DIR_NAME),
            staging_dir: work_root.staging_dir(slug, timestamp),
            backup_dir: work_root.backups_dir().join(format!("{slug}-{timestamp}")),
            temp_dir,
        }
    }

    /// Pick a timestamp no directory of this slug uses yet and create the
    /// temp directory.
    ///
    /// Starts from `now_ms` and bumps by one millisecond per collision.
    pub fn allocate(
        fs: &dyn Filesystem,
        work_root: &WorkRoot,
        slug: &str,
        now_ms: i64,
    ) -> Result<Self> {
        let mut timestamp = now_ms;
        let set = loop {
            let candidate = Self::at(work_root, slug, timestamp);
            if candidate.is_free(fs) {
                break candidate;
            }
            debug!("Working set timestamp {timestamp} for {slug} already in use");
            timestamp += 1;
        };

        fs.create_dir_all(&set.temp_dir)?;
        Ok(set)
    }

    fn is_free(&self, fs: &dyn Filesystem) -> bool {
        !fs.exists(&self.temp_dir) && !fs.exists(&self.staging_dir) && !fs.exists(&self.backup_dir)
    }

    /// Remove the temp and staging directories. Failures are logged and
    /// returned, never raised.
    pub fn cleanup(&self, fs: &dyn Filesystem) -> Vec<String> {
        let mut failures = Vec::new();
        for dir in [&self.staging_dir, &self.temp_dir] {
            if let Err(e) = fs.remove_dir_all(dir) {
                warn!("[{}] Failed to remove {}: {e:#}", self.slug, dir.display());
                failures.push(format!("{e:#}"));
            }
        }
        failures
    }
}

/// Result of an orphan collection pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OrphanReport {
    /// Directories removed
    pub removed: Vec<PathBuf>,
    /// Directories that could not be removed
    pub failed: Vec<PathBuf>,
}

/// Remove leftover temp and staging directories of `slug` that are older than
/// `max_age` or carry an unparseable timestamp.
///
/// Backups are never touched here.
pub fn collect_orphans(
    fs: &dyn Filesystem,
    work_root: &WorkRoot,
    slug: &str,
    max_age: Duration,
    now_ms: i64,
) -> OrphanReport {
    let mut report = OrphanReport::default();
    let max_age_ms = i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX);

    let candidates = [(work_root.tmp_dir(), ""), (work_root.path().to_path_buf(), STAGING_DIR_PREFIX)];
    for (parent, prefix) in candidates {
        if !fs.is_dir(&parent) {
            continue;
        }
        let names = match fs.list_dir(&parent) {
            Ok(names) => names,
            Err(e) => {
                warn!("Failed to list {}: {e:#}", parent.display());
                continue;
            }
        };

        for name in names {
            let Some(timestamp) = parse_timestamp(&name, prefix, slug) else {
                continue;
            };
            let stale = timestamp.is_none_or(|ts| now_ms.saturating_sub(ts) > max_age_ms);
            if !stale {
                continue;
            }

            let path = parent.join(&name);
            match fs.remove_dir_all(&path) {
                Ok(()) => {
                    info!("Removed orphaned working directory {}", path.display());
                    report.removed.push(path);
                }
                Err(e) => {
                    warn!("Failed to remove orphaned directory {}: {e:#}", path.display());
                    report.failed.push(path);
                }
            }
        }
    }

    report
}
