//! Staging engine.
//!
//! Staging starts as a full clone of the live tree, then the manifest files
//! are moved in from the extracted package. In overlay mode every other file
//! is preserved byte for byte; in mirror mode files the manifest does not
//! list are deleted afterwards.

use crate::config::StagingMode;
use crate::manifest::RelativePath;
use crate::update::retriever::ExtractedPackage;
use crate::utils::Filesystem;
use anyhow::{Context, Result, bail};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// What applying the package changed in staging.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    /// Manifest files moved into staging
    pub applied: Vec<RelativePath>,
    /// Manifest files absent from the package and left as they were
    pub skipped: Vec<RelativePath>,
    /// Unlisted files deleted in mirror mode
    pub removed: Vec<RelativePath>,
}

/// Builds the staging tree for one attempt.
pub struct StagingEngine<'a> {
    fs: &'a dyn Filesystem,
    slug: &'a str,
    mode: StagingMode,
}

impl<'a> StagingEngine<'a> {
    /// Engine for `slug` using `mode`.
    pub fn new(fs: &'a dyn Filesystem, slug: &'a str, mode: StagingMode) -> Self {
        Self {
            fs,
            slug,
            mode,
        }
    }

    /// Create `staging_dir` as a fresh clone of `live_root`.
    pub fn prepare(&self, live_root: &Path, staging_dir: &Path) -> Result<()> {
        if self.fs.exists(staging_dir) {
            bail!("Staging directory already exists: {}", staging_dir.display());
        }
        info!("[{}] Copying live tree to staging {}", self.slug, staging_dir.display());
        self.fs
            .copy_dir(live_root, staging_dir)
            .with_context(|| format!("Failed to clone {} into staging", live_root.display()))
    }

    /// Move the manifest files from the package into staging.
    ///
    /// Files missing from the package are skipped; whether that is acceptable
    /// is decided by the caller before this runs.
    pub fn apply(
        &self,
        staging_dir: &Path,
        package: &ExtractedPackage,
        files: &[RelativePath],
    ) -> Result<ApplyReport> {
        let mut report = ApplyReport::default();

        for file in files {
            let source = file.join_onto(&package.root);
            if !self.fs.exists(&source) || self.fs.is_dir(&source) {
                warn!("[{}] Skipping '{file}': not present in package", self.slug);
                report.skipped.push(file.clone());
                continue;
            }

            let dest = file.join_onto(staging_dir);
            if self.fs.is_dir(&dest) {
                bail!("Cannot replace directory {} with a file", dest.display());
            }
            self.fs
                .rename(&source, &dest)
                .with_context(|| format!("Failed to apply '{file}'"))?;
            debug!("[{}] Applied {file}", self.slug);
            report.applied.push(file.clone());
        }

        if self.mode == StagingMode::Mirror {
            report.removed = self.remove_unlisted(staging_dir, files)?;
        }

        info!(
            "[{}] Applied {} file(s), skipped {}, removed {}",
            self.slug,
            report.applied.len(),
            report.skipped.len(),
            report.removed.len()
        );
        Ok(report)
    }

    fn remove_unlisted(&self, staging_dir: &Path, files: &[RelativePath]) -> Result<Vec<RelativePath>> {
        let listed: HashSet<&RelativePath> = files.iter().collect();
        let mut removed = Vec::new();

        for relative in self.fs.list_files(staging_dir)? {
            let path = RelativePath::from_relative(&relative)
                .with_context(|| format!("Unexpected path in staging: {}", relative.display()))?;
            if listed.contains(&path) {
                continue;
            }
            self.fs
                .remove_dir_all(&staging_dir.join(&relative))
                .with_context(|| format!("Failed to remove unlisted file '{path}'"))?;
            debug!("[{}] Removed unlisted {path}", self.slug);
            removed.push(path);
        }

        self.fs.remove_empty_dirs(staging_dir)?;
        Ok(removed)
    }
}
