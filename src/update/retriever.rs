//! Package retrieval: download, verification, and extraction.
//!
//! The three steps are separate calls so the engine can report progress for
//! each. None of them touches the live tree; a failure here leaves at most the
//! attempt's temp directory behind, which the engine removes.

use crate::core::{Stage, UpdateError};
use crate::http::{HttpClient, validate_url};
use crate::manifest::{PackageSpec, RelativePath};
use crate::update::verification::ChecksumVerifier;
use crate::update::workspace::WorkingSet;
use crate::utils::Filesystem;
use anyhow::Context;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// An unpacked package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPackage {
    /// Directory the manifest paths are relative to
    pub root: PathBuf,
    /// Manifest paths with no file under `root`
    pub missing: Vec<RelativePath>,
}

/// Downloads, verifies, and unpacks the package named by a manifest.
pub struct PackageRetriever<'a, H> {
    http: &'a H,
    fs: &'a dyn Filesystem,
    allowed_hosts: &'a [String],
    timeout: Duration,
}

impl<'a, H: HttpClient> PackageRetriever<'a, H> {
    /// Create a retriever. `timeout` bounds the whole download.
    pub fn new(
        http: &'a H,
        fs: &'a dyn Filesystem,
        allowed_hosts: &'a [String],
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            fs,
            allowed_hosts,
            timeout,
        }
    }

    /// Download the package into the working set's temp directory.
    pub async fn download(&self, spec: &PackageSpec<'_>, set: &WorkingSet) -> Result<u64, UpdateError> {
        let url = validate_url(spec.url, self.allowed_hosts)?;
        info!("[{}] Downloading package from {url}", set.slug);

        let bytes = self.http.download_to(url.as_str(), &set.package_file, self.timeout).await?;
        debug!("[{}] Downloaded {bytes} bytes to {}", set.slug, set.package_file.display());
        Ok(bytes)
    }

    /// Verify the downloaded package. The file is deleted on mismatch.
    pub async fn verify(&self, spec: &PackageSpec<'_>, set: &WorkingSet) -> Result<(), UpdateError> {
        let result = ChecksumVerifier::verify_checksum(&set.package_file, spec.hash).await;
        if let Err(UpdateError::Integrity {
            ..
        }) = &result
        {
            warn!("[{}] Package digest mismatch, discarding download", set.slug);
            if let Err(e) = self.fs.remove_dir_all(&set.package_file) {
                warn!("[{}] Failed to delete rejected package: {e:#}", set.slug);
            }
        }
        result
    }

    /// Unpack the verified package into the working set's extract directory.
    pub async fn extract(
        &self,
        spec: &PackageSpec<'_>,
        set: &WorkingSet,
    ) -> Result<ExtractedPackage, UpdateError> {
        let archive = set.package_file.clone();
        let dest = set.extract_dir.clone();

        let extracted = tokio::task::spawn_blocking(move || unzip(&archive, &dest))
            .await
            .map_err(|e| UpdateError::Extraction {
                reason: format!("extraction task failed: {e}"),
            })??;
        info!("[{}] Extracted {extracted} entries", set.slug);

        let root = payload_root(self.fs, &set.extract_dir, spec.files);
        let missing: Vec<RelativePath> = spec
            .files
            .iter()
            .filter(|path| !is_file(self.fs, &path.join_onto(&root)))
            .cloned()
            .collect();

        for path in &missing {
            warn!("[{}] Manifest file '{path}' is not in the package", set.slug);
        }

        Ok(ExtractedPackage {
            root,
            missing,
        })
    }
}

fn is_file(fs: &dyn Filesystem, path: &Path) -> bool {
    fs.exists(path) && !fs.is_dir(path)
}

/// Pick the directory manifest paths resolve against.
///
/// Archives built by zipping a folder wrap the payload in one top-level
/// directory; that directory is used when more manifest paths resolve inside
/// it than at the extraction root.
fn payload_root(fs: &dyn Filesystem, extract_dir: &Path, files: &[RelativePath]) -> PathBuf {
    let found = |root: &Path| files.iter().filter(|p| is_file(fs, &p.join_onto(root))).count();

    let Ok(entries) = fs.list_dir(extract_dir) else {
        return extract_dir.to_path_buf();
    };
    if let [only] = entries.as_slice() {
        let nested = extract_dir.join(only);
        if fs.is_dir(&nested) && found(&nested) > found(extract_dir) {
            debug!("Using wrapped payload directory {}", nested.display());
            return nested;
        }
    }
    extract_dir.to_path_buf()
}

fn extraction_error(error: impl std::fmt::Display) -> UpdateError {
    UpdateError::Extraction {
        reason: error.to_string(),
    }
}

/// Unpack `archive` into `dest`, rejecting entries that would escape it.
fn unzip(archive: &Path, dest: &Path) -> Result<usize, UpdateError> {
    let file = File::open(archive)
        .with_context(|| format!("Failed to open package: {}", archive.display()))
        .map_err(|e| UpdateError::filesystem(Stage::Extracting, &e))?;
    let mut zip = zip::ZipArchive::new(file).map_err(extraction_error)?;

    std::fs::create_dir_all(dest)
        .with_context(|| format!("Failed to create directory: {}", dest.display()))
        .map_err(|e| UpdateError::filesystem(Stage::Extracting, &e))?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(extraction_error)?;
        let relative = entry.enclosed_name().ok_or_else(|| UpdateError::Extraction {
            reason: format!("archive entry '{}' escapes the extraction directory", entry.name()),
        })?;
        let out_path = dest.join(relative);

        let mut write = || -> anyhow::Result<()> {
            if entry.is_dir() {
                std::fs::create_dir_all(&out_path)
                    .with_context(|| format!("Failed to create {}", out_path.display()))?;
                return Ok(());
            }
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let mut outfile = File::create(&out_path)
                .with_context(|| format!("Failed to create {}", out_path.display()))?;
            io::copy(&mut entry, &mut outfile)
                .with_context(|| format!("Failed to unpack {}", out_path.display()))?;

            #[cfg(unix)]
            if let Some(mode) = entry.unix_mode() {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode & 0o777))
                    .with_context(|| format!("Failed to set permissions on {}", out_path.display()))?;
            }
            Ok(())
        };
        write().map_err(|e| UpdateError::Extraction {
            reason: format!("{e:#}"),
        })?;
    }

    Ok(zip.len())
}
