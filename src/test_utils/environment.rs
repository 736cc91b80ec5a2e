//! A complete update environment in a temporary directory.

use super::fixtures::{PackageBuilder, sha256_hex};
use super::http::FakeHttp;
use crate::config::UpdaterConfig;
use crate::constants::{BACKUP_DIR_NAME, DEFAULT_SIDECAR_FILE, STAGING_DIR_PREFIX, TEMP_DIR_NAME};
use crate::update::UpdateEngine;
use crate::update::progress::FileProgressStore;
use crate::utils::{Filesystem, LocalFs};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Manifest URL served by [`TargetFixture`].
pub const MANIFEST_URL: &str = "https://updates.example.com/theme/manifest.json";

/// Package URL served by [`TargetFixture`].
pub const PACKAGE_URL: &str = "https://updates.example.com/theme/package.zip";

/// A live tree, a work root and an in-memory update server.
///
/// The live tree of target `theme` starts as:
///
/// ```text
/// a.txt             OLD
/// keep.txt          KEEP
/// inc/helpers.php   <?php // helpers
/// .seamless-version {"display_version": ..., "internal_version": ...}
/// ```
///
/// Published packages always carry an updated `.seamless-version`, listed in
/// the manifest, so a successful update moves the oracle forward.
pub struct TargetFixture {
    temp: TempDir,
    /// Live root of the target
    pub root: PathBuf,
    /// Work root of the updater
    pub work_root: PathBuf,
    /// Server the engine talks to
    pub http: FakeHttp,
    /// Configuration used by [`Self::engine`]
    pub config: UpdaterConfig,
}

impl TargetFixture {
    /// Fixture with the live tree deployed at the given versions.
    pub fn new(display: &str, internal: &str) -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("site/themes/theme");
        let work_root = temp.path().join("work");

        std::fs::create_dir_all(root.join("inc")).unwrap();
        std::fs::write(root.join("a.txt"), "OLD").unwrap();
        std::fs::write(root.join("keep.txt"), "KEEP").unwrap();
        std::fs::write(root.join("inc/helpers.php"), "<?php // helpers").unwrap();
        std::fs::write(root.join(DEFAULT_SIDECAR_FILE), sidecar(display, internal)).unwrap();

        let mut config = UpdaterConfig::new("theme", &root, MANIFEST_URL);
        config.work_root = work_root.clone();
        config.allowed_hosts = vec!["updates.example.com".to_string()];

        Self {
            temp,
            root,
            work_root,
            http: FakeHttp::new(),
            config,
        }
    }

    /// Temporary directory holding everything.
    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Publish a package containing `files`, all listed in the manifest.
    pub fn publish(&self, display: &str, internal: &str, files: &[(&str, &str)]) {
        let listed: Vec<&str> = files.iter().map(|(name, _)| *name).collect();
        self.publish_with_files(display, internal, files, &listed);
    }

    /// Publish a package containing `package_files` with a manifest listing
    /// `manifest_files`.
    pub fn publish_with_files(
        &self,
        display: &str,
        internal: &str,
        package_files: &[(&str, &str)],
        manifest_files: &[&str],
    ) {
        let package = self.package(display, internal, package_files);
        let hash = format!("sha256:{}", sha256_hex(&package));
        self.publish_raw(display, internal, &hash, manifest_files, &package);
    }

    /// Publish a package whose manifest announces `hash` instead of the real digest.
    pub fn publish_with_hash(&self, display: &str, internal: &str, files: &[(&str, &str)], hash: &str) {
        let package = self.package(display, internal, files);
        let listed: Vec<&str> = files.iter().map(|(name, _)| *name).collect();
        self.publish_raw(display, internal, hash, &listed, &package);
    }

    /// Serve an arbitrary package body under a manifest listing `files`.
    pub fn publish_raw(&self, display: &str, internal: &str, hash: &str, files: &[&str], package: &[u8]) {
        let mut listed: Vec<&str> = files.to_vec();
        listed.push(DEFAULT_SIDECAR_FILE);
        let manifest = json!({
            "display_version": display,
            "internal_version": internal,
            "package_url": PACKAGE_URL,
            "package_hash": hash,
            "files": listed,
        });
        self.http.serve(MANIFEST_URL, 200, manifest.to_string().as_bytes());
        self.http.serve(PACKAGE_URL, 200, package);
    }

    fn package(&self, display: &str, internal: &str, files: &[(&str, &str)]) -> Vec<u8> {
        files
            .iter()
            .fold(PackageBuilder::new(), |builder, (name, content)| builder.file(name, content))
            .file(DEFAULT_SIDECAR_FILE, sidecar(display, internal))
            .build()
    }

    /// Engine over the local disk.
    pub fn engine(&self) -> UpdateEngine<FakeHttp> {
        self.engine_with_fs(Arc::new(LocalFs))
    }

    /// Engine over `fs`, with fast rollback retries.
    pub fn engine_with_fs(&self, fs: Arc<dyn Filesystem>) -> UpdateEngine<FakeHttp> {
        UpdateEngine::new(self.config.clone(), fs, self.http.clone())
            .with_rollback_retry_delay(Duration::from_millis(1))
    }

    /// File-backed progress store of the work root.
    pub fn progress_store(&self) -> FileProgressStore {
        FileProgressStore::new(Arc::new(LocalFs), &self.work_root)
    }

    /// Contents of a live file.
    pub fn read_live(&self, relative: &str) -> String {
        std::fs::read_to_string(self.root.join(relative)).unwrap()
    }

    /// Every file of the live tree with its bytes.
    pub fn live_snapshot(&self) -> BTreeMap<PathBuf, Vec<u8>> {
        snapshot(&self.root)
    }

    /// Backup directories of the target, sorted by name.
    pub fn backups(&self) -> Vec<PathBuf> {
        entries(&self.work_root.join(BACKUP_DIR_NAME), |_| true)
    }

    /// Staging directories left in the work root.
    pub fn staging_dirs(&self) -> Vec<PathBuf> {
        entries(&self.work_root, |name| name.starts_with(STAGING_DIR_PREFIX))
    }

    /// Per-attempt temp directories left in the work root.
    pub fn temp_dirs(&self) -> Vec<PathBuf> {
        entries(&self.work_root.join(TEMP_DIR_NAME), |_| true)
    }

    /// Write the configuration as TOML and return its path.
    pub fn write_config(&self) -> PathBuf {
        let path = self.temp.path().join("config.toml");
        std::fs::write(&path, toml::to_string_pretty(&self.config).unwrap()).unwrap();
        path
    }
}

fn sidecar(display: &str, internal: &str) -> String {
    json!({"display_version": display, "internal_version": internal}).to_string()
}

/// Every file below `root` with its bytes, keyed by relative path.
pub fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    LocalFs
        .list_files(root)
        .unwrap()
        .into_iter()
        .map(|relative| {
            let bytes = std::fs::read(root.join(&relative)).unwrap();
            (relative, bytes)
        })
        .collect()
}

fn entries(dir: &Path, keep: impl Fn(&str) -> bool) -> Vec<PathBuf> {
    let Ok(read) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = read
        .filter_map(Result::ok)
        .filter(|entry| keep(&entry.file_name().to_string_lossy()))
        .map(|entry| entry.path())
        .collect();
    paths.sort();
    paths
}
