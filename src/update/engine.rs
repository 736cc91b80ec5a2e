//! Update orchestration.
//!
//! [`UpdateEngine::perform_update`] runs one attempt through the stages of
//! [`Stage`] in order:
//!
//! ```text
//! CheckingManifest -> Downloading -> Verifying -> Extracting
//!   -> BackingUp -> Staging -> Applying -> Switching -> Finalizing
//! ```
//!
//! Failures before `BackingUp` abort with nothing to undo beyond the temp
//! directory. Failures from `BackingUp` onward go through the
//! [`RollbackController`]. Every attempt ends with a terminal progress record.

use crate::config::UpdaterConfig;
use crate::core::{Stage, UpdateError};
use crate::http::HttpClient;
use crate::manifest::{PackageSpec, UpdateManifest};
use crate::update::backup::BackupManager;
use crate::update::comparator::{Decision, decide};
use crate::update::fetcher::ManifestFetcher;
use crate::update::oracle::{CurrentVersionProvider, LocalVersions, provider_from_config};
use crate::update::progress::{FileProgressStore, ProgressReporter, ProgressStore};
use crate::update::retriever::{ExtractedPackage, PackageRetriever};
use crate::update::rollback::{RollbackController, RollbackStatus};
use crate::update::staging::StagingEngine;
use crate::update::switch::switch_live;
use crate::update::workspace::{WorkRoot, WorkingSet, collect_orphans};
use crate::utils::Filesystem;
use chrono::Utc;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How an attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The comparator found nothing to apply.
    Skipped(Decision),
    /// Failed before the live tree was touched.
    Aborted(UpdateError),
    /// The package was applied.
    Updated {
        /// Internal version now deployed
        internal_version: String,
        /// Backup taken before the switch, if backups are enabled
        backup: Option<PathBuf>,
    },
    /// Failed after backing up; the rollback controller ran.
    RolledBack {
        /// The failure that triggered the rollback
        cause: UpdateError,
        /// What the rollback achieved
        status: RollbackStatus,
    },
}

impl UpdateOutcome {
    /// Whether the attempt ended without an error.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Skipped(_) | Self::Updated { .. })
    }

    /// Whether the live tree may be damaged.
    #[must_use]
    pub const fn is_critical(&self) -> bool {
        matches!(
            self,
            Self::RolledBack {
                status: RollbackStatus::CriticalManualInterventionRequired,
                ..
            }
        )
    }
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped(decision) => write!(f, "{decision}"),
            Self::Aborted(error) => write!(f, "{error}"),
            Self::Updated {
                internal_version,
                ..
            } => write!(f, "Updated to internal version {internal_version}"),
            Self::RolledBack {
                cause,
                status,
            } => write!(f, "{cause}. Rollback: {status}"),
        }
    }
}

/// Runs update attempts for the configured target.
pub struct UpdateEngine<H> {
    config: UpdaterConfig,
    fs: Arc<dyn Filesystem>,
    http: H,
    oracle: Box<dyn CurrentVersionProvider>,
    progress: Arc<dyn ProgressStore>,
    rollback_retry_delay: Duration,
}

impl<H: HttpClient> UpdateEngine<H> {
    /// Engine with the configured version oracle and a file-backed progress store.
    pub fn new(config: UpdaterConfig, fs: Arc<dyn Filesystem>, http: H) -> Self {
        let oracle = provider_from_config(&config, Arc::clone(&fs));
        let progress = Arc::new(FileProgressStore::new(Arc::clone(&fs), &config.work_root));
        Self {
            config,
            fs,
            http,
            oracle,
            progress,
            rollback_retry_delay: Duration::from_secs(1),
        }
    }

    /// Replace the version oracle.
    #[must_use]
    pub fn with_oracle(mut self, oracle: Box<dyn CurrentVersionProvider>) -> Self {
        self.oracle = oracle;
        self
    }

    /// Replace the progress store.
    #[must_use]
    pub fn with_progress_store(mut self, progress: Arc<dyn ProgressStore>) -> Self {
        self.progress = progress;
        self
    }

    /// Delay between restore attempts during rollback.
    #[must_use]
    pub const fn with_rollback_retry_delay(mut self, delay: Duration) -> Self {
        self.rollback_retry_delay = delay;
        self
    }

    /// The engine's configuration.
    #[must_use]
    pub const fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    /// The store progress is written to.
    #[must_use]
    pub fn progress_store(&self) -> Arc<dyn ProgressStore> {
        Arc::clone(&self.progress)
    }

    fn slug(&self) -> &str {
        &self.config.target.slug
    }

    /// Run one update attempt. Never fails; the outcome says what happened.
    pub async fn perform_update(&self) -> UpdateOutcome {
        let slug = self.slug();
        info!("[{slug}] Starting update attempt");

        if let Err(e) = self.progress.clear(slug) {
            warn!("[{slug}] Failed to clear previous progress record: {e:#}");
        }
        let mut reporter = ProgressReporter::new(self.progress.as_ref(), slug);
        reporter.begin("Starting update");

        let outcome = self.run(&mut reporter).await;

        match &outcome {
            UpdateOutcome::Skipped(_) | UpdateOutcome::Updated { .. } => {
                info!("[{slug}] {outcome}");
                reporter.succeed(&outcome.to_string());
            }
            UpdateOutcome::Aborted(_) => {
                warn!("[{slug}] Update aborted: {outcome}");
                reporter.fail(&outcome.to_string());
            }
            UpdateOutcome::RolledBack {
                status,
                ..
            } => {
                if status.is_critical() {
                    error!("[{slug}] CRITICAL: {outcome}");
                } else {
                    warn!("[{slug}] {outcome}");
                }
                reporter.fail(&outcome.to_string());
            }
        }
        outcome
    }

    async fn run(&self, reporter: &mut ProgressReporter<'_>) -> UpdateOutcome {
        let slug = self.slug();
        if let Err(e) = self.config.validate() {
            return UpdateOutcome::Aborted(e.into());
        }

        let fs = self.fs.as_ref();
        let work_root = WorkRoot::new(&self.config.work_root);
        let orphans =
            collect_orphans(fs, &work_root, slug, self.config.orphan_max_age(), now_ms());
        if !orphans.removed.is_empty() {
            info!("[{slug}] Collected {} orphaned working directories", orphans.removed.len());
        }

        reporter.set("Checking remote manifest", 5);
        let (manifest, local) = match self.read_state().await {
            Ok(state) => state,
            Err(e) => return UpdateOutcome::Aborted(e),
        };
        let decision = decide(Ok(&local), &manifest);
        if !decision.is_update_needed() {
            return UpdateOutcome::Skipped(decision);
        }
        reporter.set(&decision.to_string(), 10);

        let spec = match manifest.package_spec() {
            Ok(spec) => spec,
            Err(e) => return UpdateOutcome::Aborted(e),
        };

        let set = match WorkingSet::allocate(fs, &work_root, slug, now_ms()) {
            Ok(set) => set,
            Err(e) => return UpdateOutcome::Aborted(UpdateError::filesystem(Stage::Downloading, &e)),
        };
        debug!("[{slug}] Working set timestamp {}", set.timestamp);

        let package = match self.retrieve(&spec, &set, reporter).await {
            Ok(package) => package,
            Err(e) => {
                set.cleanup(fs);
                return UpdateOutcome::Aborted(e);
            }
        };

        reporter.set("Re-checking versions before applying", 42);
        match self.recheck(&manifest).await {
            Ok(None) => {}
            Ok(Some(decision)) => {
                info!("[{slug}] Update no longer needed: {decision}");
                set.cleanup(fs);
                return UpdateOutcome::Skipped(decision);
            }
            Err(e) => {
                set.cleanup(fs);
                return UpdateOutcome::Aborted(e);
            }
        }

        let live_root = self.config.target.root.as_path();
        let keep = self.config.effective_backups_to_keep();
        let backup = if keep > 0 {
            reporter.set("Creating backup", 45);
            let backups_dir = work_root.backups_dir();
            let (live, dest, owner) =
                (live_root.to_path_buf(), set.backup_dir.clone(), slug.to_string());
            let created = self
                .run_blocking(Stage::BackingUp, move |fs| {
                    BackupManager::new(fs, backups_dir, &owner).create_backup(&live, &dest)
                })
                .await;
            match created {
                Ok(path) => {
                    reporter.set("Backup created", 55);
                    Some(path)
                }
                Err(cause) => return self.roll_back(reporter, &set, None, cause).await,
            }
        } else {
            info!("[{slug}] Backups disabled, skipping backup stage");
            None
        };

        if let Err(cause) = self.stage_and_switch(&spec, &set, &package, reporter).await {
            return self.roll_back(reporter, &set, backup.as_deref(), cause).await;
        }

        self.finalize(&set, &manifest, keep, reporter);
        UpdateOutcome::Updated {
            internal_version: manifest.internal_version.clone(),
            backup,
        }
    }

    async fn read_state(&self) -> Result<(UpdateManifest, LocalVersions), UpdateError> {
        let local = self.oracle.read_versions()?;
        // validate() guarantees the URL is present
        let url = self.config.update_url.as_deref().unwrap_or_default();
        let fetcher =
            ManifestFetcher::new(&self.http, &self.config.allowed_hosts, self.config.manifest_timeout());
        let manifest = fetcher.fetch(url).await?;
        Ok((manifest, local))
    }

    async fn retrieve(
        &self,
        spec: &PackageSpec<'_>,
        set: &WorkingSet,
        reporter: &mut ProgressReporter<'_>,
    ) -> Result<ExtractedPackage, UpdateError> {
        let retriever = PackageRetriever::new(
            &self.http,
            self.fs.as_ref(),
            &self.config.allowed_hosts,
            self.config.package_timeout(),
        );

        reporter.set("Downloading package", 15);
        let bytes = retriever.download(spec, set).await?;
        reporter.set(&format!("Downloaded package ({bytes} bytes)"), 25);

        reporter.set("Verifying package checksum", 30);
        retriever.verify(spec, set).await?;

        reporter.set("Extracting package", 35);
        let package = retriever.extract(spec, set).await?;
        if let Some(first) = package.missing.first() {
            if !self.config.allow_partial {
                return Err(UpdateError::MissingPackageFile {
                    path: first.to_string(),
                });
            }
            warn!(
                "[{}] Package lacks {} manifest file(s); applying the rest",
                self.slug(),
                package.missing.len()
            );
        }
        reporter.set("Package extracted", 40);
        Ok(package)
    }

    /// Re-read both sides before destructive work.
    ///
    /// Returns the new decision when an update is no longer needed.
    async fn recheck(&self, original: &UpdateManifest) -> Result<Option<Decision>, UpdateError> {
        let (manifest, local) = self.read_state().await?;
        let decision = decide(Ok(&local), &manifest);
        if !decision.is_update_needed() {
            return Ok(Some(decision));
        }
        if manifest.internal_version != original.internal_version
            || manifest.package_hash != original.package_hash
        {
            return Err(UpdateError::ManifestNotApplicable {
                reason: format!(
                    "manifest changed during the attempt (internal version {} -> {})",
                    original.internal_version, manifest.internal_version
                ),
            });
        }
        Ok(None)
    }

    async fn stage_and_switch(
        &self,
        spec: &PackageSpec<'_>,
        set: &WorkingSet,
        package: &ExtractedPackage,
        reporter: &mut ProgressReporter<'_>,
    ) -> Result<(), UpdateError> {
        let slug = self.slug().to_string();
        let live_root = self.config.target.root.clone();
        let staging_dir = set.staging_dir.clone();
        let mode = self.config.staging_mode;

        reporter.set("Copying live tree to staging", 60);
        let (owner, live, staging) = (slug.clone(), live_root.clone(), staging_dir.clone());
        self.run_blocking(Stage::Staging, move |fs| {
            StagingEngine::new(fs, &owner, mode).prepare(&live, &staging)
        })
        .await?;
        reporter.set("Staging copy complete", 70);

        reporter.set("Applying package files", 75);
        let (owner, staging, package, files) =
            (slug.clone(), staging_dir.clone(), package.clone(), spec.files.to_vec());
        let report = self
            .run_blocking(Stage::Applying, move |fs| {
                StagingEngine::new(fs, &owner, mode).apply(&staging, &package, &files)
            })
            .await?;
        reporter.set(&format!("Applied {} file(s)", report.applied.len()), 85);

        reporter.set("Switching staging into place", 90);
        self.run_blocking(Stage::Switching, move |fs| {
            switch_live(fs, &slug, &live_root, &staging_dir)
        })
        .await
    }

    /// Run a tree-sized filesystem operation on the blocking pool.
    async fn run_blocking<T, F>(&self, stage: Stage, work: F) -> Result<T, UpdateError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn Filesystem) -> anyhow::Result<T> + Send + 'static,
    {
        let fs = Arc::clone(&self.fs);
        match tokio::task::spawn_blocking(move || work(fs.as_ref())).await {
            Ok(result) => result.map_err(|e| UpdateError::filesystem(stage, &e)),
            Err(e) => Err(UpdateError::filesystem(
                stage,
                &anyhow::Error::new(e).context("filesystem task did not complete"),
            )),
        }
    }

    fn finalize(
        &self,
        set: &WorkingSet,
        manifest: &UpdateManifest,
        keep: usize,
        reporter: &mut ProgressReporter<'_>,
    ) {
        let fs = self.fs.as_ref();
        let slug = self.slug();
        reporter.set("Cleaning up", 95);

        if keep > 0 {
            let backups_dir = WorkRoot::new(&self.config.work_root).backups_dir();
            BackupManager::new(fs, backups_dir, slug).prune(keep);
        }
        set.cleanup(fs);

        match self.oracle.read_internal_version() {
            Ok(deployed) if deployed == manifest.internal_version => {
                debug!("[{slug}] Deployed internal version is now {deployed}");
            }
            Ok(deployed) => warn!(
                "[{slug}] Deployed internal version is {deployed}, expected {}",
                manifest.internal_version
            ),
            Err(e) => warn!("[{slug}] Could not confirm deployed version: {e}"),
        }
    }

    async fn roll_back(
        &self,
        reporter: &mut ProgressReporter<'_>,
        set: &WorkingSet,
        backup: Option<&Path>,
        cause: UpdateError,
    ) -> UpdateOutcome {
        error!("[{}] Update failed, rolling back: {cause}", self.slug());
        reporter.set("Update failed, rolling back", 95);

        let status = RollbackController::new(self.fs.as_ref(), self.slug())
            .with_retry_delay(self.rollback_retry_delay)
            .rollback(backup, &self.config.target.root, &set.staging_dir, &set.temp_dir)
            .await;
        UpdateOutcome::RolledBack {
            cause,
            status,
        }
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FaultyFs, FsOp, TargetFixture, init_test_logging};

    #[tokio::test]
    async fn test_internal_update_applied() {
        init_test_logging(None);
        let fixture = TargetFixture::new("2.3.0", "5");
        fixture.publish("2.3.0", "6", &[("a.txt", "NEW")]);

        let outcome = fixture.engine().perform_update().await;

        assert!(matches!(outcome, UpdateOutcome::Updated { .. }), "{outcome:?}");
        assert_eq!(fixture.read_live("a.txt"), "NEW");
        assert_eq!(fixture.read_live("keep.txt"), "KEEP");
        assert_eq!(fixture.backups().len(), 1);
        assert!(fixture.staging_dirs().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_update_on_multi_thread_runtime() {
        let fixture = TargetFixture::new("2.3.0", "5");
        fixture.publish("2.3.0", "6", &[("a.txt", "NEW"), ("nested/b.txt", "B")]);

        let outcome = fixture.engine().perform_update().await;

        assert!(matches!(outcome, UpdateOutcome::Updated { .. }), "{outcome:?}");
        assert_eq!(fixture.read_live("a.txt"), "NEW");
        assert_eq!(fixture.read_live("keep.txt"), "KEEP");
        assert_eq!(fixture.backups().len(), 1);
        assert!(fixture.staging_dirs().is_empty());
    }

    #[tokio::test]
    async fn test_up_to_date_is_skipped() {
        let fixture = TargetFixture::new("2.3.0", "5");
        fixture.publish("2.3.0", "5", &[("a.txt", "NEW")]);

        let outcome = fixture.engine().perform_update().await;

        assert!(matches!(outcome, UpdateOutcome::Skipped(Decision::UpToDate { .. })));
        assert_eq!(fixture.read_live("a.txt"), "OLD");
        assert!(fixture.backups().is_empty());
    }

    #[tokio::test]
    async fn test_missing_package_file_aborts_before_backup() {
        let fixture = TargetFixture::new("2.3.0", "5");
        fixture.publish_with_files("2.3.0", "6", &[("a.txt", "NEW")], &["a.txt", "b.txt"]);

        let outcome = fixture.engine().perform_update().await;

        assert!(matches!(outcome, UpdateOutcome::Aborted(UpdateError::MissingPackageFile { .. })));
        assert_eq!(fixture.read_live("a.txt"), "OLD");
        assert!(fixture.backups().is_empty());
    }

    #[tokio::test]
    async fn test_apply_failure_rolls_back() {
        let fixture = TargetFixture::new("2.3.0", "5");
        fixture.publish("2.3.0", "6", &[("a.txt", "NEW")]);
        let fs = FaultyFs::new().fail_on(FsOp::Rename, "extracted");

        let outcome = fixture.engine_with_fs(Arc::new(fs)).perform_update().await;

        match outcome {
            UpdateOutcome::RolledBack {
                cause,
                status,
            } => {
                assert!(matches!(
                    cause,
                    UpdateError::Filesystem {
                        stage: Stage::Applying,
                        ..
                    }
                ));
                assert_eq!(status, RollbackStatus::RolledBackSuccess);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(fixture.read_live("a.txt"), "OLD");
        assert_eq!(fixture.backups().len(), 1);
    }
}
