//! Rollback controller.
//!
//! Invoked for any failure from the backup stage onward. It always removes
//! the attempt's staging and temp directories, then restores the live tree
//! from the attempt's backup when one exists. Backups used for a rollback are
//! never deleted.

use crate::utils::Filesystem;
use anyhow::{Result, bail};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, warn};

const MAX_RESTORE_ATTEMPTS: u32 = 3;

/// Terminal state of a rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackStatus {
    /// Live tree restored from the backup
    RolledBackSuccess,
    /// No backup exists but the live tree is still in place
    RolledBackSkippedNoBackup,
    /// The live tree may be damaged or lost and could not be restored
    CriticalManualInterventionRequired,
}

impl RollbackStatus {
    /// Whether an operator has to repair the live tree by hand.
    #[must_use]
    pub const fn is_critical(self) -> bool {
        matches!(self, Self::CriticalManualInterventionRequired)
    }
}

impl fmt::Display for RollbackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::RolledBackSuccess => "rolled back from backup",
            Self::RolledBackSkippedNoBackup => "no backup to restore, live tree left untouched",
            Self::CriticalManualInterventionRequired => "CRITICAL: manual intervention required",
        };
        f.write_str(text)
    }
}

/// Restores the live tree after a failed attempt.
pub struct RollbackController<'a> {
    fs: &'a dyn Filesystem,
    slug: &'a str,
    retry_delay: Duration,
}

impl<'a> RollbackController<'a> {
    /// Controller for `slug`; restore attempts are one second apart.
    pub fn new(fs: &'a dyn Filesystem, slug: &'a str) -> Self {
        Self {
            fs,
            slug,
            retry_delay: Duration::from_secs(1),
        }
    }

    /// Override the delay between restore attempts.
    #[must_use]
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Clean up the working set and restore `live_root` from `backup`.
    pub async fn rollback(
        &self,
        backup: Option<&Path>,
        live_root: &Path,
        staging_dir: &Path,
        temp_dir: &Path,
    ) -> RollbackStatus {
        warn!("[{}] Rolling back update attempt", self.slug);

        for dir in [staging_dir, temp_dir] {
            if let Err(e) = self.fs.remove_dir_all(dir) {
                warn!("[{}] Failed to remove {} during rollback: {e:#}", self.slug, dir.display());
            }
        }

        let status = match backup.filter(|path| self.fs.is_dir(path)) {
            None if self.fs.is_dir(live_root) => {
                info!("[{}] No backup available, live tree left untouched", self.slug);
                RollbackStatus::RolledBackSkippedNoBackup
            }
            None => {
                error!(
                    "[{}] Live tree {} is missing and no backup exists",
                    self.slug,
                    live_root.display()
                );
                RollbackStatus::CriticalManualInterventionRequired
            }
            Some(backup) => self.restore_with_retry(backup, live_root).await,
        };

        if status.is_critical() {
            error!("[{}] CRITICAL: manual intervention required for {}", self.slug, live_root.display());
        }
        status
    }

    async fn restore_with_retry(&self, backup: &Path, live_root: &Path) -> RollbackStatus {
        let mut attempts = 0;
        loop {
            match self.restore(backup, live_root) {
                Ok(()) => {
                    info!("[{}] Restored {} from {}", self.slug, live_root.display(), backup.display());
                    return RollbackStatus::RolledBackSuccess;
                }
                Err(e) if attempts < MAX_RESTORE_ATTEMPTS - 1 => {
                    warn!("[{}] Restore attempt {} failed: {e:#}. Retrying...", self.slug, attempts + 1);
                    tokio::time::sleep(self.retry_delay).await;
                    attempts += 1;
                }
                Err(e) => {
                    error!(
                        "[{}] Failed to restore backup after {MAX_RESTORE_ATTEMPTS} attempts: {e:#}",
                        self.slug
                    );
                    return RollbackStatus::CriticalManualInterventionRequired;
                }
            }
        }
    }

    fn restore(&self, backup: &Path, live_root: &Path) -> Result<()> {
        if let Err(e) = self.fs.remove_dir_all(live_root) {
            warn!("[{}] Failed to clear live tree before restore: {e:#}", self.slug);
        }
        if self.fs.exists(live_root) {
            bail!("Live tree {} could not be cleared", live_root.display());
        }
        self.fs.copy_dir(backup, live_root)
    }
}
