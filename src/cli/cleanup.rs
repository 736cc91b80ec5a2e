//! Collect orphaned working directories.

use super::common::load_local_config;
use crate::update::{WorkRoot, collect_orphans};
use crate::utils::LocalFs;
use anyhow::{Result, bail};
use chrono::Utc;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;

/// Remove leftover temp and staging directories of the configured target.
///
/// Backups are never touched.
#[derive(Args, Debug)]
pub struct CleanupCommand {
    /// Also remove directories younger than the configured orphan age
    #[arg(long)]
    all: bool,
}

impl CleanupCommand {
    pub async fn execute(self, config_path: Option<PathBuf>) -> Result<()> {
        let config = load_local_config(config_path).await?;
        let max_age = if self.all {
            Duration::ZERO
        } else {
            config.orphan_max_age()
        };

        let report = collect_orphans(
            &LocalFs,
            &WorkRoot::new(&config.work_root),
            &config.target.slug,
            max_age,
            Utc::now().timestamp_millis(),
        );

        for path in &report.removed {
            println!("{} Removed {}", "✓".green(), path.display());
        }
        if report.removed.is_empty() {
            println!("No orphaned working directories");
        }
        if !report.failed.is_empty() {
            bail!("Failed to remove {} directory(ies); see the log for details", report.failed.len());
        }
        Ok(())
    }
}
