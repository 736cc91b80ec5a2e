//! List retained backups.

use super::common::load_local_config;
use crate::update::{BackupManager, WorkRoot};
use crate::utils::LocalFs;
use anyhow::Result;
use chrono::DateTime;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

/// List the backups of the configured target, newest first.
#[derive(Args, Debug)]
pub struct BackupsCommand {
    /// Print the list as JSON
    #[arg(long)]
    json: bool,
}

impl BackupsCommand {
    pub async fn execute(self, config_path: Option<PathBuf>) -> Result<()> {
        let config = load_local_config(config_path).await?;
        let backups_dir = WorkRoot::new(&config.work_root).backups_dir();
        let backups = BackupManager::new(&LocalFs, backups_dir, &config.target.slug).list_backups()?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&backups)?);
            return Ok(());
        }
        if backups.is_empty() {
            println!("No backups for {}", config.target.slug);
            return Ok(());
        }

        for backup in &backups {
            let taken = DateTime::from_timestamp_millis(backup.timestamp)
                .map_or_else(|| "unknown time".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string());
            println!("{}  {}", taken.cyan(), backup.path.display());
        }
        println!(
            "{} backup(s), retention {}",
            backups.len(),
            config.effective_backups_to_keep()
        );
        Ok(())
    }
}
