//! Clear the progress record and mark the status as reset.

use super::common::load_local_config;
use crate::update::{FileProgressStore, reset_status};
use crate::utils::LocalFs;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

/// Forget a stuck or failed attempt so the target reads as idle again.
///
/// Only the progress record and status line are touched; backups and the
/// live tree stay as they are.
#[derive(Args, Debug)]
pub struct ResetCommand {}

impl ResetCommand {
    pub async fn execute(self, config_path: Option<PathBuf>) -> Result<()> {
        let config = load_local_config(config_path).await?;
        let store = FileProgressStore::new(Arc::new(LocalFs), &config.work_root);
        reset_status(&store, &config.target.slug)?;
        println!("{} Status reset for {}", "✓".green(), config.target.slug);
        Ok(())
    }
}
