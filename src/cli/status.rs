//! Show the last status line.

use super::common::load_local_config;
use crate::update::{FileProgressStore, ProgressReader};
use crate::utils::LocalFs;
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

/// Print the last human-readable status of the configured target.
#[derive(Args, Debug)]
pub struct StatusCommand {}

impl StatusCommand {
    pub async fn execute(self, config_path: Option<PathBuf>) -> Result<()> {
        let config = load_local_config(config_path).await?;
        let store = FileProgressStore::new(Arc::new(LocalFs), &config.work_root);
        let reader = ProgressReader::new(&store, config.stall_threshold());

        match reader.last_status(&config.target.slug) {
            Some(status) => println!("{status}"),
            None => println!("No status recorded for {}", config.target.slug),
        }
        Ok(())
    }
}
