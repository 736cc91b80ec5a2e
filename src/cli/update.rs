//! Run one update attempt now.

use super::common::{build_engine, load_config, report_outcome};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

/// Perform an update attempt for the configured target.
///
/// Calling this when nothing needs updating is a fast no-op. Concurrent
/// invocations for the same target must be serialized by the caller.
#[derive(Args, Debug)]
pub struct UpdateCommand {}

impl UpdateCommand {
    pub async fn execute(self, config_path: Option<PathBuf>) -> Result<()> {
        let config = load_config(config_path).await?;
        println!("{} {}", "Updating".cyan(), config.target.slug.bold());

        let engine = build_engine(config.clone())?;
        let outcome = engine.perform_update().await;
        report_outcome(&config, outcome)
    }
}
