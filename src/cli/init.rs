//! Write an example configuration file.

use crate::config::UpdaterConfig;
use anyhow::{Result, anyhow};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

/// Create an example configuration at the configured location.
#[derive(Args, Debug)]
pub struct InitCommand {
    /// Overwrite an existing configuration
    #[arg(short, long)]
    force: bool,
}

impl InitCommand {
    pub async fn execute(self, config_path: Option<PathBuf>) -> Result<()> {
        let path = UpdaterConfig::resolve_path(config_path)?;
        if path.exists() && !self.force {
            return Err(anyhow!(
                "Configuration already exists at {}. Use --force to overwrite",
                path.display()
            ));
        }

        UpdaterConfig::init_example().save_to(&path).await?;
        println!("{} Wrote example configuration to {}", "✓".green(), path.display());

        println!("\n{}", "Next steps:".cyan());
        println!("  Set target.slug, target.root and update_url, then run:");
        println!("    seamless-update check");
        Ok(())
    }
}
