//! Helpers shared by the CLI commands.

use crate::config::{ConfigError, UpdaterConfig};
use crate::core::{UpdateError, create_error_context};
use crate::http::ReqwestClient;
use crate::update::{UpdateEngine, UpdateOutcome, WorkRoot};
use crate::utils::{LocalFs, validate_slug};
use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

/// Load the configuration, requiring only a usable target slug.
///
/// Commands that only read local state (progress, status, backups) work
/// without a manifest URL.
pub async fn load_local_config(path: Option<PathBuf>) -> Result<UpdaterConfig> {
    let config = UpdaterConfig::load(path).await?;
    validate_slug(&config.target.slug).map_err(|e| {
        UpdateError::from(ConfigError::Invalid {
            field: "target.slug",
            reason: e.to_string(),
        })
    })?;
    Ok(config)
}

/// Load and fully validate the configuration.
pub async fn load_config(path: Option<PathBuf>) -> Result<UpdaterConfig> {
    let config = UpdaterConfig::load(path).await?;
    config.validate().map_err(UpdateError::from)?;
    Ok(config)
}

/// Engine over the local disk and the network.
pub fn build_engine(config: UpdaterConfig) -> Result<UpdateEngine<ReqwestClient>> {
    Ok(UpdateEngine::new(config, Arc::new(LocalFs), ReqwestClient::new()?))
}

/// Print an outcome; failures become an error for the exit status.
pub fn report_outcome(config: &UpdaterConfig, outcome: UpdateOutcome) -> Result<()> {
    match outcome {
        UpdateOutcome::Skipped(decision) => {
            println!("{} {decision}", "✓".green());
            Ok(())
        }
        UpdateOutcome::Updated {
            internal_version,
            backup,
        } => {
            println!(
                "{} Updated {} to internal version {}",
                "✓".green(),
                config.target.slug.bold(),
                internal_version.bold()
            );
            if let Some(backup) = backup {
                println!("  Backup: {}", backup.display());
            }
            Ok(())
        }
        UpdateOutcome::Aborted(error) => Err(create_error_context(error).into()),
        UpdateOutcome::RolledBack {
            cause,
            status,
        } => {
            if status.is_critical() {
                print_critical_banner(config);
                let backups = WorkRoot::new(&config.work_root).backups_dir();
                return Err(create_error_context(cause)
                    .with_details(format!("Rollback: {status}"))
                    .with_suggestion(format!(
                        "Restore {} by hand from the newest backup in {}",
                        config.target.root.display(),
                        backups.display()
                    ))
                    .into());
            }
            println!("{} Update failed and was rolled back: {status}", "!".yellow());
            Err(create_error_context(cause).with_details(format!("Rollback: {status}")).into())
        }
    }
}

fn print_critical_banner(config: &UpdaterConfig) {
    let rule = "=".repeat(72);
    eprintln!("{}", rule.red().bold());
    eprintln!("{}", "  CRITICAL: MANUAL INTERVENTION REQUIRED".red().bold());
    eprintln!(
        "  {}",
        format!(
            "The live tree of '{}' at {} may be damaged or missing.",
            config.target.slug,
            config.target.root.display()
        )
        .red()
    );
    eprintln!("{}", rule.red().bold());
}
