//! Run the update check.

use super::common::{build_engine, load_config, report_outcome};
use crate::http::ReqwestClient;
use crate::update::{
    FileProgressStore, InMemoryScheduler, UpdateChecker, perform_update_job, provider_from_config,
};
use crate::utils::{Filesystem, LocalFs};
use anyhow::Result;
use chrono::Utc;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

/// Compare the deployed versions with the remote manifest.
///
/// When an internal update is needed an update job is scheduled. Without a
/// long-running scheduler the job only lives for this process, so pass
/// `--apply` to run it right away, or trigger `seamless-update update` from
/// an external scheduler.
#[derive(Args, Debug)]
pub struct CheckCommand {
    /// Run the scheduled update job immediately
    #[arg(long)]
    apply: bool,

    /// Print the check report as JSON
    #[arg(long)]
    json: bool,
}

impl CheckCommand {
    pub async fn execute(self, config_path: Option<PathBuf>) -> Result<()> {
        let config = load_config(config_path).await?;
        let fs: Arc<dyn Filesystem> = Arc::new(LocalFs);
        let http = ReqwestClient::new()?;
        let oracle = provider_from_config(&config, Arc::clone(&fs));
        let store = FileProgressStore::new(Arc::clone(&fs), &config.work_root);
        let scheduler = InMemoryScheduler::new();

        let checker = UpdateChecker::new(&config, &http, oracle.as_ref(), &store, &scheduler);
        let report = checker.check().await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else if report.decision.is_update_needed() {
            println!("{} {}", "↑".cyan(), report.decision);
        } else {
            println!("{} {}", "✓".green(), report.decision);
        }

        let job = perform_update_job(&config.target.slug);
        let Some(run_at) = report.scheduled_at else {
            return Ok(());
        };

        if !self.apply {
            if !self.json {
                println!(
                    "  Update job {job} scheduled for {}; run with --apply to perform it now",
                    run_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
            }
            return Ok(());
        }

        // --apply runs the job regardless of its delay
        let due = scheduler.take_due(run_at.max(Utc::now()));
        if due.contains(&job) {
            let engine = build_engine(config.clone())?;
            let outcome = engine.perform_update().await;
            return report_outcome(&config, outcome);
        }
        Ok(())
    }
}
