//! Show the progress record.

use super::common::load_local_config;
use crate::update::progress::{IDLE_PERCENT, ProgressReader, ProgressRecord, TERMINAL_PERCENT};
use crate::update::FileProgressStore;
use crate::utils::LocalFs;
use crate::utils::progress::ProgressBar;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Print the current progress record.
///
/// Reading applies stall detection: an in-flight record older than the stall
/// threshold is rewritten as a failure.
#[derive(Args, Debug)]
pub struct ProgressCommand {
    /// Print the record as JSON
    #[arg(long, conflicts_with = "watch")]
    json: bool,

    /// Poll every second until the attempt ends
    #[arg(long)]
    watch: bool,
}

impl ProgressCommand {
    pub async fn execute(self, config_path: Option<PathBuf>) -> Result<()> {
        let config = load_local_config(config_path).await?;
        let store = FileProgressStore::new(Arc::new(LocalFs), &config.work_root);
        let reader = ProgressReader::new(&store, config.stall_threshold());
        let slug = config.target.slug.as_str();

        if self.watch {
            watch(&reader, slug).await;
            return Ok(());
        }

        let record = reader.get_progress(slug);
        if self.json {
            println!("{}", serde_json::to_string_pretty(&record)?);
        } else {
            println!("{}", describe(&record));
        }
        Ok(())
    }
}

async fn watch(reader: &ProgressReader<'_>, slug: &str) {
    let bar = ProgressBar::new(TERMINAL_PERCENT as u64);
    loop {
        let record = reader.get_progress(slug);
        if record.percent == IDLE_PERCENT {
            bar.abandon_with_message(record.message.clone());
            if bar.is_hidden() {
                println!("{}", describe(&record));
            }
            return;
        }

        bar.set_position(record.percent.unsigned_abs().into());
        bar.set_message(record.message.clone());
        if record.is_terminal() {
            if record.is_error {
                bar.abandon_with_message(record.message.red().to_string());
            } else {
                bar.finish_with_message(record.message.green().to_string());
            }
            if bar.is_hidden() {
                println!("{}", describe(&record));
            }
            return;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

fn describe(record: &ProgressRecord) -> String {
    let line = format!("[{:>3}%] {}", record.percent, record.message);
    if record.is_error {
        line.red().to_string()
    } else if record.is_terminal() {
        line.green().to_string()
    } else {
        line
    }
}
