//! The update pipeline.
//!
//! One attempt moves a target from its deployed internal version to the one
//! published in the remote manifest:
//!
//! 1. [`fetcher`] retrieves the manifest, [`oracle`] reads the deployed
//!    versions and [`comparator`] decides whether a package applies
//! 2. [`retriever`] downloads, verifies ([`verification`]) and unpacks it
//! 3. [`backup`] copies the live tree aside
//! 4. [`staging`] clones the live tree and overlays the manifest files
//! 5. [`switch`] replaces the live tree with staging
//! 6. [`rollback`] restores the backup when any step from 3 onward fails
//!
//! [`engine`] drives these steps and reports through [`progress`];
//! [`workspace`] owns the per-attempt directories. [`checker`] and
//! [`scheduler`] decide when an attempt runs.
//!
//! # Example
//!
//! ```rust,no_run
//! use seamless_update::config::UpdaterConfig;
//! use seamless_update::http::ReqwestClient;
//! use seamless_update::update::UpdateEngine;
//! use seamless_update::utils::LocalFs;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = UpdaterConfig::load(None).await?;
//! let engine = UpdateEngine::new(config, Arc::new(LocalFs), ReqwestClient::new()?);
//! let outcome = engine.perform_update().await;
//! println!("{outcome}");
//! # Ok(())
//! # }
//! ```

pub mod backup;
pub mod checker;
pub mod comparator;
pub mod engine;
pub mod fetcher;
pub mod oracle;
pub mod progress;
pub mod retriever;
pub mod rollback;
pub mod scheduler;
pub mod staging;
pub mod switch;
pub mod verification;
pub mod workspace;

pub use backup::{BackupInfo, BackupManager};
pub use checker::{CheckReport, UpdateChecker, perform_update_job};
pub use comparator::{Decision, decide};
pub use engine::{UpdateEngine, UpdateOutcome};
pub use oracle::{CurrentVersionProvider, LocalVersions, provider_from_config};
pub use progress::{
    FileProgressStore, ProgressReader, ProgressRecord, ProgressReporter, ProgressStore,
    RESET_STATUS, reset_status,
};
pub use rollback::{RollbackController, RollbackStatus};
pub use scheduler::{InMemoryScheduler, JobKey, Scheduler};
pub use workspace::{WorkRoot, collect_orphans};
