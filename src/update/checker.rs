//! Periodic update check.
//!
//! The checker compares the deployed versions with the remote manifest,
//! records the result as the target's last-status line, and schedules a
//! `perform_update` job when an internal update is needed. It never touches
//! the live tree.

use crate::config::UpdaterConfig;
use crate::constants::PERFORM_UPDATE_JOB;
use crate::core::UpdateError;
use crate::http::HttpClient;
use crate::update::comparator::{Decision, decide};
use crate::update::fetcher::ManifestFetcher;
use crate::update::oracle::CurrentVersionProvider;
use crate::update::progress::ProgressStore;
use crate::update::scheduler::{JobKey, Scheduler};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

/// Result of one check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    /// Comparator decision
    pub decision: Decision,
    /// When the update job runs, if one is pending after this check
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Whether this check created the job (false when it was already pending)
    pub newly_scheduled: bool,
}

/// Job key of the update job for `slug`.
#[must_use]
pub fn perform_update_job(slug: &str) -> JobKey {
    JobKey::new(PERFORM_UPDATE_JOB, [slug])
}

/// Runs the update check for the configured target.
pub struct UpdateChecker<'a, H> {
    config: &'a UpdaterConfig,
    http: &'a H,
    oracle: &'a dyn CurrentVersionProvider,
    store: &'a dyn ProgressStore,
    scheduler: &'a dyn Scheduler,
}

impl<'a, H: HttpClient> UpdateChecker<'a, H> {
    /// Create a checker from its collaborators.
    pub fn new(
        config: &'a UpdaterConfig,
        http: &'a H,
        oracle: &'a dyn CurrentVersionProvider,
        store: &'a dyn ProgressStore,
        scheduler: &'a dyn Scheduler,
    ) -> Self {
        Self {
            config,
            http,
            oracle,
            store,
            scheduler,
        }
    }

    /// Compare versions and schedule an update if one is needed.
    ///
    /// # Errors
    ///
    /// Only configuration problems are errors. A failed fetch or an
    /// unavailable oracle yields [`Decision::NoAction`].
    pub async fn check(&self) -> Result<CheckReport, UpdateError> {
        let slug = self.config.target.slug.as_str();

        if let Err(e) = self.config.validate() {
            self.record_status(slug, &format!("Updater not configured: {e}"));
            return Err(e.into());
        }
        // validate() guarantees the URL is present
        let url = self.config.update_url.as_deref().unwrap_or_default();

        let local = self.oracle.read_versions();
        if let Err(e) = &local {
            warn!("[{slug}] Cannot read deployed versions: {e}");
        }

        let fetcher =
            ManifestFetcher::new(self.http, &self.config.allowed_hosts, self.config.manifest_timeout());
        let decision = match fetcher.fetch(url).await {
            Ok(manifest) => decide(local.as_ref(), &manifest),
            Err(e) => {
                warn!("[{slug}] Failed to fetch or parse remote update info: {e}");
                Decision::NoAction {
                    reason: e.to_string(),
                }
            }
        };
        info!("[{slug}] {decision}");

        let mut report = CheckReport {
            decision,
            scheduled_at: None,
            newly_scheduled: false,
        };

        if report.decision.is_update_needed() {
            let key = perform_update_job(slug);
            let delay = chrono::Duration::from_std(self.config.schedule_delay())
                .unwrap_or_else(|_| chrono::Duration::seconds(60));
            report.newly_scheduled = self.scheduler.schedule_once(key.clone(), Utc::now() + delay);
            report.scheduled_at = self.scheduler.next_scheduled(&key);

            let suffix = if report.newly_scheduled {
                "Scheduling update."
            } else {
                "Update already scheduled."
            };
            self.record_status(slug, &format!("{}. {suffix}", report.decision));
        } else {
            self.record_status(slug, &report.decision.to_string());
        }

        Ok(report)
    }

    fn record_status(&self, slug: &str, status: &str) {
        if let Err(e) = self.store.save_status(slug, status) {
            warn!("[{slug}] Failed to write status line: {e:#}");
        }
    }
}
