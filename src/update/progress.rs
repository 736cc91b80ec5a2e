//! Progress and status reporting.
//!
//! Each target has one machine-readable [`ProgressRecord`] and one
//! human-readable last-status line. Writers go through [`ProgressReporter`],
//! which keeps percentages monotonic within an attempt and ignores writes after
//! a terminal record. Readers go through [`ProgressReader`].
//!
//! # Stall detection
//!
//! [`ProgressReader::get_progress`] has a side effect: when the stored record
//! is still in flight (`0 <= percent < 100`, not an error) and older than the
//! stall threshold, the reader rewrites it as a terminal error before
//! returning it. There is no background watchdog; a hung attempt surfaces the
//! next time somebody polls.

use crate::update::workspace::WorkRoot;
use crate::utils::Filesystem;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Percent of a record that has never been written.
pub const IDLE_PERCENT: i32 = -1;

/// Percent of a terminal record.
pub const TERMINAL_PERCENT: i32 = 100;

/// Snapshot of the current or last update attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    /// What the attempt is doing or how it ended
    pub message: String,
    /// -1 when idle, 0..=100 otherwise
    pub percent: i32,
    /// Set on terminal failure records
    pub is_error: bool,
    /// When the record was written
    pub timestamp: DateTime<Utc>,
}

impl ProgressRecord {
    /// Record returned when nothing has been written yet.
    #[must_use]
    pub fn idle() -> Self {
        Self {
            message: "No update in progress".to_string(),
            percent: IDLE_PERCENT,
            is_error: false,
            timestamp: DateTime::<Utc>::default(),
        }
    }

    /// Whether this record ends an attempt.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.percent >= TERMINAL_PERCENT
    }

    /// Whether an attempt is running according to this record.
    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        self.percent >= 0 && self.percent < TERMINAL_PERCENT && !self.is_error
    }

    /// The last-status line derived from this record.
    #[must_use]
    pub fn status_line(&self) -> String {
        match (self.is_terminal(), self.is_error) {
            (true, true) => format!("Update failed: {}", self.message),
            (true, false) => format!("Update successful. {}", self.message),
            (false, _) => format!("Update in progress: {}", self.message),
        }
    }
}

/// Persistence of progress records and status lines, keyed by slug.
pub trait ProgressStore: Send + Sync {
    /// Stored record, if any.
    fn load(&self, slug: &str) -> Result<Option<ProgressRecord>>;

    /// Overwrite the stored record.
    fn save(&self, slug: &str, record: &ProgressRecord) -> Result<()>;

    /// Stored status line, if any.
    fn load_status(&self, slug: &str) -> Result<Option<String>>;

    /// Overwrite the status line.
    fn save_status(&self, slug: &str, status: &str) -> Result<()>;

    /// Forget the stored record.
    fn clear(&self, slug: &str) -> Result<()>;
}

/// [`ProgressStore`] writing `<work_root>/status/<slug>.json` and
/// `<work_root>/status/<slug>.status`.
#[derive(Debug, Clone)]
pub struct FileProgressStore {
    fs: Arc<dyn Filesystem>,
    dir: PathBuf,
}

impl FileProgressStore {
    /// Store below `work_root`.
    pub fn new(fs: Arc<dyn Filesystem>, work_root: &Path) -> Self {
        Self {
            fs,
            dir: WorkRoot::new(work_root).status_dir(),
        }
    }

    fn record_path(&self, slug: &str) -> PathBuf {
        self.dir.join(format!("{slug}.json"))
    }

    fn status_path(&self, slug: &str) -> PathBuf {
        self.dir.join(format!("{slug}.status"))
    }
}

impl ProgressStore for FileProgressStore {
    fn load(&self, slug: &str) -> Result<Option<ProgressRecord>> {
        let path = self.record_path(slug);
        if !self.fs.exists(&path) {
            return Ok(None);
        }
        let bytes = self.fs.read(&path)?;
        let record = serde_json::from_slice(&bytes)
            .with_context(|| format!("Invalid progress record: {}", path.display()))?;
        Ok(Some(record))
    }

    fn save(&self, slug: &str, record: &ProgressRecord) -> Result<()> {
        let json = serde_json::to_vec_pretty(record).context("Failed to serialize progress")?;
        self.fs.write(&self.record_path(slug), &json)
    }

    fn load_status(&self, slug: &str) -> Result<Option<String>> {
        let path = self.status_path(slug);
        if !self.fs.exists(&path) {
            return Ok(None);
        }
        let bytes = self.fs.read(&path)?;
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }

    fn save_status(&self, slug: &str, status: &str) -> Result<()> {
        self.fs.write(&self.status_path(slug), status.as_bytes())
    }

    fn clear(&self, slug: &str) -> Result<()> {
        self.fs.remove_dir_all(&self.record_path(slug))
    }
}

/// Persist a record and its status line. Failures are logged, never raised.
fn write_record(store: &dyn ProgressStore, slug: &str, record: &ProgressRecord) {
    if let Err(e) = store.save(slug, record) {
        warn!("[{slug}] Failed to write progress record: {e:#}");
    }
    if let Err(e) = store.save_status(slug, &record.status_line()) {
        warn!("[{slug}] Failed to write status line: {e:#}");
    }
}

/// Status line left by [`reset_status`].
pub const RESET_STATUS: &str = "Status reset by admin.";

/// Forget the progress record of `slug` and replace its status line with
/// [`RESET_STATUS`].
///
/// Used to acknowledge a failed attempt so pollers see an idle target again.
pub fn reset_status(store: &dyn ProgressStore, slug: &str) -> Result<()> {
    store.clear(slug).with_context(|| format!("Failed to clear progress of {slug}"))?;
    store.save_status(slug, RESET_STATUS)?;
    info!("[{slug}] Progress and status reset");
    Ok(())
}

/// Writes the progress of one update attempt.
pub struct ProgressReporter<'a> {
    store: &'a dyn ProgressStore,
    slug: &'a str,
    last_percent: i32,
    finished: bool,
}

impl<'a> ProgressReporter<'a> {
    /// Reporter for a new attempt of `slug`.
    pub fn new(store: &'a dyn ProgressStore, slug: &'a str) -> Self {
        Self {
            store,
            slug,
            last_percent: IDLE_PERCENT,
            finished: false,
        }
    }

    /// Write the initial record at 0%.
    pub fn begin(&mut self, message: &str) {
        self.set(message, 0);
    }

    /// Record an intermediate step.
    ///
    /// `percent` is clamped so it never decreases and stays below 100.
    pub fn set(&mut self, message: &str, percent: i32) {
        let percent = percent.clamp(0, TERMINAL_PERCENT - 1);
        self.write(message, percent, false);
    }

    /// Write the terminal success record.
    pub fn succeed(&mut self, message: &str) {
        self.write(message, TERMINAL_PERCENT, false);
    }

    /// Write the terminal failure record.
    pub fn fail(&mut self, message: &str) {
        self.write(message, TERMINAL_PERCENT, true);
    }

    fn write(&mut self, message: &str, percent: i32, is_error: bool) {
        if self.finished {
            debug!("[{}] Ignoring progress after terminal record: {message}", self.slug);
            return;
        }
        let percent = percent.max(self.last_percent);
        self.last_percent = percent;
        self.finished = percent >= TERMINAL_PERCENT;

        info!("[{}] Progress {percent}%: {message}", self.slug);
        let record = ProgressRecord {
            message: message.to_string(),
            percent,
            is_error,
            timestamp: Utc::now(),
        };
        write_record(self.store, self.slug, &record);
    }
}

/// Reads progress records, applying stall detection.
pub struct ProgressReader<'a> {
    store: &'a dyn ProgressStore,
    stall_threshold: Duration,
}

impl<'a> ProgressReader<'a> {
    /// Reader flagging records older than `stall_threshold` as stalled.
    pub fn new(store: &'a dyn ProgressStore, stall_threshold: Duration) -> Self {
        Self {
            store,
            stall_threshold,
        }
    }

    /// Current record of `slug`. May rewrite a stalled record; see the module docs.
    pub fn get_progress(&self, slug: &str) -> ProgressRecord {
        self.get_progress_at(slug, Utc::now())
    }

    /// [`Self::get_progress`] with an explicit clock.
    pub fn get_progress_at(&self, slug: &str, now: DateTime<Utc>) -> ProgressRecord {
        let record = match self.store.load(slug) {
            Ok(Some(record)) => record,
            Ok(None) => return ProgressRecord::idle(),
            Err(e) => {
                warn!("[{slug}] Failed to read progress record: {e:#}");
                return ProgressRecord::idle();
            }
        };

        let age = now.signed_duration_since(record.timestamp).to_std().unwrap_or_default();
        if !record.is_in_flight() || age <= self.stall_threshold {
            return record;
        }

        warn!(
            "[{slug}] Update stalled at {}% ({}), last write {}s ago",
            record.percent,
            record.message,
            age.as_secs()
        );
        let stalled = ProgressRecord {
            message: format!(
                "Update process stalled at \"{}\". Server may have timed out.",
                record.message
            ),
            percent: TERMINAL_PERCENT,
            is_error: true,
            timestamp: now,
        };
        write_record(self.store, slug, &stalled);
        stalled
    }

    /// Last human-readable status line of `slug`.
    pub fn last_status(&self, slug: &str) -> Option<String> {
        self.store.load_status(slug).unwrap_or_else(|e| {
            warn!("[{slug}] Failed to read status line: {e:#}");
            None
        })
    }
}
