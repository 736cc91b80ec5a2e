//! Job scheduling.
//!
//! The checker never runs an update inline; it asks a [`Scheduler`] to run a
//! named job later. Jobs are de-duplicated by name and arguments, so a target
//! has at most one pending update job no matter how often the check runs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Mutex;
use tracing::debug;

/// Identity of a scheduled job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct JobKey {
    /// Job name
    pub name: String,
    /// Job arguments
    pub args: Vec<String>,
}

impl JobKey {
    /// Key for job `name` with `args`.
    pub fn new(name: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.name, self.args.join(", "))
    }
}

/// Runs named jobs at a future time.
pub trait Scheduler: Send + Sync {
    /// Schedule `key` at `run_at` unless an identical job is already pending.
    ///
    /// Returns `false` when the job was already pending.
    fn schedule_once(&self, key: JobKey, run_at: DateTime<Utc>) -> bool;

    /// When `key` is due, if it is pending.
    fn next_scheduled(&self, key: &JobKey) -> Option<DateTime<Utc>>;
}

/// Process-local [`Scheduler`].
#[derive(Debug, Default)]
pub struct InMemoryScheduler {
    jobs: Mutex<Vec<(JobKey, DateTime<Utc>)>>,
}

impl InMemoryScheduler {
    /// Empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return the jobs due at `now`, earliest first.
    pub fn take_due(&self, now: DateTime<Utc>) -> Vec<JobKey> {
        let mut jobs = self.jobs.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let (mut due, pending): (Vec<_>, Vec<_>) =
            jobs.drain(..).partition(|(_, run_at)| *run_at <= now);
        *jobs = pending;
        due.sort_by_key(|(_, run_at)| *run_at);
        due.into_iter().map(|(key, _)| key).collect()
    }

    /// All pending jobs.
    pub fn pending(&self) -> Vec<(JobKey, DateTime<Utc>)> {
        self.jobs.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }
}

impl Scheduler for InMemoryScheduler {
    fn schedule_once(&self, key: JobKey, run_at: DateTime<Utc>) -> bool {
        let mut jobs = self.jobs.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if jobs.iter().any(|(pending, _)| *pending == key) {
            debug!("Job {key} already scheduled");
            return false;
        }
        debug!("Scheduling {key} at {run_at}");
        jobs.push((key, run_at));
        true
    }

    fn next_scheduled(&self, key: &JobKey) -> Option<DateTime<Utc>> {
        self.jobs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .find(|(pending, _)| pending == key)
            .map(|(_, run_at)| *run_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_schedule_once_deduplicates() {
        let scheduler = InMemoryScheduler::new();
        let now = Utc::now();
        let key = JobKey::new("perform_update", ["theme"]);

        assert!(scheduler.schedule_once(key.clone(), now));
        assert!(!scheduler.schedule_once(key.clone(), now + Duration::seconds(60)));
        assert!(scheduler.schedule_once(JobKey::new("perform_update", ["other"]), now));

        assert_eq!(scheduler.pending().len(), 2);
        assert_eq!(scheduler.next_scheduled(&key), Some(now));
    }

    #[test]
    fn test_take_due() {
        let scheduler = InMemoryScheduler::new();
        let now = Utc::now();
        scheduler.schedule_once(JobKey::new("late", ["x"]), now + Duration::seconds(60));
        scheduler.schedule_once(JobKey::new("b", ["x"]), now);
        scheduler.schedule_once(JobKey::new("a", ["x"]), now - Duration::seconds(5));

        let due: Vec<String> = scheduler.take_due(now).into_iter().map(|k| k.name).collect();
        assert_eq!(due, vec!["a", "b"]);
        assert_eq!(scheduler.pending().len(), 1);

        // a drained job can be scheduled again
        assert!(scheduler.schedule_once(JobKey::new("a", ["x"]), now));
    }

    #[test]
    fn test_job_key_display() {
        assert_eq!(JobKey::new("perform_update", ["theme"]).to_string(), "perform_update[theme]");
    }
}
