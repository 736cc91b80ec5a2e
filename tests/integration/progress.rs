//! Integration tests for progress records, stall detection and checking.

use chrono::{Duration as ChronoDuration, Utc};
use seamless_update::test_utils::{RecordingProgressStore, StaticVersions, TargetFixture};
use seamless_update::update::{
    Decision, InMemoryScheduler, ProgressReader, ProgressRecord, ProgressStore, Scheduler,
    UpdateChecker, perform_update_job,
};
use std::sync::Arc;
use std::time::Duration;

/// Percentages never decrease during an attempt and the last record is
/// terminal.
#[tokio::test]
async fn test_progress_is_monotonic() {
    let fixture = TargetFixture::new("2.3.0", "5");
    fixture.publish("2.3.0", "6", &[("a.txt", "NEW")]);
    let store = Arc::new(RecordingProgressStore::new());

    let outcome = fixture.engine().with_progress_store(store.clone()).perform_update().await;
    assert!(outcome.is_success(), "{outcome}");

    let history = store.history("theme");
    assert!(history.len() > 5);
    assert_eq!(history[0].percent, 0);
    assert!(history.windows(2).all(|w| w[0].percent <= w[1].percent));
    let last = history.last().unwrap();
    assert_eq!(last.percent, 100);
    assert!(!last.is_error);
    assert_eq!(history.iter().filter(|r| r.percent == 100).count(), 1);
}

/// An in-flight record older than the threshold is reported and persisted
/// as a stalled failure.
#[tokio::test]
async fn test_stalled_record_is_rewritten() {
    let fixture = TargetFixture::new("2.3.0", "5");
    let store = fixture.progress_store();
    let written = Utc::now() - ChronoDuration::minutes(10);
    store
        .save(
            "theme",
            &ProgressRecord {
                message: "Downloading package".to_string(),
                percent: 15,
                is_error: false,
                timestamp: written,
            },
        )
        .unwrap();

    let reader = ProgressReader::new(&store, Duration::from_secs(300));
    let record = reader.get_progress("theme");

    assert!(record.is_error);
    assert_eq!(record.percent, 100);
    assert!(record.message.contains("stalled at \"Downloading package\""));
    assert_eq!(store.load("theme").unwrap(), Some(record));
    assert!(reader.last_status("theme").unwrap().starts_with("Update failed"));
}

/// A fresh in-flight record is returned as is.
#[tokio::test]
async fn test_recent_record_is_not_stalled() {
    let fixture = TargetFixture::new("2.3.0", "5");
    let store = fixture.progress_store();
    let record = ProgressRecord {
        message: "Extracting package".to_string(),
        percent: 35,
        is_error: false,
        timestamp: Utc::now(),
    };
    store.save("theme", &record).unwrap();

    let reader = ProgressReader::new(&store, Duration::from_secs(300));
    assert_eq!(reader.get_progress("theme"), record);
}

/// Checking twice schedules the update job once.
#[tokio::test]
async fn test_checker_schedules_once() {
    let fixture = TargetFixture::new("2.3.0", "5");
    fixture.publish("2.3.0", "6", &[("a.txt", "NEW")]);
    let oracle = StaticVersions::new("2.3.0", "5");
    let store = fixture.progress_store();
    let scheduler = InMemoryScheduler::new();
    let checker = UpdateChecker::new(&fixture.config, &fixture.http, &oracle, &store, &scheduler);

    let first = checker.check().await.unwrap();
    let second = checker.check().await.unwrap();

    assert!(matches!(first.decision, Decision::InternalUpdateNeeded { .. }));
    assert!(first.newly_scheduled);
    assert!(!second.newly_scheduled);
    assert_eq!(first.scheduled_at, second.scheduled_at);
    assert_eq!(scheduler.pending().len(), 1);
    assert!(scheduler.next_scheduled(&perform_update_job("theme")).is_some());

    let status = ProgressReader::new(&store, Duration::from_secs(300)).last_status("theme").unwrap();
    assert!(status.ends_with("Update already scheduled."), "{status}");
    // checking never applies anything
    assert_eq!(fixture.read_live("a.txt"), "OLD");
}
