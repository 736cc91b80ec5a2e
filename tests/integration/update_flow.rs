//! Integration tests for complete update attempts.

use seamless_update::config::StagingMode;
use seamless_update::constants::DEFAULT_SIDECAR_FILE;
use seamless_update::core::{FetchError, UpdateError};
use seamless_update::test_utils::{TargetFixture, init_test_logging, snapshot};
use seamless_update::update::{Decision, ProgressStore, UpdateOutcome};
use std::path::PathBuf;

/// An up-to-date target is left byte for byte as it was, however often the
/// engine runs.
#[tokio::test]
async fn test_up_to_date_runs_are_idempotent() {
    init_test_logging(None);
    let fixture = TargetFixture::new("2.3.0", "5");
    fixture.publish("2.3.0", "5", &[("a.txt", "NEW")]);
    let before = fixture.live_snapshot();

    for _ in 0..2 {
        let outcome = fixture.engine().perform_update().await;
        assert!(matches!(outcome, UpdateOutcome::Skipped(Decision::UpToDate { .. })), "{outcome:?}");
    }

    assert_eq!(fixture.live_snapshot(), before);
    assert!(fixture.backups().is_empty());
    assert!(fixture.staging_dirs().is_empty());
    assert!(fixture.temp_dirs().is_empty());

    let record = fixture.progress_store().load("theme").unwrap().unwrap();
    assert_eq!(record.percent, 100);
    assert!(!record.is_error);
}

/// A newer display version belongs to the regular update channel.
#[tokio::test]
async fn test_standard_update_is_not_applied() {
    let fixture = TargetFixture::new("2.3.0", "5");
    fixture.publish("2.4.0", "1", &[("a.txt", "NEW")]);

    let outcome = fixture.engine().perform_update().await;

    assert!(matches!(outcome, UpdateOutcome::Skipped(Decision::StandardUpdateAvailable { .. })));
    assert_eq!(fixture.read_live("a.txt"), "OLD");
}

/// Overlay mode replaces listed files and keeps every other file unchanged.
#[tokio::test]
async fn test_overlay_update_touches_only_listed_files() {
    let fixture = TargetFixture::new("2.3.0", "5");
    fixture.publish("2.3.0", "6", &[("a.txt", "NEW"), ("inc/new.php", "<?php // new")]);
    let mut expected = fixture.live_snapshot();

    let outcome = fixture.engine().perform_update().await;
    assert!(outcome.is_success(), "{outcome}");

    expected.insert(PathBuf::from("a.txt"), b"NEW".to_vec());
    expected.insert(PathBuf::from("inc/new.php"), b"<?php // new".to_vec());
    let mut after = fixture.live_snapshot();
    let sidecar = after.remove(&PathBuf::from(DEFAULT_SIDECAR_FILE)).unwrap();
    expected.remove(&PathBuf::from(DEFAULT_SIDECAR_FILE));

    assert_eq!(after, expected);
    assert!(String::from_utf8(sidecar).unwrap().contains("\"6\""));
}

/// The backup holds the tree exactly as it was before the switch.
#[tokio::test]
async fn test_backup_taken_before_switch() {
    let fixture = TargetFixture::new("2.3.0", "5");
    fixture.publish("2.3.0", "6", &[("a.txt", "NEW")]);
    let before = fixture.live_snapshot();

    let outcome = fixture.engine().perform_update().await;

    let UpdateOutcome::Updated {
        internal_version,
        backup: Some(backup),
    } = outcome
    else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert_eq!(internal_version, "6");
    assert_eq!(snapshot(&backup), before);
    assert_eq!(fixture.backups(), vec![backup]);
}

/// Mirror mode drops every file the manifest does not list.
#[tokio::test]
async fn test_mirror_update_removes_unlisted_files() {
    let mut fixture = TargetFixture::new("2.3.0", "5");
    fixture.config.staging_mode = StagingMode::Mirror;
    fixture.publish("2.3.0", "6", &[("a.txt", "NEW")]);

    let outcome = fixture.engine().perform_update().await;
    assert!(outcome.is_success(), "{outcome}");

    let files: Vec<PathBuf> = fixture.live_snapshot().into_keys().collect();
    assert_eq!(files, vec![PathBuf::from(DEFAULT_SIDECAR_FILE), PathBuf::from("a.txt")]);
    assert!(!fixture.root.join("inc").exists());
}

/// A digest mismatch aborts before anything live is touched.
#[tokio::test]
async fn test_integrity_mismatch_aborts_cleanly() {
    let fixture = TargetFixture::new("2.3.0", "5");
    fixture.publish_with_hash("2.3.0", "6", &[("a.txt", "NEW")], &"0".repeat(64));
    let before = fixture.live_snapshot();

    let outcome = fixture.engine().perform_update().await;

    assert!(matches!(outcome, UpdateOutcome::Aborted(UpdateError::Integrity { .. })), "{outcome:?}");
    assert_eq!(fixture.live_snapshot(), before);
    assert!(fixture.backups().is_empty());
    assert!(fixture.staging_dirs().is_empty());
    assert!(fixture.temp_dirs().is_empty());

    let store = fixture.progress_store();
    let record = store.load("theme").unwrap().unwrap();
    assert_eq!(record.percent, 100);
    assert!(record.is_error);
    assert!(record.message.contains("integrity check failed"), "{}", record.message);
    assert!(record.message.contains(&"0".repeat(64)), "{}", record.message);

    let status = store.load_status("theme").unwrap().unwrap();
    assert!(status.starts_with("Update failed: Package integrity check failed"), "{status}");
}

/// An archive that is not a zip file is an extraction failure, not a rollback.
#[tokio::test]
async fn test_corrupt_package_aborts() {
    let fixture = TargetFixture::new("2.3.0", "5");
    let body = b"not a zip archive";
    let hash = seamless_update::test_utils::sha256_hex(body);
    fixture.publish_raw("2.3.0", "6", &hash, &["a.txt"], body);

    let outcome = fixture.engine().perform_update().await;

    assert!(matches!(outcome, UpdateOutcome::Aborted(UpdateError::Extraction { .. })), "{outcome:?}");
    assert_eq!(fixture.read_live("a.txt"), "OLD");
    assert!(fixture.temp_dirs().is_empty());
}

/// With partial packages allowed, missing files keep their live content.
#[tokio::test]
async fn test_allow_partial_keeps_missing_files() {
    let mut fixture = TargetFixture::new("2.3.0", "5");
    fixture.config.allow_partial = true;
    fixture.publish_with_files("2.3.0", "6", &[("a.txt", "NEW")], &["a.txt", "keep.txt"]);

    let outcome = fixture.engine().perform_update().await;

    assert!(outcome.is_success(), "{outcome}");
    assert_eq!(fixture.read_live("a.txt"), "NEW");
    assert_eq!(fixture.read_live("keep.txt"), "KEEP");
}

/// An unreachable server aborts the attempt without touching anything.
#[tokio::test]
async fn test_unreachable_server_aborts() {
    let fixture = TargetFixture::new("2.3.0", "5");
    let before = fixture.live_snapshot();

    let outcome = fixture.engine().perform_update().await;

    assert!(
        matches!(outcome, UpdateOutcome::Aborted(UpdateError::Fetch(FetchError::Transport { .. }))),
        "{outcome:?}"
    );
    assert_eq!(fixture.live_snapshot(), before);
    assert!(fixture.temp_dirs().is_empty());
}

/// A manifest host outside the allow-list is refused before any request.
#[tokio::test]
async fn test_disallowed_host_aborts() {
    let mut fixture = TargetFixture::new("2.3.0", "5");
    fixture.publish("2.3.0", "6", &[("a.txt", "NEW")]);
    fixture.config.allowed_hosts = vec!["other.example.com".to_string()];

    let outcome = fixture.engine().perform_update().await;

    assert!(
        matches!(outcome, UpdateOutcome::Aborted(UpdateError::Fetch(FetchError::HostNotAllowed { .. }))),
        "{outcome:?}"
    );
    assert_eq!(fixture.read_live("a.txt"), "OLD");
    assert_eq!(fixture.http.request_count(), 0);
}
