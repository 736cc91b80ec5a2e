//! Integration tests for failures after the live tree was backed up.

use seamless_update::core::{Stage, UpdateError};
use seamless_update::test_utils::{FaultyFs, FsOp, TargetFixture, snapshot};
use seamless_update::update::{ProgressStore, RollbackStatus, UpdateOutcome};
use std::sync::Arc;

/// A failed switch restores the backup into the live root.
#[tokio::test]
async fn test_switch_failure_restores_backup() {
    let fixture = TargetFixture::new("2.3.0", "5");
    fixture.publish("2.3.0", "6", &[("a.txt", "NEW")]);
    let before = fixture.live_snapshot();
    let fs = FaultyFs::new().fail_on(FsOp::Rename, "staging-");

    let outcome = fixture.engine_with_fs(Arc::new(fs)).perform_update().await;

    let UpdateOutcome::RolledBack {
        cause,
        status,
    } = outcome
    else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert!(matches!(
        cause,
        UpdateError::Filesystem {
            stage: Stage::Switching,
            ..
        }
    ));
    assert_eq!(status, RollbackStatus::RolledBackSuccess);
    assert_eq!(fixture.live_snapshot(), before);

    let backups = fixture.backups();
    assert_eq!(backups.len(), 1);
    assert_eq!(snapshot(&backups[0]), before);
    assert!(fixture.staging_dirs().is_empty());
    assert!(fixture.temp_dirs().is_empty());

    let record = fixture.progress_store().load("theme").unwrap().unwrap();
    assert!(record.is_error);
    assert_eq!(record.percent, 100);
}

/// When the backup cannot be restored the outcome is critical and the
/// backup is left in place for manual recovery.
#[tokio::test]
async fn test_failed_restore_is_critical() {
    let fixture = TargetFixture::new("2.3.0", "5");
    fixture.publish("2.3.0", "6", &[("a.txt", "NEW")]);
    let before = fixture.live_snapshot();
    let fs = Arc::new(
        FaultyFs::new()
            .fail_on(FsOp::Rename, "staging-")
            .fail_on(FsOp::CopyDir, "backups"),
    );

    let outcome = fixture.engine_with_fs(fs.clone()).perform_update().await;

    assert!(outcome.is_critical(), "{outcome:?}");
    assert!(matches!(
        outcome,
        UpdateOutcome::RolledBack {
            status: RollbackStatus::CriticalManualInterventionRequired,
            ..
        }
    ));
    // backup, staging clone, then three restore attempts
    assert_eq!(fs.calls(FsOp::CopyDir), 5);

    let backups = fixture.backups();
    assert_eq!(backups.len(), 1);
    assert_eq!(snapshot(&backups[0]), before);
}

/// A failed backup rolls back without a backup to restore, leaving the live
/// tree as it was.
#[tokio::test]
async fn test_backup_failure_leaves_live_untouched() {
    let fixture = TargetFixture::new("2.3.0", "5");
    fixture.publish("2.3.0", "6", &[("a.txt", "NEW")]);
    let before = fixture.live_snapshot();
    let fs = FaultyFs::new().fail_on(FsOp::CreateDirAll, "backups");

    let outcome = fixture.engine_with_fs(Arc::new(fs)).perform_update().await;

    assert!(
        matches!(
            outcome,
            UpdateOutcome::RolledBack {
                cause: UpdateError::Filesystem {
                    stage: Stage::BackingUp,
                    ..
                },
                status: RollbackStatus::RolledBackSkippedNoBackup,
            }
        ),
        "{outcome:?}"
    );
    assert_eq!(fixture.live_snapshot(), before);
    assert!(fixture.backups().is_empty());
    assert!(fixture.staging_dirs().is_empty());
}
