//! Integration tests for backup retention.

use seamless_update::constants::DEFAULT_SIDECAR_FILE;
use seamless_update::test_utils::TargetFixture;
use seamless_update::update::UpdateOutcome;

/// Repeated updates never leave more than `backups_to_keep` backups, and the
/// newest backup holds the tree of the previous release.
#[tokio::test]
async fn test_retention_bound_over_many_updates() {
    let mut fixture = TargetFixture::new("2.3.0", "5");
    fixture.config.backups_to_keep = 2;

    for internal in 6..=9 {
        let content = format!("v{internal}");
        fixture.publish("2.3.0", &internal.to_string(), &[("a.txt", content.as_str())]);

        let outcome = fixture.engine().perform_update().await;

        assert!(matches!(outcome, UpdateOutcome::Updated { .. }), "{outcome:?}");
        assert_eq!(fixture.read_live("a.txt"), content);
        assert!(fixture.backups().len() <= 2);
    }

    let backups = fixture.backups();
    assert_eq!(backups.len(), 2);
    let newest = backups.iter().max().unwrap();
    assert_eq!(std::fs::read_to_string(newest.join("a.txt")).unwrap(), "v8");
    let sidecar = std::fs::read_to_string(newest.join(DEFAULT_SIDECAR_FILE)).unwrap();
    assert!(sidecar.contains("\"8\""));
}

/// With retention at zero no backup is taken and existing ones are kept.
#[tokio::test]
async fn test_zero_retention_skips_backup() {
    let mut fixture = TargetFixture::new("2.3.0", "5");
    fixture.config.backups_to_keep = 0;
    let stale = fixture.work_root.join("backups/theme-1000");
    std::fs::create_dir_all(&stale).unwrap();
    fixture.publish("2.3.0", "6", &[("a.txt", "NEW")]);

    let outcome = fixture.engine().perform_update().await;

    assert!(
        matches!(
            outcome,
            UpdateOutcome::Updated {
                backup: None,
                ..
            }
        ),
        "{outcome:?}"
    );
    assert_eq!(fixture.read_live("a.txt"), "NEW");
    assert_eq!(fixture.backups(), vec![stale]);
}

/// Backups of other targets sharing the work root are never pruned.
#[tokio::test]
async fn test_prune_ignores_other_targets() {
    let mut fixture = TargetFixture::new("2.3.0", "5");
    fixture.config.backups_to_keep = 1;
    let foreign = fixture.work_root.join("backups/theme-child-1000");
    std::fs::create_dir_all(&foreign).unwrap();

    for internal in ["6", "7"] {
        fixture.publish("2.3.0", internal, &[("a.txt", internal)]);
        let outcome = fixture.engine().perform_update().await;
        assert!(outcome.is_success(), "{outcome}");
    }

    assert!(foreign.exists());
    let own: Vec<_> = fixture.backups().into_iter().filter(|p| *p != foreign).collect();
    assert_eq!(own.len(), 1);
}
