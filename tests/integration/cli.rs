//! Integration tests for the command-line interface.
//!
//! None of these commands reach the network.

use assert_cmd::Command;
use predicates::prelude::*;
use seamless_update::test_utils::TargetFixture;
use chrono::Utc;
use seamless_update::update::{ProgressRecord, ProgressStore, RESET_STATUS};
use tempfile::TempDir;

fn cli() -> Command {
    let mut cmd = Command::cargo_bin("seamless-update").unwrap();
    cmd.env_remove("RUST_LOG").env("SEAMLESS_UPDATE_NO_PROGRESS", "1");
    cmd
}

#[test]
fn test_init_writes_example_and_refuses_overwrite() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");

    cli().arg("--config").arg(&path).arg("init").assert().success();
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("update_url"));
    assert!(written.contains("my-theme"));

    cli()
        .arg("--config")
        .arg(&path)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    cli().arg("--config").arg(&path).args(["init", "--force"]).assert().success();
}

#[test]
fn test_progress_json_when_idle() {
    let fixture = TargetFixture::new("2.3.0", "5");
    let config = fixture.write_config();

    cli()
        .arg("--config")
        .arg(&config)
        .args(["progress", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"percent\": -1"))
        .stdout(predicate::str::contains("No update in progress"));
}

#[test]
fn test_status_prints_last_line() {
    let fixture = TargetFixture::new("2.3.0", "5");
    let config = fixture.write_config();

    cli()
        .arg("--config")
        .arg(&config)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No status recorded for theme"));

    fixture.progress_store().save_status("theme", "Up to date (2.3.0 / 5)").unwrap();

    cli()
        .arg("--config")
        .arg(&config)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Up to date (2.3.0 / 5)"));
}

#[test]
fn test_reset_clears_failed_attempt() {
    let fixture = TargetFixture::new("2.3.0", "5");
    let config = fixture.write_config();
    let store = fixture.progress_store();
    store
        .save(
            "theme",
            &ProgressRecord {
                message: "Update failed: connection refused".to_string(),
                percent: 100,
                is_error: true,
                timestamp: Utc::now(),
            },
        )
        .unwrap();
    store.save_status("theme", "Update failed: connection refused").unwrap();

    cli()
        .arg("--config")
        .arg(&config)
        .arg("reset")
        .assert()
        .success()
        .stdout(predicate::str::contains("Status reset for theme"));

    cli()
        .arg("--config")
        .arg(&config)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains(RESET_STATUS));

    cli()
        .arg("--config")
        .arg(&config)
        .args(["progress", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"percent\": -1"))
        .stdout(predicate::str::contains("\"is_error\": false"));
}

#[test]
fn test_backups_lists_newest_first() {
    let fixture = TargetFixture::new("2.3.0", "5");
    let config = fixture.write_config();

    cli()
        .arg("--config")
        .arg(&config)
        .args(["backups", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("[]"));

    for ts in ["1700000000000", "1700000500000"] {
        std::fs::create_dir_all(fixture.work_root.join(format!("backups/theme-{ts}"))).unwrap();
    }

    let output = cli().arg("--config").arg(&config).arg("backups").assert().success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).to_string();
    let newer = stdout.find("theme-1700000500000").unwrap();
    let older = stdout.find("theme-1700000000000").unwrap();
    assert!(newer < older, "{stdout}");
    assert!(stdout.contains("2 backup(s)"));
}

#[test]
fn test_cleanup_all_removes_working_dirs() {
    let fixture = TargetFixture::new("2.3.0", "5");
    let config = fixture.write_config();
    let leftover = fixture.work_root.join("staging-theme-1700000000000");
    let backup = fixture.work_root.join("backups/theme-1700000000000");
    std::fs::create_dir_all(&leftover).unwrap();
    std::fs::create_dir_all(&backup).unwrap();

    cli()
        .arg("--config")
        .arg(&config)
        .args(["cleanup", "--all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed"));

    assert!(!leftover.exists());
    assert!(backup.exists());
}

#[test]
fn test_update_without_url_fails() {
    let mut fixture = TargetFixture::new("2.3.0", "5");
    fixture.config.update_url = None;
    let config = fixture.write_config();

    cli()
        .arg("--config")
        .arg(&config)
        .arg("update")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("update_url"));
}

#[test]
fn test_missing_config_fails() {
    let temp = TempDir::new().unwrap();

    cli()
        .arg("--config")
        .arg(temp.path().join("absent.toml"))
        .arg("status")
        .assert()
        .code(1);
}
