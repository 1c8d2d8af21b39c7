use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn nowtask(data: &Path) -> Command {
    let mut cmd = Command::cargo_bin("nowtask").expect("binary built");
    cmd.env("NOWTASKRC", "/dev/null")
        .env("NOWTASK_TIMEZONE", "UTC")
        .env_remove("RUST_LOG")
        .arg("--data")
        .arg(data);
    cmd
}

fn created_id(stdout: &[u8]) -> String {
    let text = String::from_utf8_lossy(stdout);
    text.trim()
        .strip_prefix("Created task ")
        .and_then(|rest| rest.strip_suffix('.'))
        .expect("created message")
        .to_string()
}

#[test]
fn add_list_and_complete() {
    let temp = tempdir().expect("tempdir");

    let out = nowtask(temp.path())
        .args(["add", "Buy", "milk", "--due", "2099-01-01"])
        .output()
        .expect("run add");
    assert!(out.status.success());
    let id = created_id(&out.stdout);

    nowtask(temp.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Buy milk"))
        .stdout(predicate::str::contains("Thu Jan 1"));

    nowtask(temp.path())
        .args(["done", &id[..8]])
        .assert()
        .success()
        .stdout(predicate::str::contains("Completed task"));

    nowtask(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No open tasks."));
}

#[test]
fn gauge_reports_committed_time_and_hour_slot() {
    let temp = tempdir().expect("tempdir");

    nowtask(temp.path())
        .args([
            "add", "Standup", "--due", "2099-01-01", "--start", "09:00", "--end", "10:00",
        ])
        .assert()
        .success();

    nowtask(temp.path())
        .args(["gauge", "--date", "2099-01-01", "--hour", "9"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("1/1 (Thu) (2099-01-01)"))
        .stdout(predicate::str::contains("committed 1h  free 23h  from 00:00"))
        .stdout(predicate::str::contains("runs      09:00-10:00"))
        .stdout(predicate::str::contains("09:00-10:00\n  "))
        .stdout(predicate::str::contains("Standup"));
}

#[test]
fn move_under_own_subtask_is_rejected() {
    let temp = tempdir().expect("tempdir");

    let out = nowtask(temp.path())
        .args(["add", "Parent"])
        .output()
        .expect("run add");
    let parent = created_id(&out.stdout);

    nowtask(temp.path())
        .args(["add", "Child", "--parent", &parent])
        .assert()
        .success();

    nowtask(temp.path())
        .args(["move", &parent, "--position", "1", "--level", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Move rejected (cycle)"));

    nowtask(temp.path())
        .args(["list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("  Child"));
}

#[test]
fn blank_titles_fail_with_an_error() {
    let temp = tempdir().expect("tempdir");

    nowtask(temp.path())
        .args(["add", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error: task title cannot be empty"));
}
