//! CLI-level coverage for `gateway playbook run`, using a notification-only
//! playbook so the test never depends on an `aws`/`az`/`gcloud` binary
//! being present on PATH.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;

fn write_fixture(dir: &std::path::Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("write fixture");
    path
}

const PLAYBOOK_JSON: &str = r#"{
  "id": "NOTIFY-ONLY",
  "name": "Notify on finding",
  "requires_approval": false,
  "rollback_enabled": false,
  "actions": [
    { "name": "notify_team", "kind": "notification", "params": { "message": "bucket is public" } }
  ]
}"#;

const FINDING_JSON: &str = r#"{
  "id": "f1",
  "category": "storage",
  "severity": "high",
  "resource": "bucket/public-logs",
  "remediation_hint": null
}"#;

#[test]
fn run_completes_a_no_approval_playbook_and_prints_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    let playbook = write_fixture(dir.path(), "playbook.json", PLAYBOOK_JSON);
    let finding = write_fixture(dir.path(), "finding.json", FINDING_JSON);

    Command::cargo_bin("gateway")
        .expect("binary builds")
        .args([
            "playbook",
            "run",
            playbook.to_str().unwrap(),
            "--finding",
            finding.to_str().unwrap(),
            "--initiator",
            "alice",
            "--dry-run",
            "--json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"Completed\""))
        .stdout(predicate::str::contains("[DRY-RUN]"));
}

#[test]
fn history_on_a_fresh_process_is_always_empty() {
    Command::cargo_bin("gateway")
        .expect("binary builds")
        .args(["playbook", "history"])
        .assert()
        .success()
        .stdout(predicate::str::trim().eq("[]"));
}

#[test]
fn approve_on_an_unknown_execution_id_fails_with_an_explanation() {
    Command::cargo_bin("gateway")
        .expect("binary builds")
        .args(["playbook", "approve", "NOTIFY-ONLY-deadbeef", "--approver", "bob"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not known to this process"));
}
