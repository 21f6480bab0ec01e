use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// The binary with an empty config and no inherited overrides.
fn autopilot() -> Command {
    let mut cmd = Command::cargo_bin("autopilot").unwrap();
    cmd.env_remove("AUTOPILOT_DEVICE")
        .env_remove("AUTOPILOT_RUN_ID")
        .env_remove("AUTOPILOT_STORE")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(fixture_path("config.json"));
    cmd
}

fn run_script(name: &str) -> Command {
    let mut cmd = autopilot();
    cmd.arg("run")
        .arg(fixture_path(name))
        .arg("--scene")
        .arg(fixture_path("scene.json"))
        .arg("--fast");
    cmd
}

#[test]
fn test_help_exits_zero() {
    Command::cargo_bin("autopilot")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("autopilot"));
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

#[test]
fn test_run_passing_script() {
    run_script("login.yaml")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "PASS login: 2 passed, 0 failed, 0 error(s)",
        ));
}

#[test]
fn test_run_json_summary() {
    let assert = run_script("login.yaml").arg("--json").assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let summary: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(summary["test_name"], "login");
    assert_eq!(summary["steps_passed"], 2);
    assert_eq!(summary["status"], "finished");
}

#[test]
fn test_run_writes_report() {
    let dir = tempfile::tempdir().unwrap();
    run_script("login.yaml")
        .arg("--report-dir")
        .arg(dir.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Report:"));

    let reports: Vec<PathBuf> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(reports.len(), 1);
    let text = std::fs::read_to_string(&reports[0]).unwrap();
    assert!(text.lines().count() > 2);
    assert!(text.contains("\"name typed\""));
    assert!(text.contains("\"score reset\""));
}

#[test]
fn test_run_failed_assertion_exits_one() {
    run_script("wrong_name.yaml")
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "FAIL wrong name: 0 passed, 1 failed, 0 error(s)",
        ))
        .stderr(predicate::str::contains("Test failed: 1 failed step(s)"));
}

#[test]
fn test_run_unknown_action_is_reported() {
    run_script("unknown_action.yaml")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("FAIL unknown_action:"))
        .stdout(predicate::str::contains("1 error(s)"));
}

#[test]
fn test_run_without_actions_exits_two() {
    run_script("no_actions.yaml")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Parse error"))
        .stderr(predicate::str::contains("no actions"));
}

#[test]
fn test_run_missing_script_exits_four() {
    run_script("does_not_exist.yaml")
        .assert()
        .code(4)
        .stderr(predicate::str::contains("IO error"));
}

#[test]
fn test_run_missing_scene_exits_three() {
    autopilot()
        .arg("run")
        .arg(fixture_path("login.yaml"))
        .arg("--scene")
        .arg(fixture_path("missing_scene.json"))
        .arg("--fast")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("cannot load scene"));
}

#[test]
fn test_run_time_limit_aborts() {
    run_script("stuck.yaml")
        .args(["--device", "helper1", "--max-seconds", "1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("aborted: run exceeded 1 seconds"));
}

#[test]
fn test_run_rejects_zero_fps() {
    run_script("login.yaml").args(["--fps", "0"]).assert().failure();
}

// ---------------------------------------------------------------------------
// store / state
// ---------------------------------------------------------------------------

#[test]
fn test_store_set_then_get() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("store.redb");

    autopilot()
        .arg("store")
        .arg("--store")
        .arg(&store)
        .args(["set", "r1/multiplayer/master", "ready"])
        .assert()
        .success();

    autopilot()
        .arg("store")
        .arg("--store")
        .arg(&store)
        .args(["get", "r1/multiplayer/master"])
        .assert()
        .success()
        .stdout("ready\n");
}

#[test]
fn test_store_get_missing_key() {
    let dir = tempfile::tempdir().unwrap();
    autopilot()
        .arg("store")
        .arg("--store")
        .arg(dir.path().join("store.redb"))
        .args(["get", "nothing/here"])
        .assert()
        .success()
        .stdout("not_found\n");
}

#[test]
fn test_run_announces_state_to_shared_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("store.redb");

    run_script("login.yaml")
        .arg("--store")
        .arg(&store)
        .args(["--run-id", "r7", "--device", "phone"])
        .assert()
        .success();

    autopilot()
        .args(["state", "phone", "--run-id", "r7"])
        .arg("--store")
        .arg(&store)
        .assert()
        .success()
        .stdout("done\n");

    autopilot()
        .arg("store")
        .arg("--store")
        .arg(&store)
        .args(["get", "r7/log/phone/0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"test_start\""));
}

#[test]
fn test_state_requires_run_id() {
    let dir = tempfile::tempdir().unwrap();
    autopilot()
        .args(["state", "master"])
        .arg("--store")
        .arg(dir.path().join("store.redb"))
        .assert()
        .code(3)
        .stderr(predicate::str::contains("no run id"));
}
