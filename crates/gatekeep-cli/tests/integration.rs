#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn gatekeep(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("gatekeep").unwrap();
    cmd.current_dir(dir.path()).env("GATEKEEP_ROOT", dir.path());
    cmd
}

fn write_config(dir: &TempDir, yaml: &str) {
    std::fs::create_dir_all(dir.path().join(".gatekeep")).unwrap();
    std::fs::write(dir.path().join(".gatekeep/config.yaml"), yaml).unwrap();
}

const CONFIG: &str = r#"
gates:
  green:
    description: everything passes
    steps:
      - name: typecheck
        command: echo typecheck ok
      - name: lint
        command: "true"
      - name: test
        command: "true"
      - name: build
        command: touch built.txt
  red:
    steps:
      - name: typecheck
        command: "true"
      - name: lint
        command: "echo 'lint: 2 problems' >&2; exit 1"
      - name: test
        command: touch test-ran.txt
  silent-fail:
    steps:
      - name: quiet
        command: "false"
  fallback:
    steps:
      - name: check
        command: definitely-not-a-real-command-xyz
        fallback: echo used fallback
  branch:
    vars:
      base: main
    steps:
      - name: echo
        command: "echo {{branch}} from {{base}}"
"#;

// ---------------------------------------------------------------------------
// gatekeep init
// ---------------------------------------------------------------------------

#[test]
fn init_writes_default_config() {
    let dir = TempDir::new().unwrap();
    gatekeep(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("validate"));

    let content = std::fs::read_to_string(dir.path().join(".gatekeep/config.yaml")).unwrap();
    assert!(content.contains("sync-main"));
    assert!(content.contains("npm run typecheck"));
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, CONFIG);
    gatekeep(&dir)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already initialized"));

    gatekeep(&dir).args(["init", "--force"]).assert().success();
    let content = std::fs::read_to_string(dir.path().join(".gatekeep/config.yaml")).unwrap();
    assert!(!content.contains("silent-fail"));
}

#[test]
fn default_config_validates_with_only_warnings() {
    let dir = TempDir::new().unwrap();
    gatekeep(&dir).arg("init").assert().success();
    gatekeep(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[warning]"))
        .stdout(predicate::str::contains("[error]").not());
}

// ---------------------------------------------------------------------------
// gatekeep list / show
// ---------------------------------------------------------------------------

#[test]
fn commands_before_init_fail() {
    let dir = TempDir::new().unwrap();
    gatekeep(&dir)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

#[test]
fn list_shows_gates() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, CONFIG);
    gatekeep(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("green"))
        .stdout(predicate::str::contains("everything passes"));
}

#[test]
fn list_json() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, CONFIG);
    let out = gatekeep(&dir).args(["list", "--json"]).output().unwrap();
    assert!(out.status.success());
    let gates: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let branch = gates
        .as_array()
        .unwrap()
        .iter()
        .find(|g| g["name"] == "branch")
        .unwrap();
    assert_eq!(branch["required_vars"], serde_json::json!(["branch"]));
}

#[test]
fn show_lists_steps_in_order() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, CONFIG);
    gatekeep(&dir)
        .args(["show", "red"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"(?s)typecheck.*lint.*test").unwrap());
}

#[test]
fn show_unknown_gate_fails() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, CONFIG);
    gatekeep(&dir)
        .args(["show", "deploy"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("gate not found: deploy"));
}

// ---------------------------------------------------------------------------
// gatekeep run
// ---------------------------------------------------------------------------

#[test]
fn run_all_passing_exits_zero() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, CONFIG);
    gatekeep(&dir)
        .args(["run", "green"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[4/4] build ... passed"))
        .stdout(predicate::str::contains("all 4 steps passed"));
    assert!(dir.path().join("built.txt").exists());
}

#[test]
fn run_halts_at_first_failure() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, CONFIG);
    gatekeep(&dir)
        .args(["run", "red"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("lint: 2 problems"))
        .stderr(predicate::str::contains(
            "gate 'red' halted at step 2 (lint)",
        ));
    assert!(!dir.path().join("test-ran.txt").exists());
}

#[test]
fn run_json_reports_outcome() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, CONFIG);
    let out = gatekeep(&dir)
        .args(["run", "red", "--json"])
        .output()
        .unwrap();
    assert!(!out.status.success());
    let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["outcome"]["status"], "halted_at_step");
    assert_eq!(report["outcome"]["index"], 2);
    let results = report["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["outcome"], "passed");
    assert_eq!(results[1]["outcome"], "failed");
}

#[test]
fn failing_step_without_output_still_fails() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, CONFIG);
    gatekeep(&dir)
        .args(["run", "silent-fail"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("halted at step 1 (quiet)"));
}

#[test]
fn run_uses_fallback_when_primary_missing() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, CONFIG);
    gatekeep(&dir)
        .args(["run", "fallback", "--verbose"])
        .assert()
        .success()
        .stdout(predicate::str::contains("passed via fallback"))
        .stdout(predicate::str::contains("used fallback"));
}

#[test]
fn run_substitutes_vars() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, CONFIG);
    gatekeep(&dir)
        .args(["run", "branch", "--var", "branch=feat/login", "-v"])
        .assert()
        .success()
        .stdout(predicate::str::contains("feat/login from main"));
}

#[test]
fn run_missing_var_fails_before_running() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, CONFIG);
    gatekeep(&dir)
        .args(["run", "branch"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--var branch="));
    assert!(!dir.path().join(".gatekeep/runs/branch.json").exists());
}

#[test]
fn dry_run_executes_nothing() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, CONFIG);
    gatekeep(&dir)
        .args(["run", "green", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("touch built.txt"));
    assert!(!dir.path().join("built.txt").exists());
    assert!(!dir.path().join(".gatekeep/runs/green.json").exists());
}

// ---------------------------------------------------------------------------
// gatekeep last
// ---------------------------------------------------------------------------

#[test]
fn last_shows_recorded_run() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, CONFIG);
    gatekeep(&dir).args(["run", "red"]).assert().failure();
    assert!(dir.path().join(".gatekeep/runs/red.json").exists());

    gatekeep(&dir)
        .args(["last", "red"])
        .assert()
        .success()
        .stdout(predicate::str::contains("halted at step 2 (lint)"));
}

#[test]
fn last_without_runs() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, CONFIG);
    gatekeep(&dir)
        .args(["last", "green"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No recorded run"));
}

#[test]
fn rust_log_enables_debug_output() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, CONFIG);
    gatekeep(&dir)
        .args(["run", "green"])
        .env("RUST_LOG", "debug")
        .assert()
        .success()
        .stderr(predicate::str::contains("starting step"));
}

#[test]
fn debug_output_is_off_by_default() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, CONFIG);
    gatekeep(&dir)
        .args(["run", "green"])
        .env_remove("RUST_LOG")
        .assert()
        .success()
        .stderr(predicate::str::contains("starting step").not());
}

#[test]
fn last_rejects_inconsistent_history() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, CONFIG);
    std::fs::create_dir_all(dir.path().join(".gatekeep/runs")).unwrap();
    std::fs::write(
        dir.path().join(".gatekeep/runs/red.json"),
        r#"{"gate":"red","outcome":{"status":"halted_at_step","index":0},
           "results":[{"index":1,"step":"lint","outcome":"failed","output":""}],
           "started_at":"2026-01-01T00:00:00Z","duration_ms":0}"#,
    )
    .unwrap();
    gatekeep(&dir)
        .args(["last", "red"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn no_save_skips_history() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, CONFIG);
    gatekeep(&dir)
        .args(["run", "green", "--no-save"])
        .assert()
        .success();
    assert!(!dir.path().join(".gatekeep/runs/green.json").exists());
}

// ---------------------------------------------------------------------------
// gatekeep config validate
// ---------------------------------------------------------------------------

#[test]
fn config_validate_fails_on_errors() {
    let dir = TempDir::new().unwrap();
    write_config(
        &dir,
        "gates:\n  broken:\n    steps:\n      - name: a\n        command: \"true\"\n      - name: a\n        command: \"true\"\n",
    );
    gatekeep(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("defined more than once"));
}
