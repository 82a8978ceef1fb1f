//! CLI smoke tests for vigil.
//!
//! These tests verify that all CLI commands run without panicking and
//! return appropriate exit codes.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serial_test::serial;
use tempfile::TempDir;

/// Get a Command for the vigil binary.
fn vigil_cmd() -> Command {
  cargo_bin_cmd!("vigil")
}

/// Minimal dependency spec: named environment, nothing to install.
const MINIMAL_SPEC: &str = "name: docs\ndependencies: []\n";

/// Create a temp directory with a workflow file and matching spec.
///
/// `command` is embedded verbatim; callers pass simple `exit N` commands
/// that work in both sh and powershell.
fn temp_workflow(command: &str) -> TempDir {
  let temp = TempDir::new().unwrap();
  std::fs::write(temp.path().join("environment.yml"), MINIMAL_SPEC).unwrap();
  std::fs::write(
    temp.path().join("workflow.yml"),
    format!(
      "name: docs-upstream\nref: main\nschedule: sun 00:00\nruntime: [\"3.11\"]\nenv:\n  spec: environment.yml\nbuild:\n  command: {}\n  timeout_minutes: 1\n  max_attempts: 2\n",
      command
    ),
  )
  .unwrap();
  temp
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  vigil_cmd()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  vigil_cmd()
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("vigil"));
}

#[test]
fn subcommand_help_works() {
  for cmd in &["run", "plan", "provision", "watch", "status"] {
    vigil_cmd()
      .arg(cmd)
      .arg("--help")
      .assert()
      .success()
      .stdout(predicate::str::contains("Usage"));
  }
}

// =============================================================================
// plan
// =============================================================================

#[test]
#[serial]
fn plan_prints_workflow_summary() {
  let temp = temp_workflow("exit 0");

  vigil_cmd()
    .arg("plan")
    .arg(temp.path().join("workflow.yml"))
    .env("VIGIL_DATA_DIR", temp.path().join("data"))
    .assert()
    .success()
    .stdout(predicate::str::contains("docs-upstream"))
    .stdout(predicate::str::contains("Next fire"))
    .stdout(predicate::str::contains("Max attempts"));
}

#[test]
#[serial]
fn plan_nonexistent_workflow_fails() {
  let temp = TempDir::new().unwrap();

  vigil_cmd()
    .arg("plan")
    .arg("/nonexistent/workflow.yml")
    .env("VIGIL_DATA_DIR", temp.path().join("data"))
    .assert()
    .failure();
}

#[test]
#[serial]
fn plan_rejects_empty_runtime_matrix() {
  let temp = TempDir::new().unwrap();
  std::fs::write(temp.path().join("environment.yml"), MINIMAL_SPEC).unwrap();
  std::fs::write(
    temp.path().join("workflow.yml"),
    "name: docs\nruntime: []\nenv:\n  spec: environment.yml\nbuild:\n  command: exit 0\n",
  )
  .unwrap();

  vigil_cmd()
    .arg("plan")
    .arg(temp.path().join("workflow.yml"))
    .env("VIGIL_DATA_DIR", temp.path().join("data"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("runtime"));
}

// =============================================================================
// run
// =============================================================================

#[test]
#[serial]
fn run_succeeding_build() {
  let temp = temp_workflow("exit 0");

  vigil_cmd()
    .arg("run")
    .arg(temp.path().join("workflow.yml"))
    .env("VIGIL_DATA_DIR", temp.path().join("data"))
    .assert()
    .success()
    .stdout(predicate::str::contains("Run complete"));
}

#[test]
#[serial]
fn run_failing_build_exits_nonzero() {
  let temp = temp_workflow("exit 1");

  vigil_cmd()
    .arg("run")
    .arg(temp.path().join("workflow.yml"))
    .env("VIGIL_DATA_DIR", temp.path().join("data"))
    .assert()
    .failure()
    .stdout(predicate::str::contains("attempt 2"));
}

#[test]
#[serial]
fn run_nonexistent_workflow_fails() {
  let temp = TempDir::new().unwrap();

  vigil_cmd()
    .arg("run")
    .arg("/nonexistent/workflow.yml")
    .env("VIGIL_DATA_DIR", temp.path().join("data"))
    .assert()
    .failure();
}

#[test]
#[serial]
fn run_accepts_retry_overrides() {
  let temp = temp_workflow("exit 0");

  vigil_cmd()
    .arg("run")
    .arg(temp.path().join("workflow.yml"))
    .args(["--timeout", "30s", "--max-attempts", "1"])
    .env("VIGIL_DATA_DIR", temp.path().join("data"))
    .assert()
    .success();
}

// =============================================================================
// provision
// =============================================================================

#[test]
#[serial]
fn provision_creates_prefix() {
  let temp = temp_workflow("exit 0");

  vigil_cmd()
    .arg("provision")
    .arg(temp.path().join("workflow.yml"))
    .env("VIGIL_DATA_DIR", temp.path().join("data"))
    .assert()
    .success()
    .stdout(predicate::str::contains("docs-3.11"));

  assert!(temp.path().join("data").join("envs").join("docs-3.11").is_dir());
}

// =============================================================================
// watch
// =============================================================================

#[test]
#[serial]
fn watch_requires_a_schedule() {
  let temp = TempDir::new().unwrap();
  std::fs::write(temp.path().join("environment.yml"), MINIMAL_SPEC).unwrap();
  std::fs::write(
    temp.path().join("workflow.yml"),
    "name: docs\nruntime: [\"3.11\"]\nenv:\n  spec: environment.yml\nbuild:\n  command: exit 0\n",
  )
  .unwrap();

  vigil_cmd()
    .arg("watch")
    .arg(temp.path().join("workflow.yml"))
    .env("VIGIL_DATA_DIR", temp.path().join("data"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("no schedule"));
}

// =============================================================================
// status
// =============================================================================

#[test]
#[serial]
fn status_with_no_runs() {
  let temp = TempDir::new().unwrap();

  vigil_cmd()
    .arg("status")
    .env("VIGIL_DATA_DIR", temp.path().join("data"))
    .assert()
    .success()
    .stdout(predicate::str::contains("No runs"));
}

#[test]
#[serial]
fn status_reports_last_run() {
  let temp = temp_workflow("exit 0");
  let data = temp.path().join("data");

  vigil_cmd()
    .arg("run")
    .arg(temp.path().join("workflow.yml"))
    .env("VIGIL_DATA_DIR", &data)
    .assert()
    .success();

  vigil_cmd()
    .arg("status")
    .env("VIGIL_DATA_DIR", &data)
    .assert()
    .success()
    .stdout(predicate::str::contains("succeeded"));

  vigil_cmd()
    .arg("status")
    .arg("--json")
    .env("VIGIL_DATA_DIR", &data)
    .assert()
    .success()
    .stdout(predicate::str::contains("\"state\": \"succeeded\""));
}
