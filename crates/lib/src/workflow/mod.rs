//! Workflow file loading and validation.

mod types;

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

pub use types::{BuildStep, EnvStep, WorkflowDef};

/// Errors that can occur while loading a workflow file.
#[derive(Debug, Error)]
pub enum WorkflowError {
  /// Workflow file not found.
  #[error("workflow file not found: {0}")]
  NotFound(PathBuf),

  /// Workflow file could not be read.
  #[error("failed to read workflow file: {0}")]
  Read(#[source] io::Error),

  /// Workflow file is not valid YAML or does not match the schema.
  #[error("failed to parse workflow file: {0}")]
  Parse(#[from] serde_yaml::Error),

  /// `name` is missing or blank.
  #[error("workflow has an empty name")]
  EmptyName,

  /// `build.command` is blank.
  #[error("workflow has an empty build command")]
  EmptyCommand,

  /// `runtime` matrix is empty.
  #[error("workflow declares no runtime versions")]
  NoRuntime,

  /// `build.max_attempts` is zero.
  #[error("workflow declares zero build attempts")]
  ZeroAttempts,
}

/// Load and validate a workflow file.
pub fn load_workflow(path: &Path) -> Result<WorkflowDef, WorkflowError> {
  if !path.exists() {
    return Err(WorkflowError::NotFound(path.to_path_buf()));
  }

  let content = std::fs::read_to_string(path).map_err(WorkflowError::Read)?;
  let workflow: WorkflowDef = serde_yaml::from_str(&content)?;

  validate(&workflow)?;

  debug!(
    name = %workflow.name,
    group = %workflow.group_key(),
    runtimes = workflow.runtime.len(),
    "workflow loaded"
  );

  Ok(workflow)
}

fn validate(workflow: &WorkflowDef) -> Result<(), WorkflowError> {
  if workflow.name.trim().is_empty() {
    return Err(WorkflowError::EmptyName);
  }
  if workflow.build.command.trim().is_empty() {
    return Err(WorkflowError::EmptyCommand);
  }
  if workflow.runtime.is_empty() {
    return Err(WorkflowError::NoRuntime);
  }
  if workflow.build.max_attempts == 0 {
    return Err(WorkflowError::ZeroAttempts);
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;
  use tempfile::TempDir;

  const FULL_WORKFLOW: &str = r#"
name: docs-upstream
ref: main
schedule: sun 00:00
runtime: ["3.11"]
env:
  spec: environment.yml
  upstream_install: ci/install-upstream.sh
build:
  command: make -C docs html
  timeout_minutes: 40
  max_attempts: 3
"#;

  fn write_workflow(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("workflow.yml");
    std::fs::write(&path, content).unwrap();
    path
  }

  #[test]
  fn parses_full_workflow() {
    let temp = TempDir::new().unwrap();
    let path = write_workflow(&temp, FULL_WORKFLOW);

    let workflow = load_workflow(&path).unwrap();
    assert_eq!(workflow.name, "docs-upstream");
    assert_eq!(workflow.group_key(), "docs-upstream/main");
    assert_eq!(workflow.runtime, vec!["3.11"]);
    assert_eq!(workflow.env.spec, PathBuf::from("environment.yml"));
    assert_eq!(
      workflow.env.upstream_install,
      Some(PathBuf::from("ci/install-upstream.sh"))
    );
    assert!(workflow.schedule.is_some());

    let policy = workflow.build.retry_policy();
    assert_eq!(policy.timeout, Duration::from_secs(40 * 60));
    assert_eq!(policy.max_attempts, 3);
  }

  #[test]
  fn defaults_apply() {
    let temp = TempDir::new().unwrap();
    let path = write_workflow(
      &temp,
      "name: docs\nruntime: [\"3.11\"]\nenv:\n  spec: environment.yml\nbuild:\n  command: make html\n",
    );

    let workflow = load_workflow(&path).unwrap();
    assert_eq!(workflow.git_ref, "main");
    assert!(workflow.schedule.is_none());
    assert!(workflow.env.upstream_install.is_none());
    assert_eq!(workflow.build.timeout_minutes, 40);
    assert_eq!(workflow.build.max_attempts, 3);
  }

  #[test]
  fn missing_file_is_not_found() {
    let result = load_workflow(Path::new("/nonexistent/workflow.yml"));
    assert!(matches!(result, Err(WorkflowError::NotFound(_))));
  }

  #[test]
  fn empty_runtime_rejected() {
    let temp = TempDir::new().unwrap();
    let path = write_workflow(
      &temp,
      "name: docs\nruntime: []\nenv:\n  spec: environment.yml\nbuild:\n  command: make html\n",
    );

    assert!(matches!(load_workflow(&path), Err(WorkflowError::NoRuntime)));
  }

  #[test]
  fn blank_command_rejected() {
    let temp = TempDir::new().unwrap();
    let path = write_workflow(
      &temp,
      "name: docs\nruntime: [\"3.11\"]\nenv:\n  spec: environment.yml\nbuild:\n  command: \"  \"\n",
    );

    assert!(matches!(load_workflow(&path), Err(WorkflowError::EmptyCommand)));
  }

  #[test]
  fn zero_attempts_rejected() {
    let temp = TempDir::new().unwrap();
    let path = write_workflow(
      &temp,
      "name: docs\nruntime: [\"3.11\"]\nenv:\n  spec: environment.yml\nbuild:\n  command: make html\n  max_attempts: 0\n",
    );

    assert!(matches!(load_workflow(&path), Err(WorkflowError::ZeroAttempts)));
  }

  #[test]
  fn bad_schedule_is_parse_error() {
    let temp = TempDir::new().unwrap();
    let path = write_workflow(
      &temp,
      "name: docs\nschedule: whenever\nruntime: [\"3.11\"]\nenv:\n  spec: environment.yml\nbuild:\n  command: make html\n",
    );

    assert!(matches!(load_workflow(&path), Err(WorkflowError::Parse(_))));
  }
}
