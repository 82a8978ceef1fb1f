//! Workflow definition types.
//!
//! A workflow file is a YAML document describing one job:
//!
//! ```yaml
//! name: docs-upstream
//! ref: main
//! schedule: sun 00:00
//! runtime: ["3.11"]
//! env:
//!   spec: environment.yml
//!   upstream_install: ci/install-upstream.sh
//! build:
//!   command: make -C docs html
//!   timeout_minutes: 40
//!   max_attempts: 3
//! ```
//!
//! Relative paths (`env.spec`, `env.upstream_install`) resolve against the
//! directory containing the workflow file, which also becomes the working
//! directory for the build command.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::runner::RetryPolicy;
use crate::schedule::Schedule;

fn default_ref() -> String {
  "main".to_string()
}

fn default_timeout_minutes() -> u64 {
  40
}

fn default_max_attempts() -> u32 {
  3
}

/// A complete workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDef {
  /// Workflow name; combined with `ref` to form the concurrency-group key.
  pub name: String,

  /// Branch/ref label. Defaults to `main`.
  #[serde(default = "default_ref", rename = "ref")]
  pub git_ref: String,

  /// Weekly fire time. Absent for manual-only workflows.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub schedule: Option<Schedule>,

  /// Matrix of runtime-version strings; jobs run once per entry, in order.
  pub runtime: Vec<String>,

  /// Environment provisioning inputs.
  pub env: EnvStep,

  /// Build command and retry bounds.
  pub build: BuildStep,
}

impl WorkflowDef {
  /// The concurrency-group key: at most one run per key at a time.
  pub fn group_key(&self) -> String {
    format!("{}/{}", self.name, self.git_ref)
  }
}

/// Provisioning inputs for the environment stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvStep {
  /// Path to the dependency-specification file.
  pub spec: PathBuf,

  /// Path to the upstream-dev install script, run after base provisioning.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub upstream_install: Option<PathBuf>,
}

/// The build command and its retry bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildStep {
  /// Command run through the shell inside the provisioned environment.
  pub command: String,

  /// Per-attempt timeout in minutes.
  #[serde(default = "default_timeout_minutes")]
  pub timeout_minutes: u64,

  /// Attempt bound; exhaustion is terminal failure.
  #[serde(default = "default_max_attempts")]
  pub max_attempts: u32,
}

impl BuildStep {
  /// The retry policy this step declares.
  pub fn retry_policy(&self) -> RetryPolicy {
    RetryPolicy {
      timeout: Duration::from_secs(self.timeout_minutes * 60),
      max_attempts: self.max_attempts,
    }
  }
}
