//! Dependency specification files.
//!
//! An environment spec is a small YAML document naming the environment and
//! listing the base packages the provisioner installs into it:
//!
//! ```yaml
//! name: docs
//! installer: pip
//! dependencies:
//!   - sphinx
//!   - matplotlib
//! ```
//!
//! `installer` defaults to `pip`; `dependencies` may be empty, in which case
//! the provisioner only creates the prefix.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

fn default_installer() -> String {
  "pip".to_string()
}

/// A parsed dependency specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvSpec {
  /// Base name of the environment; the runtime version is appended per job.
  pub name: String,

  /// Installer invocation, split on whitespace into program and leading args.
  #[serde(default = "default_installer")]
  pub installer: String,

  /// Package requirement strings passed to the installer.
  #[serde(default)]
  pub dependencies: Vec<String>,
}

/// Errors that can occur while loading a dependency specification.
#[derive(Debug, Error)]
pub enum SpecError {
  /// Spec file not found.
  #[error("dependency spec not found: {0}")]
  NotFound(PathBuf),

  /// Spec file could not be read.
  #[error("failed to read dependency spec: {0}")]
  Read(#[source] io::Error),

  /// Spec file is not valid YAML or does not match the schema.
  #[error("failed to parse dependency spec: {0}")]
  Parse(#[from] serde_yaml::Error),

  /// `name` is missing or blank.
  #[error("dependency spec has an empty name")]
  EmptyName,

  /// `installer` is blank.
  #[error("dependency spec has an empty installer")]
  EmptyInstaller,
}

/// Load and validate a dependency specification file.
pub fn load_spec(path: &Path) -> Result<EnvSpec, SpecError> {
  if !path.exists() {
    return Err(SpecError::NotFound(path.to_path_buf()));
  }

  let content = std::fs::read_to_string(path).map_err(SpecError::Read)?;
  let spec: EnvSpec = serde_yaml::from_str(&content)?;

  if spec.name.trim().is_empty() {
    return Err(SpecError::EmptyName);
  }
  if spec.installer.trim().is_empty() {
    return Err(SpecError::EmptyInstaller);
  }

  Ok(spec)
}
