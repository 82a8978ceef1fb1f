//! Environment provisioning.
//!
//! Provisioning produces a named, per-run environment prefix from a
//! dependency specification, in two steps:
//!
//! 1. Base install: the spec's installer is invoked once with every declared
//!    dependency. An installer failure means some dependency is
//!    unresolvable; this is fatal and never retried.
//! 2. Upstream override: the workflow's install script runs with the prefix
//!    exported, replacing selected packages with upstream development
//!    builds. A script failure is fatal and never retried, and the base
//!    provisioning is left in place.
//!
//! The prefix is recreated from scratch on every run; a leftover prefix from
//! an earlier run is removed first. Nothing mutates the environment after
//! provisioning completes.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use crate::consts::{ENV_NAME, ENV_PREFIX, ENV_RUNTIME};
use crate::envspec::EnvSpec;
use crate::platform::shell::script_command;

/// A provisioned environment, consumed by the build stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
  /// Environment name: `{spec.name}-{runtime}`.
  pub name: String,

  /// Prefix directory the installer populated.
  pub prefix: PathBuf,

  /// Runtime version this environment was provisioned for.
  pub runtime: String,
}

impl Environment {
  /// Export this environment onto a command: `{prefix}/bin` is prepended to
  /// `PATH`, and the prefix, runtime, and name are exported as variables.
  pub fn export_to(&self, cmd: &mut Command) {
    let bin = self.prefix.join("bin");
    let path = match std::env::var_os("PATH") {
      Some(existing) => {
        let mut paths = vec![bin.clone()];
        paths.extend(std::env::split_paths(&existing));
        std::env::join_paths(paths).unwrap_or_else(|_| bin.clone().into_os_string())
      }
      None => bin.into_os_string(),
    };

    cmd
      .env("PATH", path)
      .env(ENV_PREFIX, &self.prefix)
      .env(ENV_RUNTIME, &self.runtime)
      .env(ENV_NAME, &self.name);
  }
}

/// Errors that can occur during provisioning. All are fatal; none retry.
#[derive(Debug, Error)]
pub enum ProvisionError {
  /// Prefix directory could not be prepared.
  #[error("failed to prepare prefix {path}: {source}")]
  PreparePrefix {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// Installer could not be spawned.
  #[error("failed to spawn installer {installer:?}: {source}")]
  InstallerSpawn {
    installer: String,
    #[source]
    source: io::Error,
  },

  /// Installer exited non-zero: some dependency is unresolvable.
  #[error("installer {installer:?} failed with exit code {code:?}")]
  Unresolvable { installer: String, code: Option<i32> },

  /// Upstream install script not found.
  #[error("upstream install script not found: {0}")]
  ScriptNotFound(PathBuf),

  /// Upstream install script could not be spawned.
  #[error("failed to spawn upstream install script {script}: {source}")]
  OverrideSpawn {
    script: PathBuf,
    #[source]
    source: io::Error,
  },

  /// Upstream install script exited non-zero. The base provisioning is not
  /// rolled back.
  #[error("upstream install script {script} failed with exit code {code:?}")]
  OverrideFailed { script: PathBuf, code: Option<i32> },
}

/// Where provisioning happens.
#[derive(Debug, Clone)]
pub struct ProvisionOptions {
  /// Root directory under which prefixes are created.
  pub envs_root: PathBuf,

  /// Working directory for installer and override script, typically the
  /// workflow file's directory.
  pub workdir: PathBuf,
}

/// Provision an environment for one runtime version.
pub async fn provision(
  spec: &EnvSpec,
  runtime: &str,
  upstream_install: Option<&Path>,
  options: &ProvisionOptions,
) -> Result<Environment, ProvisionError> {
  let name = format!("{}-{}", spec.name, runtime);
  let prefix = options.envs_root.join(&name);

  info!(env = %name, prefix = %prefix.display(), "provisioning environment");

  prepare_prefix(&prefix).await?;

  let environment = Environment {
    name,
    prefix,
    runtime: runtime.to_string(),
  };

  install_base(spec, &environment, options).await?;

  if let Some(script) = upstream_install {
    install_upstream(script, &environment, options).await?;
  }

  info!(env = %environment.name, "environment provisioned");

  Ok(environment)
}

/// Remove any prefix left by an earlier run and create a fresh one.
async fn prepare_prefix(prefix: &Path) -> Result<(), ProvisionError> {
  let map_err = |source| ProvisionError::PreparePrefix {
    path: prefix.to_path_buf(),
    source,
  };

  if prefix.exists() {
    debug!(prefix = %prefix.display(), "removing prefix from earlier run");
    tokio::fs::remove_dir_all(prefix).await.map_err(map_err)?;
  }
  tokio::fs::create_dir_all(prefix).await.map_err(map_err)
}

/// Invoke the installer once with all base dependencies.
async fn install_base(
  spec: &EnvSpec,
  env: &Environment,
  options: &ProvisionOptions,
) -> Result<(), ProvisionError> {
  if spec.dependencies.is_empty() {
    debug!(env = %env.name, "no base dependencies declared, skipping install");
    return Ok(());
  }

  let mut parts = spec.installer.split_whitespace();
  let program = parts.next().unwrap_or_default();

  let mut cmd = Command::new(program);
  cmd
    .args(parts)
    .arg("install")
    .arg("--prefix")
    .arg(&env.prefix)
    .args(&spec.dependencies)
    .current_dir(&options.workdir)
    .env(ENV_RUNTIME, &env.runtime);

  info!(
    env = %env.name,
    installer = %spec.installer,
    dependencies = spec.dependencies.len(),
    "installing base dependencies"
  );

  let output = cmd.output().await.map_err(|source| ProvisionError::InstallerSpawn {
    installer: spec.installer.clone(),
    source,
  })?;

  if !output.status.success() {
    log_output(&output);
    return Err(ProvisionError::Unresolvable {
      installer: spec.installer.clone(),
      code: output.status.code(),
    });
  }

  Ok(())
}

/// Run the upstream-dev override script inside the environment.
async fn install_upstream(
  script: &Path,
  env: &Environment,
  options: &ProvisionOptions,
) -> Result<(), ProvisionError> {
  let script = if script.is_absolute() {
    script.to_path_buf()
  } else {
    options.workdir.join(script)
  };

  if !script.exists() {
    return Err(ProvisionError::ScriptNotFound(script));
  }

  let (program, args) = script_command(&script);
  let mut cmd = Command::new(program);
  cmd.args(args).current_dir(&options.workdir);
  env.export_to(&mut cmd);

  info!(env = %env.name, script = %script.display(), "applying upstream overrides");

  let output = cmd.output().await.map_err(|source| ProvisionError::OverrideSpawn {
    script: script.clone(),
    source,
  })?;

  if !output.status.success() {
    log_output(&output);
    return Err(ProvisionError::OverrideFailed {
      script,
      code: output.status.code(),
    });
  }

  Ok(())
}

fn log_output(output: &std::process::Output) {
  let stderr = String::from_utf8_lossy(&output.stderr);
  let stdout = String::from_utf8_lossy(&output.stdout);

  if !stderr.is_empty() {
    debug!(stderr = %stderr, "provisioning stderr");
  }
  if !stdout.is_empty() {
    debug!(stdout = %stdout, "provisioning stdout");
  }
}
