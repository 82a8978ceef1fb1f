//! Build execution with bounded retries.
//!
//! The runner executes one build command inside a provisioned environment,
//! re-attempting on failure or timeout up to a fixed bound:
//!
//! ```text
//! Idle -> Running -> { Succeeded, TimedOut, Failed }
//! ```
//!
//! On `TimedOut` or `Failed`, if attempts consumed < `max_attempts` the
//! runner transitions back to `Running` for a fresh attempt; otherwise the
//! terminal state is `Failed`. Failure and timeout are treated identically
//! for retry purposes; the distinction is preserved in attempt records. Each
//! attempt is all-or-nothing, and attempts never overlap.

use std::io;
use std::path::Path;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::platform::shell::shell_command;
use crate::provision::Environment;

/// Retry bounds for the build stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Per-attempt timeout; a timed-out attempt is killed immediately.
  pub timeout: Duration,

  /// Attempt bound; exhaustion is terminal failure.
  pub max_attempts: u32,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self {
      timeout: Duration::from_secs(40 * 60),
      max_attempts: 3,
    }
  }
}

/// Outcome of a single build attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AttemptOutcome {
  /// Command exited with status zero.
  Succeeded,
  /// Command exited with a non-zero status.
  Failed { code: Option<i32> },
  /// Command exceeded the per-attempt timeout and was killed.
  TimedOut,
}

impl AttemptOutcome {
  pub fn is_success(&self) -> bool {
    matches!(self, AttemptOutcome::Succeeded)
  }
}

/// One entry in the attempt history of a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
  /// 1-based attempt number.
  pub attempt: u32,

  #[serde(flatten)]
  pub outcome: AttemptOutcome,

  /// Wall-clock duration of the attempt.
  pub duration_ms: u64,
}

/// Runner state. `Running` carries the 1-based attempt about to execute
/// (or executing); `Succeeded` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
  Idle,
  Running { attempt: u32 },
  Succeeded,
  Failed,
}

impl RunnerState {
  /// Idle -> Running on the first attempt. Any other state is unchanged.
  pub fn start(self) -> RunnerState {
    match self {
      RunnerState::Idle => RunnerState::Running { attempt: 1 },
      other => other,
    }
  }

  /// Apply the outcome of the current attempt.
  ///
  /// Success is terminal. Failure or timeout re-enters `Running` while
  /// attempts remain, and is terminal `Failed` once the bound is consumed.
  pub fn advance(self, outcome: AttemptOutcome, policy: &RetryPolicy) -> RunnerState {
    match self {
      RunnerState::Running { attempt } => match outcome {
        AttemptOutcome::Succeeded => RunnerState::Succeeded,
        AttemptOutcome::Failed { .. } | AttemptOutcome::TimedOut if attempt < policy.max_attempts => {
          RunnerState::Running { attempt: attempt + 1 }
        }
        _ => RunnerState::Failed,
      },
      other => other,
    }
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self, RunnerState::Succeeded | RunnerState::Failed)
  }
}

/// Result of running a build to a terminal state.
#[derive(Debug)]
pub struct BuildReport {
  /// Terminal state (`Succeeded` or `Failed`).
  pub state: RunnerState,

  /// One record per attempt, in order.
  pub attempts: Vec<AttemptRecord>,
}

impl BuildReport {
  pub fn succeeded(&self) -> bool {
    self.state == RunnerState::Succeeded
  }
}

/// Errors that abort the runner outside the retry loop.
///
/// A command that starts and then fails is an attempt outcome, not an error;
/// these variants cover the runner itself being unable to execute attempts.
#[derive(Debug, Error)]
pub enum RunnerError {
  /// The shell could not be spawned.
  #[error("failed to spawn build command {cmd:?}: {source}")]
  Spawn {
    cmd: String,
    #[source]
    source: io::Error,
  },

  /// Waiting on the child process failed.
  #[error("failed waiting for build command {cmd:?}: {source}")]
  Wait {
    cmd: String,
    #[source]
    source: io::Error,
  },
}

/// Run `command` with bounded retries inside `env`, with `workdir` as the
/// working directory. Returns the terminal state and per-attempt records.
pub async fn run_with_retry(
  command: &str,
  policy: &RetryPolicy,
  env: &Environment,
  workdir: &Path,
) -> Result<BuildReport, RunnerError> {
  let (shell, shell_args) = shell_command();
  let mut attempts = Vec::new();
  let mut state = RunnerState::Idle.start();

  while let RunnerState::Running { attempt } = state {
    info!(
      attempt,
      max_attempts = policy.max_attempts,
      cmd = %command,
      env = %env.name,
      "starting build attempt"
    );

    let started = Instant::now();
    let outcome = run_attempt(&shell, &shell_args, command, policy.timeout, env, workdir).await?;
    let duration = started.elapsed();

    match outcome {
      AttemptOutcome::Succeeded => {
        info!(attempt, duration_ms = duration.as_millis() as u64, "build attempt succeeded");
      }
      AttemptOutcome::Failed { code } => {
        warn!(attempt, code = ?code, "build attempt failed");
      }
      AttemptOutcome::TimedOut => {
        warn!(attempt, timeout_secs = policy.timeout.as_secs(), "build attempt timed out, killed");
      }
    }

    attempts.push(AttemptRecord {
      attempt,
      outcome,
      duration_ms: duration.as_millis() as u64,
    });

    state = state.advance(outcome, policy);
  }

  Ok(BuildReport { state, attempts })
}

async fn run_attempt(
  shell: &str,
  shell_args: &[String],
  command: &str,
  attempt_timeout: Duration,
  env: &Environment,
  workdir: &Path,
) -> Result<AttemptOutcome, RunnerError> {
  let mut cmd = Command::new(shell);
  cmd.args(shell_args).arg(command).current_dir(workdir);
  env.export_to(&mut cmd);

  let mut child = cmd.spawn().map_err(|source| RunnerError::Spawn {
    cmd: command.to_string(),
    source,
  })?;

  match timeout(attempt_timeout, child.wait()).await {
    Ok(Ok(status)) if status.success() => Ok(AttemptOutcome::Succeeded),
    Ok(Ok(status)) => Ok(AttemptOutcome::Failed { code: status.code() }),
    Ok(Err(source)) => Err(RunnerError::Wait {
      cmd: command.to_string(),
      source,
    }),
    Err(_) => {
      if let Err(e) = child.start_kill() {
        warn!(error = %e, "failed to kill timed-out build");
      }
      let _ = child.wait().await;
      Ok(AttemptOutcome::TimedOut)
    }
  }
}
