//! Job orchestration.
//!
//! `run_workflow` ties the stages together, strictly sequentially:
//!
//! 1. Load and validate the workflow file.
//! 2. Acquire the concurrency group, cancelling any in-progress run.
//! 3. For each runtime in the matrix, in order: provision the environment,
//!    then run the build with retry. The build never starts unless
//!    provisioning completed.
//!
//! Every matrix job leaves a run record behind. The matrix is fail-fast:
//! a provisioning failure or retry exhaustion stops later entries.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::{error, info};

use crate::envspec::{EnvSpec, SpecError, load_spec};
use crate::group::{GroupError, GroupLock};
use crate::history::{HistoryError, RunRecord, RunState, RunStore, generate_run_id};
use crate::platform::paths::envs_dir;
use crate::provision::{ProvisionOptions, provision};
use crate::runner::{RetryPolicy, RunnerError, run_with_retry};
use crate::workflow::{WorkflowDef, WorkflowError, load_workflow};

/// Options for a job run.
#[derive(Debug, Clone, Default)]
pub struct JobOptions {
  /// Retry policy override; `None` uses the workflow's declared bounds.
  pub policy: Option<RetryPolicy>,
}

/// Errors that abort a job before or outside the recorded stages.
#[derive(Debug, Error)]
pub enum JobError {
  /// Workflow file failed to load.
  #[error("workflow error: {0}")]
  Workflow(#[from] WorkflowError),

  /// Dependency spec failed to load.
  #[error("dependency spec error: {0}")]
  Spec(#[from] SpecError),

  /// Concurrency group could not be acquired.
  #[error("concurrency group error: {0}")]
  Group(#[from] GroupError),

  /// Runner could not execute attempts.
  #[error("runner error: {0}")]
  Runner(#[from] RunnerError),

  /// Run record could not be stored.
  #[error("history error: {0}")]
  History(#[from] HistoryError),
}

/// Result of a job run: one record per matrix entry that ran.
#[derive(Debug)]
pub struct JobOutcome {
  pub workflow: WorkflowDef,
  pub records: Vec<RunRecord>,
}

impl JobOutcome {
  /// True iff every matrix entry ran and succeeded.
  pub fn is_success(&self) -> bool {
    self.records.len() == self.workflow.runtime.len() && self.records.iter().all(|r| r.state.is_success())
  }
}

/// Run the workflow at `workflow_path` to completion.
///
/// The workflow file's directory is the working directory for provisioning
/// and the build command, and the base for relative spec/script paths.
pub async fn run_workflow(workflow_path: &Path, options: &JobOptions) -> Result<JobOutcome, JobError> {
  let workflow = load_workflow(workflow_path)?;
  let workdir = workflow_path.parent().unwrap_or(Path::new(".")).to_path_buf();

  info!(workflow = %workflow.name, group = %workflow.group_key(), "starting job");

  let _group = GroupLock::acquire(&workflow.group_key(), "run")?;

  let spec = load_spec(&resolve(&workdir, &workflow.env.spec))?;
  let store = RunStore::default_store();
  let policy = options.policy.clone().unwrap_or_else(|| workflow.build.retry_policy());

  let provision_options = ProvisionOptions {
    envs_root: envs_dir(),
    workdir: workdir.clone(),
  };

  let mut records = Vec::new();

  for runtime in &workflow.runtime {
    let record = run_matrix_entry(&workflow, &spec, runtime, &policy, &provision_options, &workdir, &store).await?;
    let failed = !record.state.is_success();
    records.push(record);
    if failed {
      break;
    }
  }

  let outcome = JobOutcome { workflow, records };
  info!(success = outcome.is_success(), jobs = outcome.records.len(), "job finished");

  Ok(outcome)
}

async fn run_matrix_entry(
  workflow: &WorkflowDef,
  spec: &EnvSpec,
  runtime: &str,
  policy: &RetryPolicy,
  provision_options: &ProvisionOptions,
  workdir: &Path,
  store: &RunStore,
) -> Result<RunRecord, JobError> {
  let started = SystemTime::now();
  let started_ms = unix_ms(started);
  let id = generate_run_id(&workflow.name, runtime, started_ms);

  info!(workflow = %workflow.name, runtime, id = %id, "starting matrix job");

  let upstream = workflow.env.upstream_install.as_deref();

  let (state, attempts) = match provision(spec, runtime, upstream, provision_options).await {
    Ok(environment) => {
      let report = run_with_retry(&workflow.build.command, policy, &environment, workdir).await?;
      let state = if report.succeeded() {
        RunState::Succeeded
      } else {
        error!(
          workflow = %workflow.name,
          runtime,
          attempts = report.attempts.len(),
          "build failed after exhausting attempts"
        );
        RunState::Failed
      };
      (state, report.attempts)
    }
    Err(e) => {
      error!(workflow = %workflow.name, runtime, error = %e, "provisioning failed");
      (RunState::ProvisionFailed, Vec::new())
    }
  };

  let record = RunRecord {
    id,
    workflow: workflow.name.clone(),
    git_ref: workflow.git_ref.clone(),
    runtime: runtime.to_string(),
    started_at: started_ms / 1000,
    finished_at: unix_ms(SystemTime::now()) / 1000,
    state,
    attempts,
  };

  store.save(&record)?;

  Ok(record)
}

fn resolve(workdir: &Path, path: &Path) -> PathBuf {
  if path.is_absolute() {
    path.to_path_buf()
  } else {
    workdir.join(path)
  }
}

fn unix_ms(time: SystemTime) -> u64 {
  time.duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}
