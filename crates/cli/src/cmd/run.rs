//! Implementation of the `vigil run` command.
//!
//! Manual trigger: acquires the concurrency group, provisions the
//! environment for each runtime in the matrix, and runs the build with
//! retry. The process exit code reflects the terminal state of the job.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

use vigil_lib::history::RunState;
use vigil_lib::job::{JobOptions, JobOutcome, run_workflow};
use vigil_lib::runner::{AttemptOutcome, RetryPolicy};
use vigil_lib::workflow::load_workflow;

use crate::output::{format_duration, print_error, print_stat, print_success};

/// Execute the run command.
///
/// `timeout` and `max_attempts` override the workflow's declared retry
/// bounds; unset values fall back to what the workflow declares.
pub fn cmd_run(workflow_path: &Path, timeout: Option<Duration>, max_attempts: Option<u32>) -> Result<()> {
  let policy = if timeout.is_some() || max_attempts.is_some() {
    let workflow = load_workflow(workflow_path).context("Failed to load workflow")?;
    let declared = workflow.build.retry_policy();
    Some(RetryPolicy {
      timeout: timeout.unwrap_or(declared.timeout),
      max_attempts: max_attempts.unwrap_or(declared.max_attempts),
    })
  } else {
    None
  };

  let options = JobOptions { policy };

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let outcome = rt.block_on(run_workflow(workflow_path, &options)).context("Run failed")?;

  println!();
  print_outcome(&outcome);

  if !outcome.is_success() {
    std::process::exit(1);
  }

  Ok(())
}

/// Print a per-matrix-job summary of a finished run.
pub fn print_outcome(outcome: &JobOutcome) {
  for record in &outcome.records {
    let heading = format!("{} [{}]", record.workflow, record.runtime);
    match record.state {
      RunState::Succeeded => print_success(&format!("{}: succeeded", heading)),
      RunState::Failed => print_error(&format!(
        "{}: failed after {} attempt(s)",
        heading,
        record.attempts.len()
      )),
      RunState::ProvisionFailed => print_error(&format!("{}: provisioning failed", heading)),
    }

    for attempt in &record.attempts {
      let duration = format_duration(Duration::from_millis(attempt.duration_ms));
      let summary = match attempt.outcome {
        AttemptOutcome::Succeeded => format!("succeeded ({})", duration),
        AttemptOutcome::Failed { code: Some(code) } => format!("failed, exit code {} ({})", code, duration),
        AttemptOutcome::Failed { code: None } => format!("failed, killed by signal ({})", duration),
        AttemptOutcome::TimedOut => format!("timed out ({})", duration),
      };
      print_stat(&format!("attempt {}", attempt.attempt), &summary);
    }
  }

  if outcome.is_success() {
    println!();
    print_success("Run complete!");
  }
}
