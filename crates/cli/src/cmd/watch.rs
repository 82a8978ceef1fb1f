//! Implementation of the `vigil watch` command.
//!
//! Scheduled trigger: sleeps until the workflow's next weekly fire time,
//! runs the job, and repeats. With `--once` a single cycle runs and the
//! process exit code reflects that run's terminal state.

use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::info;

use vigil_lib::job::{JobOptions, run_workflow};
use vigil_lib::workflow::load_workflow;

use crate::cmd::run::print_outcome;
use crate::output::{print_info, print_warning};

pub fn cmd_watch(workflow_path: &Path, once: bool) -> Result<()> {
  let workflow = load_workflow(workflow_path).context("Failed to load workflow")?;

  let Some(schedule) = workflow.schedule else {
    bail!(
      "workflow {:?} has no schedule; use 'vigil run' for manual runs",
      workflow.name
    );
  };

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;

  rt.block_on(async {
    loop {
      let now = Utc::now();
      let next = schedule.next_fire(now);
      let wait = (next - now).to_std().unwrap_or_default();

      print_info(&format!("Next run: {}", next.format("%a %Y-%m-%d %H:%M UTC")));
      info!(fire_at = %next, wait_secs = wait.as_secs(), "waiting for schedule");
      tokio::time::sleep(wait).await;

      let outcome = run_workflow(workflow_path, &JobOptions::default())
        .await
        .context("Scheduled run failed")?;

      println!();
      print_outcome(&outcome);

      if !outcome.is_success() {
        print_warning("Scheduled run failed");
        if once {
          std::process::exit(1);
        }
      } else if once {
        return Ok(());
      }
    }
  })
}
