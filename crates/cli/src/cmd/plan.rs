//! Implementation of the `vigil plan` command.
//!
//! Loads the workflow and its dependency spec and prints what would run,
//! without provisioning or building anything.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;

use vigil_lib::envspec::load_spec;
use vigil_lib::workflow::load_workflow;

use crate::output::{format_duration, print_stat, print_success};

pub fn cmd_plan(workflow_path: &Path) -> Result<()> {
  let workflow = load_workflow(workflow_path).context("Failed to load workflow")?;

  let workdir = workflow_path.parent().unwrap_or(Path::new("."));
  let spec_path = workdir.join(&workflow.env.spec);
  let spec = load_spec(&spec_path).context("Failed to load dependency spec")?;

  print_success(&format!("Workflow: {}", workflow.name));
  print_stat("Group", &workflow.group_key());

  match workflow.schedule {
    Some(schedule) => {
      let next = schedule.next_fire(Utc::now());
      print_stat("Schedule", &schedule.to_string());
      print_stat("Next fire", &next.format("%a %Y-%m-%d %H:%M UTC").to_string());
    }
    None => print_stat("Schedule", "manual only"),
  }

  println!();
  print_stat("Environment", &spec.name);
  print_stat("Runtimes", &workflow.runtime.join(", "));
  print_stat("Installer", &spec.installer);
  print_stat("Dependencies", &spec.dependencies.len().to_string());
  match &workflow.env.upstream_install {
    Some(script) => print_stat("Upstream install", &script.display().to_string()),
    None => print_stat("Upstream install", "none"),
  }

  println!();
  print_stat("Command", &workflow.build.command);
  let policy = workflow.build.retry_policy();
  print_stat("Attempt timeout", &format_duration(policy.timeout));
  print_stat("Max attempts", &policy.max_attempts.to_string());

  Ok(())
}
