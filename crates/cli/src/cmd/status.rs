//! Implementation of the `vigil status` command.
//!
//! Displays the most recent run record.

use anyhow::Result;
use chrono::DateTime;

use vigil_lib::history::{RunState, RunStore};

use crate::output::{print_error, print_info, print_json, print_stat, print_success};

pub fn cmd_status(json: bool) -> Result<()> {
  let store = RunStore::default_store();

  let record = match store.load_latest() {
    Ok(Some(record)) => record,
    Ok(None) => {
      print_info("No runs recorded yet. Use 'vigil run' to start one.");
      return Ok(());
    }
    Err(e) => {
      print_error(&format!("Error loading run history: {}", e));
      return Err(e.into());
    }
  };

  if json {
    return print_json(&record);
  }

  match record.state {
    RunState::Succeeded => print_success(&format!("Last run succeeded: {}", record.id)),
    RunState::Failed => print_error(&format!("Last run failed: {}", record.id)),
    RunState::ProvisionFailed => print_error(&format!("Last run failed provisioning: {}", record.id)),
  }

  print_stat("Workflow", &record.workflow);
  print_stat("Ref", &record.git_ref);
  print_stat("Runtime", &record.runtime);
  if let Some(started) = DateTime::from_timestamp(record.started_at as i64, 0) {
    print_stat("Started", &started.format("%Y-%m-%d %H:%M:%S UTC").to_string());
  }
  print_stat("Attempts", &record.attempts.len().to_string());

  Ok(())
}
