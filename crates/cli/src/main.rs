use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod cmd;
mod output;

/// vigil - scheduled upstream-canary build runner
#[derive(Parser)]
#[command(name = "vigil")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run the workflow now (manual trigger)
  Run {
    /// Path to the workflow file
    #[arg(default_value = "workflow.yml")]
    workflow: PathBuf,

    /// Override the per-attempt timeout (e.g. "40m")
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Override the attempt bound
    #[arg(long)]
    max_attempts: Option<u32>,
  },

  /// Show what would run without executing anything
  Plan {
    /// Path to the workflow file
    #[arg(default_value = "workflow.yml")]
    workflow: PathBuf,
  },

  /// Provision the environment without building
  Provision {
    /// Path to the workflow file
    #[arg(default_value = "workflow.yml")]
    workflow: PathBuf,
  },

  /// Run the workflow on its weekly schedule
  Watch {
    /// Path to the workflow file
    #[arg(default_value = "workflow.yml")]
    workflow: PathBuf,

    /// Run a single scheduled cycle, then exit
    #[arg(long)]
    once: bool,
  },

  /// Show the most recent run
  Status {
    /// Emit JSON instead of text
    #[arg(long)]
    json: bool,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_filter = if cli.verbose { "vigil=debug,vigil_lib=debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
    .without_time()
    .init();

  match cli.command {
    Commands::Run {
      workflow,
      timeout,
      max_attempts,
    } => cmd::cmd_run(&workflow, timeout, max_attempts),
    Commands::Plan { workflow } => cmd::cmd_plan(&workflow),
    Commands::Provision { workflow } => cmd::cmd_provision(&workflow),
    Commands::Watch { workflow, once } => cmd::cmd_watch(&workflow, once),
    Commands::Status { json } => cmd::cmd_status(json),
  }
}
