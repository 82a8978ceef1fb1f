//! Implementation of the `vigil provision` command.
//!
//! Runs only the provisioning stage: useful for warming an environment or
//! debugging an upstream install script without triggering a build.

use std::path::Path;

use anyhow::{Context, Result};

use vigil_lib::envspec::load_spec;
use vigil_lib::platform::paths::envs_dir;
use vigil_lib::provision::{ProvisionOptions, provision};
use vigil_lib::workflow::load_workflow;

use crate::output::{print_stat, print_success};

pub fn cmd_provision(workflow_path: &Path) -> Result<()> {
  let workflow = load_workflow(workflow_path).context("Failed to load workflow")?;

  let workdir = workflow_path.parent().unwrap_or(Path::new(".")).to_path_buf();
  let spec = load_spec(&workdir.join(&workflow.env.spec)).context("Failed to load dependency spec")?;

  let options = ProvisionOptions {
    envs_root: envs_dir(),
    workdir,
  };

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;

  for runtime in &workflow.runtime {
    let environment = rt
      .block_on(provision(
        &spec,
        runtime,
        workflow.env.upstream_install.as_deref(),
        &options,
      ))
      .with_context(|| format!("Provisioning failed for runtime {}", runtime))?;

    print_success(&format!("Provisioned {}", environment.name));
    print_stat("Prefix", &environment.prefix.display().to_string());
  }

  Ok(())
}
