//! Shell selection for command and script execution.
//!
//! Commands always run through the default system shell rather than `$SHELL`:
//! interactive shells may source profile files that modify the environment,
//! which would make build attempts depend on the invoking user's setup.

use std::path::Path;

/// Returns the shell and argument used to run a command string.
#[cfg(unix)]
pub fn shell_command() -> (String, Vec<String>) {
  ("/bin/sh".to_string(), vec!["-c".to_string()])
}

/// Returns the shell and argument used to run a command string.
#[cfg(windows)]
pub fn shell_command() -> (String, Vec<String>) {
  (
    "powershell.exe".to_string(),
    vec![
      "-NoProfile".to_string(),
      "-ExecutionPolicy".to_string(),
      "Bypass".to_string(),
      "-Command".to_string(),
    ],
  )
}

/// Returns the program and arguments used to run a script file.
///
/// The script is passed to the shell by path, so it does not need to be
/// marked executable.
#[cfg(unix)]
pub fn script_command(script: &Path) -> (String, Vec<String>) {
  ("/bin/sh".to_string(), vec![script.to_string_lossy().into_owned()])
}

/// Returns the program and arguments used to run a script file.
#[cfg(windows)]
pub fn script_command(script: &Path) -> (String, Vec<String>) {
  (
    "powershell.exe".to_string(),
    vec![
      "-NoProfile".to_string(),
      "-ExecutionPolicy".to_string(),
      "Bypass".to_string(),
      "-File".to_string(),
      script.to_string_lossy().into_owned(),
    ],
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn shell_command_is_non_interactive() {
    let (shell, args) = shell_command();
    #[cfg(unix)]
    {
      assert_eq!(shell, "/bin/sh");
      assert_eq!(args, vec!["-c"]);
    }
    #[cfg(windows)]
    {
      assert_eq!(shell, "powershell.exe");
      assert!(args.contains(&"-NoProfile".to_string()));
    }
  }

  #[test]
  fn script_command_embeds_path() {
    let (_, args) = script_command(Path::new("install.sh"));
    assert!(args.iter().any(|a| a.contains("install.sh")));
  }
}
