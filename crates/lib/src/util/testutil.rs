//! Test utilities for vigil-lib.
//!
//! Cross-platform helpers producing shell command strings and script files
//! for tests that exercise process execution.

use std::path::{Path, PathBuf};

/// Returns a command string that exits successfully.
pub fn ok_cmd() -> String {
  "exit 0".to_string()
}

/// Returns a command string that exits with the given code.
pub fn fail_cmd(code: i32) -> String {
  format!("exit {}", code)
}

/// Returns a command string that sleeps for the given number of seconds.
#[cfg(unix)]
pub fn sleep_cmd(secs: u64) -> String {
  format!("sleep {}", secs)
}

#[cfg(windows)]
pub fn sleep_cmd(secs: u64) -> String {
  format!("Start-Sleep -Seconds {}", secs)
}

/// Returns a command string that fails on the first invocation and succeeds
/// on every later one, using `marker` to remember prior invocations.
#[cfg(unix)]
pub fn fail_once_cmd(marker: &Path) -> String {
  format!(
    "if [ -f \"{m}\" ]; then exit 0; else touch \"{m}\"; exit 1; fi",
    m = marker.display()
  )
}

#[cfg(windows)]
pub fn fail_once_cmd(marker: &Path) -> String {
  format!(
    "if (Test-Path '{m}') {{ exit 0 }} else {{ New-Item -ItemType File -Path '{m}' | Out-Null; exit 1 }}",
    m = marker.display()
  )
}

/// Returns a command string that hangs on the first two invocations and exits
/// successfully on the third, using two marker files to count invocations.
#[cfg(unix)]
pub fn hang_twice_cmd(first: &Path, second: &Path, hang_secs: u64) -> String {
  format!(
    "if [ -f \"{b}\" ]; then exit 0; elif [ -f \"{a}\" ]; then touch \"{b}\"; sleep {s}; else touch \"{a}\"; sleep {s}; fi",
    a = first.display(),
    b = second.display(),
    s = hang_secs
  )
}

#[cfg(windows)]
pub fn hang_twice_cmd(first: &Path, second: &Path, hang_secs: u64) -> String {
  format!(
    "if (Test-Path '{b}') {{ exit 0 }} elseif (Test-Path '{a}') {{ New-Item -ItemType File -Path '{b}' | Out-Null; Start-Sleep -Seconds {s} }} else {{ New-Item -ItemType File -Path '{a}' | Out-Null; Start-Sleep -Seconds {s} }}",
    a = first.display(),
    b = second.display(),
    s = hang_secs
  )
}

/// Writes a script to `dir/name` and returns its path.
///
/// The platform-appropriate body is chosen; scripts run via
/// [`crate::platform::shell::script_command`] and need no executable bit.
pub fn write_script(dir: &Path, name: &str, unix_body: &str, windows_body: &str) -> PathBuf {
  let body = if cfg!(unix) { unix_body } else { windows_body };
  let name = if cfg!(windows) { format!("{}.ps1", name) } else { name.to_string() };

  let path = dir.join(name);
  std::fs::write(&path, body).unwrap();
  path
}

/// Writes a stub installer script that records its arguments to `log` and
/// exits with `code`. Returns an installer string suitable for
/// [`crate::envspec::EnvSpec::installer`].
#[cfg(unix)]
pub fn stub_installer(dir: &Path, log: &Path, code: i32) -> String {
  let script = dir.join("installer.sh");
  std::fs::write(&script, format!("echo \"$@\" >> \"{}\"\nexit {}\n", log.display(), code)).unwrap();
  format!("/bin/sh {}", script.display())
}

#[cfg(windows)]
pub fn stub_installer(dir: &Path, log: &Path, code: i32) -> String {
  let script = dir.join("installer.ps1");
  std::fs::write(
    &script,
    format!("$args -join ' ' | Out-File -Append '{}'\nexit {}\n", log.display(), code),
  )
  .unwrap();
  format!("powershell.exe -NoProfile -File {}", script.display())
}
