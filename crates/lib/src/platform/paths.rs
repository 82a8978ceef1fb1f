use std::path::PathBuf;

use crate::consts::{APP_NAME, DATA_DIR_ENV};

/// Returns the user's home directory
#[cfg(windows)]
pub fn home_dir() -> PathBuf {
  let userprofile = std::env::var("USERPROFILE").expect("USERPROFILE not set");
  PathBuf::from(userprofile)
}

/// Returns the user's home directory
#[cfg(not(windows))]
pub fn home_dir() -> PathBuf {
  let home = std::env::var("HOME").expect("HOME not set");
  PathBuf::from(home)
}

/// Returns the directory for data files for the application.
///
/// `VIGIL_DATA_DIR` takes precedence over the platform default, which keeps
/// tests and ad-hoc runs isolated from the real data directory.
#[cfg(windows)]
pub fn data_dir() -> PathBuf {
  if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
    return PathBuf::from(dir);
  }
  let appdata = std::env::var("APPDATA").expect("APPDATA not set");
  PathBuf::from(appdata).join(APP_NAME)
}

/// Returns the directory for data files for the application.
///
/// `VIGIL_DATA_DIR` takes precedence over the platform default, which keeps
/// tests and ad-hoc runs isolated from the real data directory.
#[cfg(not(windows))]
pub fn data_dir() -> PathBuf {
  if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
    return PathBuf::from(dir);
  }
  let data_home = std::env::var("XDG_DATA_HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|_| home_dir().join(".local").join("share"));
  data_home.join(APP_NAME)
}

/// Directory holding concurrency-group lock files.
pub fn groups_dir() -> PathBuf {
  data_dir().join("groups")
}

/// Directory holding run records.
pub fn runs_dir() -> PathBuf {
  data_dir().join("runs")
}

/// Root directory for provisioned environment prefixes.
pub fn envs_dir() -> PathBuf {
  data_dir().join("envs")
}
