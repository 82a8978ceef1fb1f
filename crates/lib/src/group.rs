//! Concurrency groups: at most one run per workflow/ref key.
//!
//! Each group key maps to a lock file under the data directory. A newly
//! triggered run that finds the lock held kills the holder immediately (no
//! graceful drain) and takes the lock over within a bounded window.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::platform::paths::groups_dir;

/// How long a takeover waits for the killed holder's lock to release.
const TAKEOVER_WINDOW: Duration = Duration::from_secs(10);

/// Poll interval while waiting for the lock to release.
const TAKEOVER_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Serialize, Deserialize)]
pub struct GroupMetadata {
  pub version: u32,
  pub pid: u32,
  pub started_at_unix: u64,
  pub command: String,
  pub key: String,
}

#[derive(Debug, Error)]
pub enum GroupError {
  #[error("failed to create groups directory: {0}")]
  CreateDir(#[source] io::Error),

  #[error("failed to open lock file: {0}")]
  OpenFile(#[source] io::Error),

  #[error("failed to write lock metadata: {0}")]
  WriteMetadata(#[source] io::Error),

  #[error("failed to acquire lock: {0}")]
  LockFailed(#[source] io::Error),

  #[error("group {key:?} still locked after cancelling run (PID {pid:?}):\n  {lock_path}")]
  TakeoverTimeout {
    key: String,
    pid: Option<u32>,
    lock_path: PathBuf,
  },
}

/// An exclusive hold on a concurrency group. Released on drop.
pub struct GroupLock {
  _file: File,
  lock_path: PathBuf,
}

impl GroupLock {
  /// Acquire the group exclusively, cancelling any in-progress holder.
  ///
  /// If the lock is free (including a stale lock file whose holder already
  /// exited) this returns immediately. Otherwise the holder recorded in the
  /// lock metadata is killed and the lock is polled until it releases or the
  /// takeover window elapses.
  pub fn acquire(key: &str, command: &str) -> Result<Self, GroupError> {
    let dir = groups_dir();
    let lock_path = dir.join(format!("{}.lock", sanitize_key(key)));

    if !dir.exists() {
      std::fs::create_dir_all(&dir).map_err(GroupError::CreateDir)?;
    }

    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(false)
      .open(&lock_path)
      .map_err(GroupError::OpenFile)?;

    let deadline = Instant::now() + TAKEOVER_WINDOW;
    let mut cancelled_pid: Option<u32> = None;

    loop {
      match try_lock(&file) {
        Ok(()) => break,
        Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
          if cancelled_pid.is_none() {
            cancelled_pid = cancel_holder(&lock_path, key);
          }
          if Instant::now() >= deadline {
            return Err(GroupError::TakeoverTimeout {
              key: key.to_string(),
              pid: cancelled_pid,
              lock_path,
            });
          }
          std::thread::sleep(TAKEOVER_POLL);
        }
        Err(err) => return Err(GroupError::LockFailed(err)),
      }
    }

    Self::write_metadata(&file, key, command)?;

    Ok(GroupLock { _file: file, lock_path })
  }

  /// Reads the lock metadata from the held file handle.
  ///
  /// Useful for tests and diagnostics where the caller already holds the
  /// lock and needs to verify metadata without opening a new file handle
  /// (which would fail on Windows due to mandatory locking).
  pub fn read_metadata(&self) -> io::Result<GroupMetadata> {
    use std::io::{Seek, SeekFrom};

    let mut file = &self._file;
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    serde_json::from_str(&contents).map_err(io::Error::other)
  }

  pub fn lock_path(&self) -> &std::path::Path {
    &self.lock_path
  }

  fn write_metadata(file: &File, key: &str, command: &str) -> Result<(), GroupError> {
    let metadata = GroupMetadata {
      version: 1,
      pid: std::process::id(),
      started_at_unix: SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs(),
      command: command.to_string(),
      key: key.to_string(),
    };

    file.set_len(0).map_err(GroupError::WriteMetadata)?;
    let mut writer = io::BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &metadata)
      .map_err(|e| GroupError::WriteMetadata(io::Error::other(e)))?;
    writer.flush().map_err(GroupError::WriteMetadata)?;

    Ok(())
  }
}

/// Kill the holder recorded in the lock file, returning its pid if found.
fn cancel_holder(lock_path: &std::path::Path, key: &str) -> Option<u32> {
  let mut contents = String::new();
  if let Ok(mut file) = File::open(lock_path)
    && file.read_to_string(&mut contents).is_ok()
    && let Ok(metadata) = serde_json::from_str::<GroupMetadata>(&contents)
  {
    info!(
      key,
      pid = metadata.pid,
      command = %metadata.command,
      "cancelling in-progress run"
    );
    if let Err(e) = cancel_process(metadata.pid) {
      warn!(pid = metadata.pid, error = %e, "failed to signal holder");
    }
    return Some(metadata.pid);
  }

  warn!(key, lock_path = %lock_path.display(), "lock held but metadata unreadable");
  None
}

/// Replace path separators so a group key maps to a single file name.
fn sanitize_key(key: &str) -> String {
  key
    .chars()
    .map(|c| match c {
      '/' | '\\' | ':' => '-',
      c => c,
    })
    .collect()
}

#[cfg(unix)]
fn try_lock(file: &File) -> io::Result<()> {
  use rustix::fs::{FlockOperation, flock};
  use std::os::unix::io::AsFd;

  flock(file.as_fd(), FlockOperation::NonBlockingLockExclusive)
    .map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

#[cfg(windows)]
fn try_lock(file: &File) -> io::Result<()> {
  use std::os::windows::io::AsRawHandle;
  use windows_sys::Win32::Foundation::HANDLE;
  use windows_sys::Win32::Storage::FileSystem::{LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, LockFileEx};

  let handle = file.as_raw_handle() as HANDLE;

  // SAFETY: OVERLAPPED is a plain data struct that is valid when zero-initialized.
  // LockFileEx is safe to call with a valid file handle and zeroed OVERLAPPED.
  let result = unsafe {
    let mut overlapped = std::mem::zeroed();
    LockFileEx(
      handle,
      LOCKFILE_FAIL_IMMEDIATELY | LOCKFILE_EXCLUSIVE_LOCK,
      0,
      1,
      0,
      &mut overlapped,
    )
  };

  if result == 0 {
    Err(io::Error::last_os_error())
  } else {
    Ok(())
  }
}

#[cfg(unix)]
fn cancel_process(pid: u32) -> io::Result<()> {
  use nix::sys::signal::{Signal, kill};
  use nix::unistd::Pid;

  kill(Pid::from_raw(pid as i32), Signal::SIGKILL).map_err(|e| io::Error::from_raw_os_error(e as i32))
}

#[cfg(windows)]
fn cancel_process(pid: u32) -> io::Result<()> {
  use windows_sys::Win32::Foundation::CloseHandle;
  use windows_sys::Win32::System::Threading::{OpenProcess, PROCESS_TERMINATE, TerminateProcess};

  // SAFETY: OpenProcess returns either a valid handle or null; the handle is
  // closed on every path.
  unsafe {
    let handle = OpenProcess(PROCESS_TERMINATE, 0, pid);
    if handle.is_null() {
      return Err(io::Error::last_os_error());
    }
    let result = TerminateProcess(handle, 1);
    CloseHandle(handle);
    if result == 0 {
      return Err(io::Error::last_os_error());
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::consts::DATA_DIR_ENV;
  use serial_test::serial;
  use tempfile::TempDir;

  fn with_temp_data_dir<F>(f: F)
  where
    F: FnOnce(),
  {
    let temp_dir = TempDir::new().unwrap();
    temp_env::with_var(DATA_DIR_ENV, Some(temp_dir.path().to_str().unwrap()), f);
  }

  #[test]
  #[serial]
  fn acquire_free_group() {
    with_temp_data_dir(|| {
      let lock = GroupLock::acquire("docs-upstream/main", "run").unwrap();
      assert!(lock.lock_path().exists());
    });
  }

  #[test]
  #[serial]
  fn metadata_written() {
    with_temp_data_dir(|| {
      let lock = GroupLock::acquire("docs-upstream/main", "run").unwrap();

      let metadata = lock.read_metadata().unwrap();

      assert_eq!(metadata.version, 1);
      assert_eq!(metadata.pid, std::process::id());
      assert_eq!(metadata.command, "run");
      assert_eq!(metadata.key, "docs-upstream/main");
    });
  }

  #[test]
  #[serial]
  fn released_on_drop() {
    with_temp_data_dir(|| {
      {
        let _lock = GroupLock::acquire("docs-upstream/main", "run").unwrap();
      }

      let lock = GroupLock::acquire("docs-upstream/main", "run").unwrap();
      assert!(lock.lock_path().exists());
    });
  }

  #[test]
  #[serial]
  fn stale_lock_file_acquired_without_takeover() {
    with_temp_data_dir(|| {
      // Lock file with metadata from an exited process; flock is not held,
      // so acquisition succeeds without killing anything.
      let dir = groups_dir();
      std::fs::create_dir_all(&dir).unwrap();
      let stale = GroupMetadata {
        version: 1,
        pid: u32::MAX,
        started_at_unix: 0,
        command: "run".to_string(),
        key: "docs-upstream/main".to_string(),
      };
      std::fs::write(
        dir.join("docs-upstream-main.lock"),
        serde_json::to_string(&stale).unwrap(),
      )
      .unwrap();

      let lock = GroupLock::acquire("docs-upstream/main", "run").unwrap();
      assert_eq!(lock.read_metadata().unwrap().pid, std::process::id());
    });
  }

  #[test]
  #[serial]
  fn distinct_keys_do_not_contend() {
    with_temp_data_dir(|| {
      let lock1 = GroupLock::acquire("docs-upstream/main", "run").unwrap();
      let lock2 = GroupLock::acquire("docs-upstream/maintenance", "run").unwrap();
      assert_ne!(lock1.lock_path(), lock2.lock_path());
    });
  }

  #[test]
  fn sanitize_key_flattens_separators() {
    assert_eq!(sanitize_key("docs-upstream/main"), "docs-upstream-main");
    assert_eq!(sanitize_key("a\\b:c"), "a-b-c");
  }

  #[test]
  #[cfg(unix)]
  fn cancel_process_kills_child() {
    let mut child = std::process::Command::new("/bin/sh")
      .args(["-c", "sleep 30"])
      .spawn()
      .unwrap();

    cancel_process(child.id()).unwrap();

    let status = child.wait().unwrap();
    assert!(!status.success());
  }
}
