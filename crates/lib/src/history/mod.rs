//! Run record storage.
//!
//! Every job run leaves one JSON record behind so `vigil status` can report
//! the latest outcome.
//!
//! # Storage Layout
//!
//! ```text
//! {data_dir}/runs/
//! ├── index.json          # RunIndex: list + latest pointer
//! └── <id>.json           # Individual RunRecord files
//! ```

use std::fs;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::platform::paths::runs_dir;
use crate::runner::AttemptRecord;

/// Index file name.
const INDEX_FILENAME: &str = "index.json";

pub const RUN_INDEX_VERSION: u32 = 1;

/// Terminal state of a job run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
  /// Build reached `Succeeded` within the attempt bound.
  Succeeded,
  /// Build failed or timed out on every attempt.
  Failed,
  /// Provisioning failed; the build stage never started.
  ProvisionFailed,
}

impl RunState {
  pub fn is_success(&self) -> bool {
    matches!(self, RunState::Succeeded)
  }
}

/// Record of one job run (one workflow, one runtime version).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
  pub id: String,
  pub workflow: String,
  #[serde(rename = "ref")]
  pub git_ref: String,
  pub runtime: String,
  pub started_at: u64,
  pub finished_at: u64,
  pub state: RunState,
  pub attempts: Vec<AttemptRecord>,
}

/// Index of stored runs, newest last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunIndex {
  pub version: u32,
  pub runs: Vec<String>,
  pub latest: Option<String>,
}

impl RunIndex {
  pub fn new() -> Self {
    Self {
      version: RUN_INDEX_VERSION,
      runs: Vec::new(),
      latest: None,
    }
  }
}

impl Default for RunIndex {
  fn default() -> Self {
    Self::new()
  }
}

/// Errors that can occur during run record storage.
#[derive(Debug, Error)]
pub enum HistoryError {
  #[error("failed to create runs directory: {0}")]
  CreateDir(#[source] io::Error),

  #[error("failed to read run record: {0}")]
  Read(#[source] io::Error),

  #[error("failed to write run record: {0}")]
  Write(#[source] io::Error),

  #[error("failed to parse run record: {0}")]
  Parse(#[source] serde_json::Error),

  #[error("failed to serialize run record: {0}")]
  Serialize(#[source] serde_json::Error),

  #[error("unsupported run index version: {0}")]
  UnsupportedVersion(u32),

  #[error("run record not found: {0}")]
  NotFound(String),
}

/// Manages run record storage on disk.
///
/// Uses atomic write operations (write to temp, then rename) to prevent
/// corruption.
#[derive(Debug, Clone)]
pub struct RunStore {
  base_path: PathBuf,
}

impl RunStore {
  /// Create a run store at the given base path.
  pub fn new(base_path: PathBuf) -> Self {
    Self { base_path }
  }

  /// Create a run store at the default location under the data directory.
  pub fn default_store() -> Self {
    Self::new(runs_dir())
  }

  fn index_path(&self) -> PathBuf {
    self.base_path.join(INDEX_FILENAME)
  }

  fn record_path(&self, id: &str) -> PathBuf {
    self.base_path.join(format!("{}.json", id))
  }

  fn ensure_dir(&self) -> Result<(), HistoryError> {
    fs::create_dir_all(&self.base_path).map_err(HistoryError::CreateDir)
  }

  /// Load the run index. Returns an empty index if the file doesn't exist.
  pub fn load_index(&self) -> Result<RunIndex, HistoryError> {
    let path = self.index_path();

    let content = match fs::read_to_string(&path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(RunIndex::new()),
      Err(e) => return Err(HistoryError::Read(e)),
    };

    let index: RunIndex = serde_json::from_str(&content).map_err(HistoryError::Parse)?;

    if index.version != RUN_INDEX_VERSION {
      return Err(HistoryError::UnsupportedVersion(index.version));
    }

    Ok(index)
  }

  fn save_index(&self, index: &RunIndex) -> Result<(), HistoryError> {
    self.ensure_dir()?;

    let path = self.index_path();
    let temp_path = self.base_path.join("index.json.tmp");

    let content = serde_json::to_string_pretty(index).map_err(HistoryError::Serialize)?;
    fs::write(&temp_path, &content).map_err(HistoryError::Write)?;
    fs::rename(&temp_path, &path).map_err(HistoryError::Write)?;

    Ok(())
  }

  /// Save a run record and point the index's `latest` at it.
  pub fn save(&self, record: &RunRecord) -> Result<(), HistoryError> {
    self.ensure_dir()?;

    let path = self.record_path(&record.id);
    let temp_path = self.base_path.join(format!("{}.json.tmp", record.id));

    let content = serde_json::to_string_pretty(record).map_err(HistoryError::Serialize)?;
    fs::write(&temp_path, &content).map_err(HistoryError::Write)?;
    fs::rename(&temp_path, &path).map_err(HistoryError::Write)?;

    let mut index = self.load_index()?;
    if !index.runs.contains(&record.id) {
      index.runs.push(record.id.clone());
    }
    index.latest = Some(record.id.clone());
    self.save_index(&index)
  }

  /// Load a run record by ID.
  pub fn load(&self, id: &str) -> Result<RunRecord, HistoryError> {
    let path = self.record_path(id);

    let content = match fs::read_to_string(&path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(HistoryError::NotFound(id.to_string())),
      Err(e) => return Err(HistoryError::Read(e)),
    };

    serde_json::from_str(&content).map_err(HistoryError::Parse)
  }

  /// Load the most recent run record, if any.
  pub fn load_latest(&self) -> Result<Option<RunRecord>, HistoryError> {
    let index = self.load_index()?;
    match index.latest {
      Some(id) => Ok(Some(self.load(&id)?)),
      None => Ok(None),
    }
  }
}

/// Build a run ID from the workflow name, runtime, and start time.
pub fn generate_run_id(workflow: &str, runtime: &str, started_at_ms: u64) -> String {
  format!("{}-{}-{}", workflow, runtime, started_at_ms)
}
