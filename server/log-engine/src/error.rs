//! Structured error types for the log engine.
//!
//! Malformed log content never produces an error; only the surrounding I/O can fail.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("io: {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),
}

impl EngineError {
  pub fn io(path: &Path, source: std::io::Error) -> Self {
    Self::Io {
      path: path.to_path_buf(),
      source,
    }
  }
}
