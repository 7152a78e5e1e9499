//! Blocking side of `POST /logs`: persist the upload, parse it, write the audit copy.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log_engine::{dedup_by_message_hash, Entry, EngineError, LogParser};
use tracing::info;

use crate::error::ApiError;

/// Last path component of a client-supplied filename, or `None` if nothing usable remains.
pub fn sanitize_filename(raw: &str) -> Option<String> {
  let name = raw.rsplit(&['/', '\\'][..]).next().unwrap_or(raw).trim();
  match name {
    "" | "." | ".." => None,
    _ => Some(name.to_string()),
  }
}

pub fn audit_path(log_dir: &Path, filename: &str) -> PathBuf {
  log_dir.join(format!("parsed_{filename}"))
}

#[derive(Debug)]
pub struct ProcessedUpload {
  pub parsed: usize,
  /// Entries to store; deduplicated by severity and message hash when requested.
  pub entries: Vec<Entry>,
}

/// Runs on the blocking pool.
pub fn process_upload(
  parser: &LogParser,
  log_dir: &Path,
  filename: &str,
  bytes: &[u8],
  dedup: bool,
) -> Result<ProcessedUpload, ApiError> {
  fs::create_dir_all(log_dir).map_err(|e| EngineError::io(log_dir, e))?;

  let path = log_dir.join(filename);
  fs::write(&path, bytes).map_err(|e| EngineError::io(&path, e))?;
  info!(file = %path.display(), bytes = bytes.len(), "stored upload");

  let entries = parser.parse_file(&path)?;
  info!(file = filename, entries = entries.len(), "parsed upload");

  write_audit(&audit_path(log_dir, filename), &entries)?;

  let parsed = entries.len();
  let entries = if dedup {
    dedup_by_message_hash(entries)
  } else {
    entries
  };
  Ok(ProcessedUpload { parsed, entries })
}

/// One JSON entry per line.
pub fn write_audit(path: &Path, entries: &[Entry]) -> Result<(), EngineError> {
  let file = File::create(path).map_err(|e| EngineError::io(path, e))?;
  let mut out = BufWriter::new(file);
  for entry in entries {
    serde_json::to_writer(&mut out, entry)?;
    out.write_all(b"\n").map_err(|e| EngineError::io(path, e))?;
  }
  out.flush().map_err(|e| EngineError::io(path, e))
}
