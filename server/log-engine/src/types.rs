//! Core types for the log engine (line records, entries, search documents).

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::fingerprint;

/// Category assigned to horizontal-rule lines (`=====`, `-----`, ...).
pub const SEPARATOR_CATEGORY: &str = "Separator";

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Severity {
  Error,
  Warning,
  Traceback,
}

impl Severity {
  /// Severity named inside a nested engine log line; `Display`/`Info` carry none.
  pub fn from_label(label: &str) -> Option<Self> {
    match label {
      "Error" => Some(Self::Error),
      "Warning" => Some(Self::Warning),
      _ => None,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Error => "Error",
      Self::Warning => "Warning",
      Self::Traceback => "Traceback",
    }
  }
}

// ---------------------------------------------------------------------------
// Per-line record (classifier output)
// ---------------------------------------------------------------------------

/// One classified physical line. Lines judged irrelevant never become a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineRecord {
  pub timestamp: Option<NaiveDateTime>,
  pub filename: String,
  /// 1-based position in the file.
  pub line_number: usize,
  pub raw_line: String,
  pub category: Option<String>,
  pub severity: Option<Severity>,
  /// Normalized message; never empty.
  pub message: String,
  pub line_entry_id: String,
}

impl LineRecord {
  pub fn is_separator(&self) -> bool {
    self.category.as_deref() == Some(SEPARATOR_CATEGORY)
  }
}

// ---------------------------------------------------------------------------
// Entry (final output unit)
// ---------------------------------------------------------------------------

/// A standalone warning, a standalone error, or an error carrying its traceback block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
  pub severity: Severity,
  pub category: Option<String>,
  pub message: String,
  pub timestamp: Option<NaiveDateTime>,
  /// Anchor line: the record itself, or the opening line of a traceback block.
  pub line_number: usize,
  /// Identity of the representative physical line.
  pub line_entry_id: String,
  pub traceback: Vec<LineRecord>,
  pub message_hash: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub event_hash: Option<String>,
}

impl Entry {
  /// Entry for a single warning or error line, with no traceback.
  pub fn standalone(record: LineRecord, severity: Severity) -> Self {
    let message_hash = fingerprint::message_hash(&record.message);
    let event_hash = match severity {
      Severity::Error => Some(fingerprint::event_hash(&record.message, &[])),
      _ => None,
    };
    Self {
      severity,
      category: record.category,
      message: record.message,
      timestamp: record.timestamp,
      line_number: record.line_number,
      line_entry_id: record.line_entry_id,
      traceback: Vec::new(),
      message_hash,
      event_hash,
    }
  }

  pub fn has_traceback(&self) -> bool {
    !self.traceback.is_empty()
  }
}

// ---------------------------------------------------------------------------
// CLI stream wrappers
// ---------------------------------------------------------------------------

/// Structured error output for a file that could not be parsed.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorOutput {
  pub error: bool,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub file: Option<String>,
}

impl ErrorOutput {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      error: true,
      message: message.into(),
      file: None,
    }
  }

  pub fn with_file(mut self, file: impl Into<String>) -> Self {
    self.file = Some(file.into());
    self
  }
}
