//! Traceback aggregation: fold classified lines into entries.
//!
//! The aggregator is either idle or collecting a traceback block. While idle, error
//! lines are held back as `current_error` until the next warning/error (or the end of
//! the file) flushes them; warnings are emitted immediately. A traceback-opening
//! marker switches to collecting, and the block grows until a terminator, a blank
//! line, or a line that no longer looks like part of a stack dump closes it.

use tracing::debug;

use crate::classify;
use crate::fingerprint;
use crate::types::{Entry, LineRecord, Severity};

/// Lower-cased substrings that open a traceback block.
const OPENING_MARKERS: [&str; 4] = [
  "traceback (most recent call last)",
  "commandletexception",
  "btraceack",
  "=== critical error: ===",
];

/// Lower-cased substring that closes a block, including the line itself.
const SHUTDOWN_MARKER: &str = "executing staticshutdownaftererror";

/// Lower-cased substrings that continue a block regardless of content.
const CONTINUATION_MARKERS: [&str; 2] = ["unhandled exception:", "fatal error!"];

/// Block headers whose first line is a better summary than the last one.
const HEADER_MARKERS: [&str; 2] = ["editor terminated with exit code 1", "=== critical error: ==="];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
  Idle,
  Collecting,
}

/// Per-file aggregation state. One instance per parse; never shared.
#[derive(Debug)]
pub struct Aggregator {
  separator_grace: u8,
  state: State,
  current_error: Option<LineRecord>,
  buffer: Vec<LineRecord>,
  trailing_allowance: u8,
  entries: Vec<Entry>,
}

impl Aggregator {
  pub fn new(separator_grace: u8) -> Self {
    Self {
      separator_grace,
      state: State::Idle,
      current_error: None,
      buffer: Vec::new(),
      trailing_allowance: 0,
      entries: Vec::new(),
    }
  }

  /// Feed the next classified line, in file order.
  pub fn push(&mut self, record: LineRecord) {
    let lowered = record.raw_line.to_lowercase();
    if classify::is_summary_line(&lowered) {
      return;
    }

    if OPENING_MARKERS.iter().any(|m| lowered.contains(m)) {
      self.open_block(record);
      return;
    }

    match self.state {
      State::Collecting => self.push_collecting(record, &lowered),
      State::Idle => self.push_idle(record),
    }
  }

  /// A blank physical line: closes an open block, otherwise ignored.
  pub fn push_blank(&mut self) {
    if self.state == State::Collecting {
      self.close_block();
    }
  }

  /// Flush everything still pending and return the entries in file order.
  pub fn finish(mut self) -> Vec<Entry> {
    self.flush_error();
    if self.state == State::Collecting {
      self.close_block();
    }
    self.entries
  }

  fn open_block(&mut self, record: LineRecord) {
    if self.state == State::Collecting {
      self.close_block();
    }
    if let Some(dropped) = self.current_error.take() {
      debug!(
        line = dropped.line_number,
        superseded_by = record.line_number,
        "pending error superseded by traceback"
      );
    }
    self.state = State::Collecting;
    self.trailing_allowance = 0;
    self.buffer.push(record);
  }

  fn push_idle(&mut self, record: LineRecord) {
    match record.severity {
      Some(Severity::Error) => {
        self.flush_error();
        self.current_error = Some(record);
      }
      Some(Severity::Warning) => {
        self.flush_error();
        self.entries.push(Entry::standalone(record, Severity::Warning));
      }
      _ => {}
    }
  }

  fn push_collecting(&mut self, record: LineRecord, lowered: &str) {
    if lowered.contains(SHUTDOWN_MARKER) {
      self.buffer.push(record);
      self.close_block();
      return;
    }
    if CONTINUATION_MARKERS.iter().any(|m| lowered.contains(m)) {
      self.buffer.push(record);
      return;
    }
    if record.is_separator() {
      self.buffer.push(record);
      self.trailing_allowance = self.separator_grace;
      return;
    }

    let blank = lowered.trim().is_empty();
    let looks_like_stack = lowered.contains("error") || lowered.trim_start().starts_with("at ");
    if blank || (!looks_like_stack && self.trailing_allowance < 1) {
      debug!(line = record.line_number, "traceback block closed by lookahead line");
      self.close_block();
      return;
    }

    self.buffer.push(record);
    self.trailing_allowance = self.trailing_allowance.saturating_sub(1);
  }

  fn flush_error(&mut self) {
    if let Some(record) = self.current_error.take() {
      self.entries.push(Entry::standalone(record, Severity::Error));
    }
  }

  fn close_block(&mut self) {
    self.state = State::Idle;
    self.trailing_allowance = 0;
    let block = std::mem::take(&mut self.buffer);
    if let Some(entry) = finalize_block(block) {
      debug!(
        line = entry.line_number,
        lines = entry.traceback.len(),
        "traceback block finalized"
      );
      self.entries.push(entry);
    }
  }
}

/// Collapse a collected block into one error entry. `None` for an empty block.
///
/// The representative message/category come from the last line, except for
/// critical-error and editor-exit headers where the first line says more.
pub fn finalize_block(block: Vec<LineRecord>) -> Option<Entry> {
  let first = block.first()?;
  let last = block.last()?;

  let header_first = [first.message.to_lowercase(), first.raw_line.to_lowercase()]
    .iter()
    .any(|text| HEADER_MARKERS.iter().any(|m| text.contains(m)));
  let representative = if header_first { first } else { last };

  let message = representative.message.clone();
  let category = representative.category.clone();
  let message_hash = fingerprint::message_hash(&message);
  let event_hash = Some(fingerprint::event_hash(&message, &block));

  Some(Entry {
    severity: Severity::Error,
    category,
    message,
    timestamp: last.timestamp,
    line_number: first.line_number,
    line_entry_id: last.line_entry_id.clone(),
    message_hash,
    event_hash,
    traceback: block,
  })
}
