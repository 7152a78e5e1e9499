//! Core engine: classify every line of a file and fold the records into entries.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::aggregate::Aggregator;
use crate::classify::Classifier;
use crate::config::Config;
use crate::error::EngineError;
use crate::types::Entry;

/// The log parser. Holds configuration only; every parse starts from empty state,
/// so one parser can serve many files, including concurrently.
#[derive(Debug, Clone)]
pub struct LogParser {
  config: Config,
  classifier: Classifier,
}

impl Default for LogParser {
  fn default() -> Self {
    Self::new(Config::default())
  }
}

impl LogParser {
  pub fn new(config: Config) -> Self {
    let classifier = Classifier::new(&config);
    Self { config, classifier }
  }

  pub fn with_defaults() -> Self {
    Self::default()
  }

  /// Parse the lines of one file, in order. `filename` may be a path; only its
  /// final component is used.
  pub fn parse<'a, I>(&self, lines: I, filename: &str) -> Vec<Entry>
  where
    I: IntoIterator<Item = &'a str>,
  {
    let mut aggregator = Aggregator::new(self.config.separator_grace);
    for (idx, line) in lines.into_iter().enumerate() {
      if line.trim().is_empty() {
        aggregator.push_blank();
        continue;
      }
      if let Some(record) = self.classifier.classify(line, idx + 1, filename) {
        aggregator.push(record);
      }
    }
    aggregator.finish()
  }

  /// Parse a whole file already held in memory.
  pub fn parse_str(&self, contents: &str, filename: &str) -> Vec<Entry> {
    self.parse(contents.lines(), filename)
  }

  /// Read and parse a file. A missing file yields no entries.
  pub fn parse_file(&self, path: &Path) -> Result<Vec<Entry>, EngineError> {
    let contents = read_log_file(path)?;
    let entries = self.parse_str(&contents, &path.to_string_lossy());
    debug!(file = %path.display(), entries = entries.len(), "parsed log file");
    Ok(entries)
  }
}

/// Parse with the default configuration.
pub fn parse<'a, I>(lines: I, filename: &str) -> Vec<Entry>
where
  I: IntoIterator<Item = &'a str>,
{
  LogParser::default().parse(lines, filename)
}

/// Read and parse a file with the default configuration.
pub fn parse_file(path: &Path) -> Result<Vec<Entry>, EngineError> {
  LogParser::default().parse_file(path)
}

/// Read a log file as text.
///
/// A missing file reads as empty. Invalid UTF-8 is replaced rather than rejected;
/// any other I/O failure is returned.
pub fn read_log_file(path: &Path) -> Result<String, EngineError> {
  let bytes = match fs::read(path) {
    Ok(bytes) => bytes,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
      warn!(file = %path.display(), "log file not found; nothing to parse");
      return Ok(String::new());
    }
    Err(e) => return Err(EngineError::io(path, e)),
  };
  match String::from_utf8(bytes) {
    Ok(text) => Ok(text),
    Err(e) => {
      warn!(file = %path.display(), "log file is not valid UTF-8; decoding lossily");
      Ok(String::from_utf8_lossy(e.as_bytes()).into_owned())
    }
  }
}

/// Keep the first entry for each `(severity, message_hash)`, preserving order.
///
/// A warning and an error with the same message are different events.
pub fn dedup_by_message_hash(entries: Vec<Entry>) -> Vec<Entry> {
  let mut seen = HashSet::new();
  entries
    .into_iter()
    .filter(|entry| seen.insert((entry.severity, entry.message_hash.clone())))
    .collect()
}
