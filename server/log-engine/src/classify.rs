//! Line classifier: one raw line in, one [`LineRecord`] (or nothing) out.
//!
//! Category and severity inference are ordered rule tables; the first rule that
//! matches decides. The tables are public so each rule can be exercised alone.

use std::path::Path;

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::error;

use crate::config::Config;
use crate::fingerprint;
use crate::normalize;
use crate::types::{LineRecord, Severity, SEPARATOR_CATEGORY};

static TIMESTAMP: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"^\[(\d{4}\.\d{2}\.\d{2}-\d{2}\.\d{2}\.\d{2}):(\d+)\](\[\s*\d+\])?")
    .expect("timestamp pattern")
});

static SEPARATOR: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"^[=\-*_]{5,}$").expect("separator pattern"));

static NESTED_LOG: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"^Log\w+:\s*\w+:\s*(Log\w+):\s*(Warning|Error|Display|Info):\s*(.*)$")
    .expect("nested log pattern")
});

static EXCEPTION_PREFIX: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"(?i)^(\w*Exception):").expect("exception pattern"));

static LOG_PREFIX: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"^(Log[A-Za-z0-9]+):").expect("log prefix pattern"));

static STACK_FRAME: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"^\s+at\s+").expect("stack frame pattern"));

/// Category sentinel that is refined from the first word of the message.
const GENERIC_CATEGORY: &str = "LogClass";

const TIMESTAMP_FORMAT: &str = "%Y.%m.%d-%H.%M.%S";

// ---------------------------------------------------------------------------
// Timestamp
// ---------------------------------------------------------------------------

/// Split a `[YYYY.MM.DD-HH.MM.SS:frame]` prefix off a raw line.
///
/// Returns the parsed timestamp and the trimmed remainder. A prefix holding an
/// impossible date is logged and treated as absent.
pub fn extract_timestamp(line: &str) -> Option<(NaiveDateTime, &str)> {
  let caps = TIMESTAMP.captures(line)?;
  let whole = caps.get(0)?;
  let stamp = caps.get(1)?.as_str();
  match NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT) {
    Ok(ts) => Some((ts, line[whole.end()..].trim())),
    Err(e) => {
      error!(stamp, error = %e, "unparseable log timestamp");
      None
    }
  }
}

// ---------------------------------------------------------------------------
// Category rules
// ---------------------------------------------------------------------------

/// Input shared by the category rules.
pub struct CategoryInput<'a> {
  /// Raw line with leading bracket tags removed.
  pub cleaned: &'a str,
  /// Raw line, lower-cased.
  pub lowered: &'a str,
}

pub type CategoryRule = fn(&CategoryInput<'_>) -> Option<String>;

/// Category rules in priority order.
pub const CATEGORY_RULES: &[(&str, CategoryRule)] = &[
  ("exception_prefix", exception_prefix),
  ("log_prefix", log_prefix),
  ("qualified_exception", qualified_exception),
  ("display_embedded_log", display_embedded_log),
  ("warning_marker", warning_marker),
  ("error_marker", error_marker),
];

/// `FooException: ...` -> `FooException`.
fn exception_prefix(input: &CategoryInput<'_>) -> Option<String> {
  EXCEPTION_PREFIX
    .captures(input.cleaned)
    .map(|caps| caps[1].to_string())
}

/// `LogNet: ...` -> `LogNet`.
fn log_prefix(input: &CategoryInput<'_>) -> Option<String> {
  LOG_PREFIX.captures(input.cleaned).map(|caps| caps[1].to_string())
}

/// `System.IO.FileNotFoundException:` on its own -> `System.IO.FileNotFoundException`.
fn qualified_exception(input: &CategoryInput<'_>) -> Option<String> {
  if !input.cleaned.ends_with(':') || !input.cleaned.contains("Exception") {
    return None;
  }
  let first = input.cleaned.split_whitespace().next()?;
  let name = first.strip_suffix(':')?;
  name.contains("Exception").then(|| name.to_string())
}

/// `Display: LogShaders: ...` -> `LogShaders`.
fn display_embedded_log(input: &CategoryInput<'_>) -> Option<String> {
  if !input.cleaned.starts_with("Display:") {
    return None;
  }
  input
    .cleaned
    .split(':')
    .map(str::trim)
    .find(|part| {
      part
        .strip_prefix("Log")
        .is_some_and(|name| !name.is_empty() && name.chars().all(char::is_alphabetic))
    })
    .map(str::to_string)
}

fn warning_marker(input: &CategoryInput<'_>) -> Option<String> {
  words_after_marker(input.lowered, "warning:")
}

fn error_marker(input: &CategoryInput<'_>) -> Option<String> {
  words_after_marker(input.lowered, "error:")
}

/// First two words after `marker`, capitalized.
fn words_after_marker(lowered: &str, marker: &str) -> Option<String> {
  let after = lowered.split(marker).nth(1)?.trim();
  if after.is_empty() {
    return None;
  }
  let words: Vec<&str> = after.split_whitespace().take(2).collect();
  Some(capitalize(&words.join(" ")))
}

fn capitalize(s: &str) -> String {
  let mut chars = s.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
    None => String::new(),
  }
}

/// Apply [`CATEGORY_RULES`] to a raw line.
pub fn infer_category(line: &str) -> Option<String> {
  let lowered = line.to_lowercase();
  let input = CategoryInput {
    cleaned: normalize::strip_leading_tags(line),
    lowered: &lowered,
  };
  CATEGORY_RULES.iter().find_map(|(_, rule)| rule(&input))
}

// ---------------------------------------------------------------------------
// Severity rules
// ---------------------------------------------------------------------------

pub struct SeverityRule {
  pub name: &'static str,
  /// Tested against the lower-cased raw line.
  pub matches: fn(&str) -> bool,
  pub severity: Option<Severity>,
}

/// Severity rules in priority order. A matching rule may also decide "no severity".
pub const SEVERITY_RULES: &[SeverityRule] = &[
  SeverityRule {
    name: "summary",
    matches: is_summary_line,
    severity: None,
  },
  SeverityRule {
    name: "error_and_warning",
    matches: mentions_error_and_warning,
    severity: Some(Severity::Warning),
  },
  SeverityRule {
    name: "error",
    matches: mentions_error,
    severity: Some(Severity::Error),
  },
  SeverityRule {
    name: "warning",
    matches: mentions_warning,
    severity: Some(Severity::Warning),
  },
  SeverityRule {
    name: "stack",
    matches: is_stack_line,
    severity: Some(Severity::Traceback),
  },
];

/// `N Error(s), M Warning(s)` build summaries: counted, not events.
pub fn is_summary_line(lowered: &str) -> bool {
  lowered.contains("error(s)") && lowered.contains("warning(s)")
}

fn mentions_error_and_warning(lowered: &str) -> bool {
  lowered.contains("error") && lowered.contains("warning")
}

fn mentions_error(lowered: &str) -> bool {
  lowered.contains("error")
}

fn mentions_warning(lowered: &str) -> bool {
  lowered.contains("warning")
}

fn is_stack_line(lowered: &str) -> bool {
  STACK_FRAME.is_match(lowered) || lowered.contains("traceback") || lowered.contains("callstack")
}

/// Apply [`SEVERITY_RULES`] to a raw line.
pub fn infer_severity(line: &str) -> Option<Severity> {
  let lowered = line.to_lowercase();
  SEVERITY_RULES
    .iter()
    .find(|rule| (rule.matches)(&lowered))
    .and_then(|rule| rule.severity)
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Classifies raw lines. Holds the noise markers; otherwise stateless.
#[derive(Debug, Clone)]
pub struct Classifier {
  noise_markers: Vec<String>,
}

impl Default for Classifier {
  fn default() -> Self {
    Self::new(&Config::default())
  }
}

impl Classifier {
  pub fn new(config: &Config) -> Self {
    Self {
      noise_markers: config.noise_markers.clone(),
    }
  }

  pub fn is_noise(&self, line: &str) -> bool {
    self.noise_markers.iter().any(|m| line.contains(m.as_str()))
  }

  /// Classify one physical line (`line_number` is 1-based).
  ///
  /// Returns `None` for noise lines and for lines whose normalized message is empty.
  pub fn classify(&self, raw_line: &str, line_number: usize, filename: &str) -> Option<LineRecord> {
    if self.is_noise(raw_line) {
      return None;
    }

    let filename = basename(filename);
    let (timestamp, message) = match extract_timestamp(raw_line) {
      Some((ts, rest)) => (Some(ts), rest),
      None => (None, raw_line.trim()),
    };
    let line_entry_id =
      fingerprint::line_entry_id(timestamp.as_ref(), filename, line_number, raw_line.trim());

    if SEPARATOR.is_match(message) {
      return Some(LineRecord {
        timestamp,
        filename: filename.to_string(),
        line_number,
        raw_line: raw_line.to_string(),
        category: Some(SEPARATOR_CATEGORY.to_string()),
        severity: None,
        message: message.to_string(),
        line_entry_id,
      });
    }

    let (mut category, severity, message) = match unwrap_nested(message) {
      Some((category, severity, rest)) => (Some(category), severity, rest),
      None => (infer_category(raw_line), infer_severity(raw_line), message),
    };

    let mut message = normalize::normalize_message(message, category.as_deref(), severity);

    if category.as_deref() == Some(GENERIC_CATEGORY) {
      let mut words = message.split_whitespace();
      if let Some(first) = words.next() {
        category = Some(first.to_string());
        message = words.collect::<Vec<_>>().join(" ");
      }
    }

    if message.is_empty() {
      return None;
    }

    Some(LineRecord {
      timestamp,
      filename: filename.to_string(),
      line_number,
      raw_line: raw_line.to_string(),
      category,
      severity,
      message,
      line_entry_id,
    })
  }
}

/// `LogInit: Display: LogClass: Warning: rest` -> (`LogClass`, Warning, `rest`).
fn unwrap_nested(message: &str) -> Option<(String, Option<Severity>, &str)> {
  let caps = NESTED_LOG.captures(message)?;
  let rest = caps.get(3)?.as_str();
  if rest.is_empty() {
    return None;
  }
  Some((caps[1].to_string(), Severity::from_label(&caps[2]), rest))
}

/// Final path component; paths are never part of a line's identity.
pub fn basename(filename: &str) -> &str {
  Path::new(filename)
    .file_name()
    .and_then(|name| name.to_str())
    .unwrap_or(filename)
}

/// Classify with the default noise markers.
pub fn classify(raw_line: &str, line_number: usize, filename: &str) -> Option<LineRecord> {
  static DEFAULT: Lazy<Classifier> = Lazy::new(Classifier::default);
  DEFAULT.classify(raw_line, line_number, filename)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn timestamped_error_line() {
    let rec = classify(
      "[2024.01.01-00.00.01:123]LogTemp: Error: Something broke",
      1,
      "/var/logs/game.log",
    )
    .unwrap();
    assert_eq!(rec.category.as_deref(), Some("LogTemp"));
    assert_eq!(rec.severity, Some(Severity::Error));
    assert_eq!(rec.message, "Something broke");
    assert_eq!(rec.filename, "game.log");
    assert_eq!(
      rec.timestamp.unwrap().format("%Y-%m-%d %H:%M:%S").to_string(),
      "2024-01-01 00:00:01"
    );
    assert_eq!(rec.line_entry_id, "Q8QwW4cpvr4RmUMy4ayd");
  }

  #[test]
  fn frame_counter_after_timestamp_is_skipped() {
    let rec = classify("[2024.05.06-07.08.09:010][  3]LogNet: Warning: Slow tick", 4, "a.log").unwrap();
    assert_eq!(rec.category.as_deref(), Some("LogNet"));
    assert_eq!(rec.severity, Some(Severity::Warning));
    assert_eq!(rec.message, "Slow tick");
  }

  #[test]
  fn impossible_date_degrades_to_no_timestamp() {
    let rec = classify("[2024.13.45-00.00.01:1]LogTemp: Error: bad clock", 1, "a.log").unwrap();
    assert!(rec.timestamp.is_none());
    assert_eq!(rec.severity, Some(Severity::Error));
  }

  #[test]
  fn noise_lines_are_dropped() {
    assert!(classify("LogInit: Display: Warning/Error Summary (Unique only)", 1, "a.log").is_none());
    assert!(classify("[2024.01.01-00.00.01:1]LogOnline: Login successful", 2, "a.log").is_none());
    assert!(classify("To disable this warning set r.Foo=0", 3, "a.log").is_none());
  }

  #[test]
  fn blank_and_empty_messages_are_dropped() {
    assert!(classify("   ", 1, "a.log").is_none());
    assert!(classify("[2024.01.01-00.00.01:1]", 1, "a.log").is_none());
    assert!(classify("LogWindows: Error:", 1, "a.log").is_none());
  }

  #[test]
  fn separator_line() {
    let rec = classify("[2024.01.01-00.00.01:1]==========", 9, "a.log").unwrap();
    assert!(rec.is_separator());
    assert_eq!(rec.severity, None);
    assert_eq!(rec.message, "==========");
    assert!(classify("----", 1, "a.log").unwrap().category.is_none());
  }

  #[test]
  fn nested_log_is_unwrapped() {
    let rec = classify(
      "LogInit: Display: LogProperty: Error: Missing struct member Speed",
      1,
      "a.log",
    )
    .unwrap();
    assert_eq!(rec.category.as_deref(), Some("LogProperty"));
    assert_eq!(rec.severity, Some(Severity::Error));
    assert_eq!(rec.message, "Missing struct member Speed");
  }

  #[test]
  fn nested_display_carries_no_severity() {
    let rec = classify("LogInit: Display: LogConfig: Display: error in ini", 1, "a.log").unwrap();
    assert_eq!(rec.category.as_deref(), Some("LogConfig"));
    assert_eq!(rec.severity, None);
  }

  #[test]
  fn log_class_category_is_refined() {
    let rec = classify(
      "LogInit: Display: LogClass: Warning: BP_Player Type mismatch on Health",
      1,
      "a.log",
    )
    .unwrap();
    assert_eq!(rec.category.as_deref(), Some("BP_Player"));
    assert_eq!(rec.message, "Type mismatch on Health");
    assert_eq!(rec.severity, Some(Severity::Warning));
  }

  #[test]
  fn category_rules_in_order() {
    assert_eq!(infer_category("NullReferenceException: oops").as_deref(), Some("NullReferenceException"));
    assert_eq!(infer_category("[Tag] LogShaders: compiled").as_deref(), Some("LogShaders"));
    assert_eq!(
      infer_category("System.IO.FileNotFoundException:").as_deref(),
      Some("System.IO.FileNotFoundException")
    );
    assert_eq!(infer_category("Display: LogShaders: ready").as_deref(), Some("LogShaders"));
    assert_eq!(
      infer_category("Cook: warning: Missing Texture for Mesh").as_deref(),
      Some("Missing texture")
    );
    assert_eq!(infer_category("script error: Bad Call here").as_deref(), Some("Bad call"));
    assert_eq!(infer_category("nothing to see"), None);
  }

  #[test]
  fn severity_rules_in_order() {
    assert_eq!(infer_severity("Success - 0 error(s), 3 warning(s)"), None);
    assert_eq!(infer_severity("LogTemp: Error: boom"), Some(Severity::Error));
    assert_eq!(infer_severity("Warning: treating error as soft"), Some(Severity::Warning));
    assert_eq!(infer_severity("LogTemp: Warning: meh"), Some(Severity::Warning));
    assert_eq!(infer_severity("    at Foo.Bar()"), Some(Severity::Traceback));
    assert_eq!(infer_severity("Dumping callstack"), Some(Severity::Traceback));
    assert_eq!(infer_severity("LogTemp: Display: hello"), None);
  }

  #[test]
  fn every_rule_is_named() {
    assert!(CATEGORY_RULES.iter().all(|(name, _)| !name.is_empty()));
    assert!(SEVERITY_RULES.iter().all(|rule| !rule.name.is_empty()));
  }

  #[test]
  fn retry_messages_share_a_message() {
    let a = classify("LogHttp: Warning: Trying again in 5 seconds", 1, "a.log").unwrap();
    let b = classify("LogHttp: Warning: Trying again in 30 seconds", 2, "a.log").unwrap();
    assert_eq!(a.message, "Trying again in x seconds");
    assert_eq!(a.message, b.message);
    assert_ne!(a.line_entry_id, b.line_entry_id);
  }

  #[test]
  fn custom_noise_markers() {
    let classifier = Classifier::new(&Config {
      noise_markers: vec!["heartbeat".into()],
      ..Config::default()
    });
    assert!(classifier.classify("LogNet: Error: heartbeat lost", 1, "a.log").is_none());
    assert!(classifier.classify("Login successful", 2, "a.log").is_some());
  }
}
