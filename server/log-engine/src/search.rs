//! Per-line documents for a search mirror, keyed by `line_entry_id`.
//!
//! Unlike entries, every physical line gets a document, including lines the
//! classifier drops. The caller supplies the index time.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::classify::{basename, extract_timestamp};
use crate::fingerprint;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineDocument {
  pub id: String,
  pub line: String,
  pub line_number: usize,
  pub filename: String,
  #[serde(rename = "@timestamp")]
  pub indexed_at: String,
}

/// One document per line of `contents`, in file order.
pub fn line_documents(contents: &str, filename: &str, indexed_at: DateTime<Utc>) -> Vec<LineDocument> {
  let filename = basename(filename);
  let indexed_at = indexed_at.to_rfc3339();
  contents
    .lines()
    .enumerate()
    .map(|(idx, raw)| {
      let line = raw.trim();
      let line_number = idx + 1;
      let timestamp = extract_timestamp(raw).map(|(ts, _)| ts);
      LineDocument {
        id: fingerprint::line_entry_id(timestamp.as_ref(), filename, line_number, line),
        line: line.to_string(),
        line_number,
        filename: filename.to_string(),
        indexed_at: indexed_at.clone(),
      }
    })
    .collect()
}
