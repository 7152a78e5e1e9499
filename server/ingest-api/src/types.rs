//! Request/response types for the ingest API.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Issues
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueStatus {
  Open,
  Closed,
}

impl IssueStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Open => "open",
      Self::Closed => "closed",
    }
  }
}

impl FromStr for IssueStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "open" => Ok(Self::Open),
      "closed" => Ok(Self::Closed),
      other => Err(format!("invalid status {other:?}, expected \"open\" or \"closed\"")),
    }
  }
}

impl fmt::Display for IssueStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct Issue {
  pub id: i64,
  pub message: String,
  pub category: Option<String>,
  pub timestamp: Option<NaiveDateTime>,
  pub status: IssueStatus,
}

/// `GET /issues?status=...`; kept as a raw string so a bad value is a 400 with our body.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
  pub status: Option<String>,
}

impl ListQuery {
  pub fn status(&self) -> Result<Option<IssueStatus>, String> {
    self.status.as_deref().map(str::parse).transpose()
  }
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
  pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
  Error,
  Warning,
}

impl EventKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Error => "error",
      Self::Warning => "warning",
    }
  }
}

fn default_status() -> IssueStatus {
  IssueStatus::Open
}

fn default_kind() -> EventKind {
  EventKind::Error
}

/// Body of `POST /issues`.
#[derive(Debug, Deserialize)]
pub struct NewIssue {
  pub message: String,
  pub category: String,
  #[serde(default = "default_status")]
  pub status: IssueStatus,
  #[serde(rename = "type", default = "default_kind")]
  pub kind: EventKind,
}

#[derive(Debug, Serialize)]
pub struct Acknowledgement {
  pub message: String,
}

// ---------------------------------------------------------------------------
// Uploads
// ---------------------------------------------------------------------------

/// Outcome of storing one batch of entries.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct StoreReport {
  pub stored: usize,
  pub failed: usize,
  pub events_created: usize,
  pub traceback_lines: usize,
}

#[derive(Debug, Serialize)]
pub struct UploadSummary {
  pub filename: String,
  pub parsed: usize,
  pub stored: usize,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_filter_accepts_only_known_values() {
    let q = ListQuery { status: Some("closed".into()) };
    assert_eq!(q.status(), Ok(Some(IssueStatus::Closed)));
    assert_eq!(ListQuery::default().status(), Ok(None));
    assert!(ListQuery { status: Some("pending".into()) }.status().is_err());
  }

  #[test]
  fn new_issue_defaults() {
    let body: NewIssue = serde_json::from_str(r#"{"message":"boom","category":"LogTemp"}"#).unwrap();
    assert_eq!(body.status, IssueStatus::Open);
    assert_eq!(body.kind, EventKind::Error);

    let body: NewIssue =
      serde_json::from_str(r#"{"message":"m","category":"c","status":"closed","type":"warning"}"#).unwrap();
    assert_eq!(body.status, IssueStatus::Closed);
    assert_eq!(body.kind, EventKind::Warning);
  }

  #[test]
  fn issue_serializes_lowercase_status() {
    let issue = Issue {
      id: 1,
      message: "boom".into(),
      category: None,
      timestamp: None,
      status: IssueStatus::Open,
    };
    let json = serde_json::to_value(&issue).unwrap();
    assert_eq!(json["status"], "open");
    assert!(json["category"].is_null());
  }
}
