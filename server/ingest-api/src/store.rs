//! Postgres issue store: issues, the events that raised them, and traceback lines.
//!
//! Every insert is idempotent. Events are keyed by `(hash, type)`, issues by the
//! message hash, traceback rows by `(error_id, hash)`; re-uploading a file is a no-op.

use chrono::NaiveDateTime;
use log_engine::{Entry, Severity};
use sqlx_core::connection::Connection;
use sqlx_core::query::query;
use sqlx_core::row::Row;
use sqlx_postgres::{PgConnection, PgPool, PgRow};
use tracing::{debug, warn};

use crate::types::{EventKind, Issue, IssueStatus, NewIssue, StoreReport};

const SCHEMA: &[&str] = &[
  r#"
  CREATE TABLE IF NOT EXISTS issues (
    id BIGSERIAL PRIMARY KEY,
    hash TEXT NOT NULL UNIQUE,
    message TEXT NOT NULL,
    category TEXT,
    timestamp TIMESTAMP,
    status TEXT NOT NULL DEFAULT 'open'
  )
  "#,
  r#"
  CREATE TABLE IF NOT EXISTS events (
    id BIGSERIAL PRIMARY KEY,
    hash TEXT NOT NULL,
    message TEXT NOT NULL,
    category TEXT,
    timestamp TIMESTAMP,
    type TEXT NOT NULL,
    issue_id BIGINT REFERENCES issues(id) ON DELETE SET NULL,
    UNIQUE (hash, type)
  )
  "#,
  r#"
  CREATE TABLE IF NOT EXISTS error_traceback (
    id BIGSERIAL PRIMARY KEY,
    error_id BIGINT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
    message TEXT NOT NULL,
    line_number BIGINT,
    hash TEXT NOT NULL,
    UNIQUE (error_id, hash)
  )
  "#,
];

pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx_core::Error> {
  for statement in SCHEMA.iter().copied() {
    query(statement).execute(pool).await?;
  }
  Ok(())
}

// ---------------------------------------------------------------------------
// Batch ingest
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct EntryOutcome {
  event_created: bool,
  traceback_lines: usize,
}

/// Store a parsed batch. Each entry runs in its own savepoint: a failing entry is
/// logged and rolled back, the rest of the batch continues. The caller commits.
pub async fn store_entries(conn: &mut PgConnection, entries: &[Entry]) -> Result<StoreReport, sqlx_core::Error> {
  let mut report = StoreReport::default();

  for entry in entries {
    let mut savepoint = conn.begin().await?;
    match store_entry(&mut savepoint, entry).await {
      Ok(outcome) => {
        savepoint.commit().await?;
        report.stored += 1;
        report.traceback_lines += outcome.traceback_lines;
        if outcome.event_created {
          report.events_created += 1;
        }
      }
      Err(e) => {
        warn!(line = entry.line_number, error = %e, "failed to store entry, skipping");
        savepoint.rollback().await?;
        report.failed += 1;
      }
    }
  }

  Ok(report)
}

/// Event row key for an entry. Warnings and errors live in separate key spaces, so a
/// warning never shadows an error with the same message.
pub fn event_key(entry: &Entry) -> Option<(&str, EventKind)> {
  match entry.severity {
    Severity::Error => Some((
      entry.event_hash.as_deref().unwrap_or(&entry.message_hash),
      EventKind::Error,
    )),
    Severity::Warning => Some((&entry.message_hash, EventKind::Warning)),
    Severity::Traceback => None,
  }
}

async fn store_entry(conn: &mut PgConnection, entry: &Entry) -> Result<EntryOutcome, sqlx_core::Error> {
  match event_key(entry) {
    Some((hash, EventKind::Error)) => store_error(conn, entry, hash).await,
    Some((hash, EventKind::Warning)) => {
      let (_, created) = insert_event(
        conn,
        hash,
        &entry.message,
        entry.category.as_deref(),
        entry.timestamp,
        EventKind::Warning,
        None,
      )
      .await?;
      Ok(EntryOutcome {
        event_created: created,
        traceback_lines: 0,
      })
    }
    None => {
      debug!(line = entry.line_number, "bare traceback entry, nothing to store");
      Ok(EntryOutcome::default())
    }
  }
}

async fn store_error(conn: &mut PgConnection, entry: &Entry, event_hash: &str) -> Result<EntryOutcome, sqlx_core::Error> {
  let (event_id, created) = insert_event(
    conn,
    event_hash,
    &entry.message,
    entry.category.as_deref(),
    entry.timestamp,
    EventKind::Error,
    None,
  )
  .await?;

  if !created {
    debug!(event_id, "event already stored");
    return Ok(EntryOutcome::default());
  }

  let issue_id = upsert_issue(
    conn,
    &entry.message_hash,
    &entry.message,
    entry.category.as_deref(),
    entry.timestamp,
    IssueStatus::Open,
  )
  .await?;

  query("UPDATE events SET issue_id = $1 WHERE id = $2")
    .bind(issue_id)
    .bind(event_id)
    .execute(&mut *conn)
    .await?;

  let mut traceback_lines = 0;
  for line in &entry.traceback {
    let result = query(
      r#"
      INSERT INTO error_traceback (error_id, message, line_number, hash)
      VALUES ($1, $2, $3, $4)
      ON CONFLICT (error_id, hash) DO NOTHING
      "#,
    )
    .bind(event_id)
    .bind(&line.message)
    .bind(line.line_number as i64)
    .bind(&line.line_entry_id)
    .execute(&mut *conn)
    .await?;
    traceback_lines += result.rows_affected() as usize;
  }

  Ok(EntryOutcome {
    event_created: true,
    traceback_lines,
  })
}

/// Returns the event id and whether this call created it.
async fn insert_event(
  conn: &mut PgConnection,
  hash: &str,
  message: &str,
  category: Option<&str>,
  timestamp: Option<NaiveDateTime>,
  kind: EventKind,
  issue_id: Option<i64>,
) -> Result<(i64, bool), sqlx_core::Error> {
  let inserted = query(
    r#"
    INSERT INTO events (hash, message, category, timestamp, type, issue_id)
    VALUES ($1, $2, $3, $4, $5, $6)
    ON CONFLICT (hash, type) DO NOTHING
    RETURNING id
    "#,
  )
  .bind(hash)
  .bind(message)
  .bind(category)
  .bind(timestamp)
  .bind(kind.as_str())
  .bind(issue_id)
  .fetch_optional(&mut *conn)
  .await?;

  if let Some(row) = inserted {
    return Ok((row.try_get("id")?, true));
  }

  let row = query("SELECT id FROM events WHERE hash = $1 AND type = $2")
    .bind(hash)
    .bind(kind.as_str())
    .fetch_one(&mut *conn)
    .await?;
  Ok((row.try_get("id")?, false))
}

/// Existing issues keep their status; the no-op update lets RETURNING yield the id.
async fn upsert_issue(
  conn: &mut PgConnection,
  hash: &str,
  message: &str,
  category: Option<&str>,
  timestamp: Option<NaiveDateTime>,
  status: IssueStatus,
) -> Result<i64, sqlx_core::Error> {
  let row = query(
    r#"
    INSERT INTO issues (hash, message, category, timestamp, status)
    VALUES ($1, $2, $3, $4, $5)
    ON CONFLICT (hash) DO UPDATE SET hash = EXCLUDED.hash
    RETURNING id
    "#,
  )
  .bind(hash)
  .bind(message)
  .bind(category)
  .bind(timestamp)
  .bind(status.as_str())
  .fetch_one(&mut *conn)
  .await?;
  row.try_get("id")
}

// ---------------------------------------------------------------------------
// Issue CRUD
// ---------------------------------------------------------------------------

const ISSUE_COLUMNS: &str = "id, message, category, timestamp, status";

fn issue_from_row(row: &PgRow) -> Result<Issue, sqlx_core::Error> {
  let status: String = row.try_get("status")?;
  Ok(Issue {
    id: row.try_get("id")?,
    message: row.try_get("message")?,
    category: row.try_get("category")?,
    timestamp: row.try_get("timestamp")?,
    status: status.parse().map_err(|e: String| sqlx_core::Error::Decode(e.into()))?,
  })
}

pub async fn list_issues(pool: &PgPool, status: Option<IssueStatus>) -> Result<Vec<Issue>, sqlx_core::Error> {
  let rows = match status {
    Some(status) => {
      let sql = format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE status = $1 ORDER BY id");
      query(&sql).bind(status.as_str()).fetch_all(pool).await?
    }
    None => {
      let sql = format!("SELECT {ISSUE_COLUMNS} FROM issues ORDER BY id");
      query(&sql).fetch_all(pool).await?
    }
  };
  rows.iter().map(issue_from_row).collect()
}

pub async fn get_issue(pool: &PgPool, id: i64) -> Result<Option<Issue>, sqlx_core::Error> {
  let sql = format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE id = $1");
  let row = query(&sql).bind(id).fetch_optional(pool).await?;
  row.as_ref().map(issue_from_row).transpose()
}

/// Returns false when no issue has this id.
pub async fn update_status(pool: &PgPool, id: i64, status: IssueStatus) -> Result<bool, sqlx_core::Error> {
  let result = query("UPDATE issues SET status = $1 WHERE id = $2")
    .bind(status.as_str())
    .bind(id)
    .execute(pool)
    .await?;
  Ok(result.rows_affected() > 0)
}

/// Returns false when no issue has this id.
pub async fn delete_issue(pool: &PgPool, id: i64) -> Result<bool, sqlx_core::Error> {
  let result = query("DELETE FROM issues WHERE id = $1").bind(id).execute(pool).await?;
  Ok(result.rows_affected() > 0)
}

/// Manually reported issue plus its event, in one transaction. Returns the issue id.
pub async fn create_issue(pool: &PgPool, issue: &NewIssue, now: NaiveDateTime) -> Result<i64, sqlx_core::Error> {
  let hash = log_engine::fingerprint::message_hash(&issue.message);
  let mut tx = pool.begin().await?;

  let issue_id = upsert_issue(
    &mut tx,
    &hash,
    &issue.message,
    Some(&issue.category),
    Some(now),
    issue.status,
  )
  .await?;
  insert_event(
    &mut tx,
    &hash,
    &issue.message,
    Some("custom"),
    Some(now),
    issue.kind,
    Some(issue_id),
  )
  .await?;

  tx.commit().await?;
  Ok(issue_id)
}
