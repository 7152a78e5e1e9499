//! HTTP handlers for uploads and issues.

use std::sync::Arc;

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;
use crate::store;
use crate::types::{Acknowledgement, Issue, IssueStatus, ListQuery, NewIssue, StatusUpdate, UploadSummary};
use crate::upload::{process_upload, sanitize_filename};

pub async fn health() -> Json<Value> {
  Json(json!({ "status": "healthy" }))
}

// ---------------------------------------------------------------------------
// Uploads
// ---------------------------------------------------------------------------

fn multipart_error(e: MultipartError, limit: usize) -> ApiError {
  if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
    ApiError::PayloadTooLarge { limit }
  } else {
    ApiError::BadRequest(e.body_text())
  }
}

pub async fn upload_log(
  State(state): State<Arc<AppState>>,
  mut multipart: Multipart,
) -> Result<Json<UploadSummary>, ApiError> {
  let limit = state.config.max_upload_bytes;

  let mut upload = None;
  while let Some(field) = multipart.next_field().await.map_err(|e| multipart_error(e, limit))? {
    if field.name() != Some("file") {
      continue;
    }
    let filename = field
      .file_name()
      .and_then(sanitize_filename)
      .ok_or_else(|| ApiError::BadRequest("upload has no usable filename".into()))?;
    let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
    upload = Some((filename, bytes));
    break;
  }

  let (filename, bytes) = upload.ok_or_else(|| ApiError::BadRequest("multipart field `file` is required".into()))?;
  if bytes.len() > limit {
    return Err(ApiError::PayloadTooLarge { limit });
  }

  let worker = Arc::clone(&state);
  let name = filename.clone();
  let processed = tokio::task::spawn_blocking(move || {
    process_upload(
      &worker.parser,
      &worker.config.log_dir,
      &name,
      &bytes,
      worker.config.dedup_by_message,
    )
  })
  .await??;

  let mut tx = state.pool.begin().await?;
  let report = store::store_entries(&mut tx, &processed.entries).await?;
  tx.commit().await?;

  info!(
    file = %filename,
    parsed = processed.parsed,
    stored = report.stored,
    failed = report.failed,
    events = report.events_created,
    traceback_lines = report.traceback_lines,
    "ingested upload"
  );

  Ok(Json(UploadSummary {
    filename,
    parsed: processed.parsed,
    stored: report.stored,
  }))
}

// ---------------------------------------------------------------------------
// Issues
// ---------------------------------------------------------------------------

fn parse_status(raw: &str) -> Result<IssueStatus, ApiError> {
  raw.parse().map_err(ApiError::BadRequest)
}

pub async fn list_issues(
  State(state): State<Arc<AppState>>,
  Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Issue>>, ApiError> {
  let status = query.status().map_err(ApiError::BadRequest)?;
  Ok(Json(store::list_issues(&state.pool, status).await?))
}

pub async fn get_issue(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> Result<Json<Issue>, ApiError> {
  store::get_issue(&state.pool, id)
    .await?
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("issue {id}")))
}

pub async fn update_issue(
  State(state): State<Arc<AppState>>,
  Path(id): Path<i64>,
  Json(body): Json<StatusUpdate>,
) -> Result<Json<Acknowledgement>, ApiError> {
  let status = parse_status(&body.status)?;
  if !store::update_status(&state.pool, id, status).await? {
    return Err(ApiError::NotFound(format!("issue {id}")));
  }
  info!(issue = id, %status, "issue status updated");
  Ok(Json(Acknowledgement {
    message: format!("Issue {id} status updated to '{status}'"),
  }))
}

pub async fn delete_issue(
  State(state): State<Arc<AppState>>,
  Path(id): Path<i64>,
) -> Result<Json<Acknowledgement>, ApiError> {
  if !store::delete_issue(&state.pool, id).await? {
    return Err(ApiError::NotFound(format!("issue {id}")));
  }
  info!(issue = id, "issue deleted");
  Ok(Json(Acknowledgement {
    message: format!("Issue {id} deleted"),
  }))
}

pub async fn create_issue(
  State(state): State<Arc<AppState>>,
  Json(body): Json<NewIssue>,
) -> Result<(StatusCode, Json<Issue>), ApiError> {
  if body.message.trim().is_empty() {
    return Err(ApiError::BadRequest("message must not be empty".into()));
  }
  let id = store::create_issue(&state.pool, &body, Utc::now().naive_utc()).await?;
  let issue = store::get_issue(&state.pool, id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("issue {id}")))?;
  info!(issue = id, "issue created");
  Ok((StatusCode::CREATED, Json(issue)))
}
