//! Error type for the HTTP layer; every variant maps to a status code and a JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log_engine::types::ErrorOutput;
use log_engine::EngineError;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{0}")]
  BadRequest(String),

  #[error("{0} not found")]
  NotFound(String),

  #[error("upload exceeds {limit} bytes")]
  PayloadTooLarge { limit: usize },

  #[error(transparent)]
  Engine(#[from] EngineError),

  #[error("database: {0}")]
  Database(#[from] sqlx_core::Error),

  #[error("background task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      Self::BadRequest(_) => StatusCode::BAD_REQUEST,
      Self::NotFound(_) => StatusCode::NOT_FOUND,
      Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
      Self::Engine(_) | Self::Database(_) | Self::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    // Internal details stay in the server log.
    let message = if status.is_server_error() {
      error!(error = %self, "request failed");
      "internal server error".to_string()
    } else {
      self.to_string()
    };
    (status, Json(ErrorOutput::new(message))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn client_errors_map_to_their_status() {
    assert_eq!(ApiError::BadRequest("bad".into()).status(), StatusCode::BAD_REQUEST);
    assert_eq!(ApiError::NotFound("issue 3".into()).status(), StatusCode::NOT_FOUND);
    assert_eq!(
      ApiError::PayloadTooLarge { limit: 10 }.status(),
      StatusCode::PAYLOAD_TOO_LARGE
    );
  }

  #[test]
  fn server_errors_hide_details() {
    let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
    let err = ApiError::from(EngineError::io(std::path::Path::new("data/logs/game.log"), io));
    let response = err.into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
  }

  #[test]
  fn not_found_message_names_the_resource() {
    assert_eq!(ApiError::NotFound("issue 42".into()).to_string(), "issue 42 not found");
  }
}
