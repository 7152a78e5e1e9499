//! Log Ingest API
//!
//! HTTP service that accepts uploaded engine logs, parses them with `log-engine`,
//! and keeps an idempotent issue store in PostgreSQL. Binds to 127.0.0.1 by default.

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;
pub mod store;
pub mod types;
pub mod upload;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

pub use config::ServerConfig;
pub use error::ApiError;
pub use state::AppState;

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn router(state: Arc<AppState>) -> Router {
  let body_limit = state.config.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD);

  Router::new()
    .route("/health", get(handlers::health))
    .route("/logs", post(handlers::upload_log))
    .route("/issues", get(handlers::list_issues).post(handlers::create_issue))
    .route(
      "/issues/:id",
      get(handlers::get_issue)
        .patch(handlers::update_issue)
        .delete(handlers::delete_issue),
    )
    .layer(DefaultBodyLimit::max(body_limit))
    .layer(CorsLayer::permissive())
    .with_state(state)
}
