//! Shared application state handed to every handler.

use log_engine::LogParser;
use sqlx_postgres::PgPool;

use crate::config::ServerConfig;

pub struct AppState {
  pub pool: PgPool,
  pub config: ServerConfig,
  pub parser: LogParser,
}
