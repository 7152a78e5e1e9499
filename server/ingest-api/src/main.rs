//! Binary entrypoint for the log ingest API.

use std::sync::Arc;

use sqlx_postgres::PgPool;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ingest_api::{store, AppState, ServerConfig};
use log_engine::LogParser;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let config = ServerConfig::from_env()?;
  let addr = config.socket_addr();

  let pool = PgPool::connect(&config.database_url).await?;
  store::ensure_schema(&pool).await?;

  let state = Arc::new(AppState {
    pool,
    config,
    parser: LogParser::with_defaults(),
  });
  let app = ingest_api::router(state);

  info!(%addr, "ingest-api listening");
  let listener = tokio::net::TcpListener::bind(addr).await?;
  axum::serve(listener, app).await?;

  Ok(())
}
