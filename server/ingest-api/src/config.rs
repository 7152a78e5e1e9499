//! Server configuration, read from the environment at startup.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use thiserror::Error;

pub const DEFAULT_PORT: u16 = 5005;
pub const DEFAULT_LOG_DIR: &str = "data/logs";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
  #[error("{0} must be set")]
  Missing(&'static str),

  #[error("{key} has invalid value {value:?}")]
  Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
  pub database_url: String,
  pub bind_addr: IpAddr,
  pub port: u16,
  /// Uploaded files and their parsed NDJSON audit copies land here.
  pub log_dir: PathBuf,
  pub max_upload_bytes: usize,
  /// Keep only the first entry per severity and message hash before storing.
  pub dedup_by_message: bool,
}

impl ServerConfig {
  pub fn from_env() -> Result<Self, ConfigError> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
  where
    F: Fn(&str) -> Option<String>,
  {
    let database_url = lookup("DATABASE_URL")
      .filter(|v| !v.is_empty())
      .ok_or(ConfigError::Missing("DATABASE_URL"))?;

    Ok(Self {
      database_url,
      bind_addr: parse_or(&lookup, "BIND_ADDR", IpAddr::V4(Ipv4Addr::LOCALHOST))?,
      port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
      log_dir: lookup("LOG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR)),
      max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
      dedup_by_message: match lookup("DEDUP_BY_MESSAGE") {
        None => true,
        Some(v) => parse_flag(&v).ok_or(ConfigError::Invalid {
          key: "DEDUP_BY_MESSAGE",
          value: v,
        })?,
      },
    })
  }

  pub fn socket_addr(&self) -> SocketAddr {
    SocketAddr::new(self.bind_addr, self.port)
  }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
  F: Fn(&str) -> Option<String>,
  T: std::str::FromStr,
{
  match lookup(key) {
    None => Ok(default),
    Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid { key, value: v }),
  }
}

fn parse_flag(value: &str) -> Option<bool> {
  match value.trim().to_ascii_lowercase().as_str() {
    "1" | "true" | "yes" | "on" => Some(true),
    "0" | "false" | "no" | "off" => Some(false),
    _ => None,
  }
}
